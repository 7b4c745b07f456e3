//! Routing fields of an inbound signaling message
//!
//! Only `type`, `from` and `to` are read. Everything else in the message is
//! opaque to the relay, and forwarding always uses the original text, so
//! nothing is ever re-serialized.

use crate::error::ClientRequestError;
use crate::state::Identity;
use serde_json::Value;

const REGISTER: &str = "register";

/// What the sender asked the relay to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `"type": "register"`
    Register,
    /// Anything else, including a missing `type`
    Routable,
}

/// The parsed routing view of one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    kind: MessageKind,
    from: Option<Identity>,
    to: Option<Identity>,
}

impl Envelope {
    /// Parse the routing fields out of raw message text.
    ///
    /// `from` and `to` are recognised when they are non-empty strings,
    /// non-zero numbers or `true`.
    pub fn parse(raw: &str) -> Result<Self, ClientRequestError> {
        let Value::Object(mut fields) = serde_json::from_str::<Value>(raw)? else {
            return Err(ClientRequestError::NotAnObject);
        };

        let kind = match fields.get("type") {
            Some(Value::String(kind)) if kind == REGISTER => MessageKind::Register,
            _ => MessageKind::Routable,
        };

        Ok(Self {
            kind,
            from: take_identity(&mut fields, "from"),
            to: take_identity(&mut fields, "to"),
        })
    }

    /// Message kind
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Claimed sender identity
    pub fn from(&self) -> Option<&Identity> {
        self.from.as_ref()
    }

    /// Addressed recipient
    pub fn to(&self) -> Option<&Identity> {
        self.to.as_ref()
    }

    /// The identity to register, if this is a well-formed registration.
    ///
    /// A `register` message without a usable `from` is not a registration
    /// and gets routed like any other message.
    pub fn registration(&self) -> Option<&Identity> {
        match self.kind {
            MessageKind::Register => self.from.as_ref(),
            MessageKind::Routable => None,
        }
    }
}

/// Identities are keys, so numbers and `true` are accepted in their string
/// form. Falsy values (`""`, `0`, `false`, `null`) and composites mean "absent".
fn take_identity(fields: &mut serde_json::Map<String, Value>, key: &str) -> Option<Identity> {
    match fields.remove(key)? {
        Value::String(id) if !id.is_empty() => Some(Identity(id)),
        Value::Number(n) if n.as_f64().is_some_and(|v| v != 0.0) => Some(Identity(n.to_string())),
        Value::Bool(true) => Some(Identity::from("true")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_requires_from() {
        let envelope = Envelope::parse(r#"{"type":"register","from":"alice"}"#).unwrap();
        assert_eq!(envelope.kind(), MessageKind::Register);
        assert_eq!(envelope.registration(), Some(&Identity::from("alice")));

        let envelope = Envelope::parse(r#"{"type":"register"}"#).unwrap();
        assert_eq!(envelope.kind(), MessageKind::Register);
        assert_eq!(envelope.registration(), None);

        let envelope = Envelope::parse(r#"{"type":"register","from":""}"#).unwrap();
        assert_eq!(envelope.registration(), None);
    }

    #[test]
    fn other_types_are_routable() {
        let envelope =
            Envelope::parse(r#"{"type":"sdp","from":"alice","to":"bob","sdp":{"type":"offer"}}"#)
                .unwrap();
        assert_eq!(envelope.kind(), MessageKind::Routable);
        assert_eq!(envelope.registration(), None);
        assert_eq!(envelope.from(), Some(&Identity::from("alice")));
        assert_eq!(envelope.to(), Some(&Identity::from("bob")));

        let envelope = Envelope::parse(r#"{"type":7,"data":"ping"}"#).unwrap();
        assert_eq!(envelope.kind(), MessageKind::Routable);
        assert_eq!(envelope.to(), None);
    }

    #[test]
    fn scalar_identities_use_their_string_form() {
        let envelope = Envelope::parse(r#"{"to":42}"#).unwrap();
        assert_eq!(envelope.to(), Some(&Identity::from("42")));

        let envelope = Envelope::parse(r#"{"type":"register","from":7}"#).unwrap();
        assert_eq!(envelope.registration(), Some(&Identity::from("7")));

        let envelope = Envelope::parse(r#"{"to":true}"#).unwrap();
        assert_eq!(envelope.to(), Some(&Identity::from("true")));
    }

    #[test]
    fn falsy_or_composite_recipient_is_absent() {
        for raw in [
            r#"{"to":""}"#,
            r#"{"to":0}"#,
            r#"{"to":false}"#,
            r#"{"to":null}"#,
            r#"{"to":["bob"]}"#,
            r#"{"to":{"id":"bob"}}"#,
        ] {
            assert_eq!(Envelope::parse(raw).unwrap().to(), None, "{raw}");
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            Envelope::parse("{not json"),
            Err(ClientRequestError::Json(_))
        ));
        assert!(matches!(
            Envelope::parse(r#"["to","bob"]"#),
            Err(ClientRequestError::NotAnObject)
        ));
        assert!(matches!(
            Envelope::parse("null"),
            Err(ClientRequestError::NotAnObject)
        ));
    }
}
