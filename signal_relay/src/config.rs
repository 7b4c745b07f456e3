use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Longest accepted keepalive period (one day)
pub const MAX_PING_INTERVAL_SECS: u64 = 86_400;

/// WebSocket signaling relay for WebRTC peers
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
#[command(name = "signal-relay", version, about = "WebSocket signaling relay for WebRTC peers")]
pub struct RelayConfig {
    /// Address to listen on
    #[arg(long, env = "SIGNAL_RELAY_BIND_ADDRESS", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind_address: IpAddr,

    /// Port to listen on
    #[arg(long, env = "SIGNAL_RELAY_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Seconds between keepalive pings; 0 disables keepalive
    #[arg(
        long,
        env = "SIGNAL_RELAY_PING_INTERVAL_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(0..=MAX_PING_INTERVAL_SECS)
    )]
    pub ping_interval_secs: u64,

    /// Emit structured JSON logs
    #[arg(long, env = "SIGNAL_RELAY_JSON_LOGS")]
    pub json_logs: bool,
}

impl RelayConfig {
    /// The socket address to bind
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Keepalive period, if enabled
    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_secs > 0).then(|| Duration::from_secs(self.ping_interval_secs))
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            ping_interval_secs: 30,
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_parser() {
        let parsed = RelayConfig::try_parse_from(["signal-relay"]).unwrap();
        assert_eq!(parsed, RelayConfig::default());
        assert_eq!(parsed.socket_addr(), "0.0.0.0:3000".parse().unwrap());
        assert_eq!(parsed.ping_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn flags_override_defaults() {
        let parsed = RelayConfig::try_parse_from([
            "signal-relay",
            "--bind-address",
            "127.0.0.1",
            "--port",
            "9000",
            "--ping-interval-secs",
            "0",
            "--json-logs",
        ])
        .unwrap();
        assert_eq!(parsed.socket_addr(), "127.0.0.1:9000".parse().unwrap());
        assert_eq!(parsed.ping_interval(), None);
        assert!(parsed.json_logs);
    }

    #[test]
    fn ping_interval_is_bounded() {
        let max = MAX_PING_INTERVAL_SECS.to_string();
        let parsed =
            RelayConfig::try_parse_from(["signal-relay", "--ping-interval-secs", max.as_str()])
                .unwrap();
        assert_eq!(
            parsed.ping_interval(),
            Some(Duration::from_secs(MAX_PING_INTERVAL_SECS))
        );

        let too_long = (MAX_PING_INTERVAL_SECS + 1).to_string();
        assert!(
            RelayConfig::try_parse_from(["signal-relay", "--ping-interval-secs", too_long.as_str()])
                .is_err()
        );
        assert!(
            RelayConfig::try_parse_from(["signal-relay", "--ping-interval-secs", "18446744073709551615"])
                .is_err()
        );
    }

    #[test]
    fn rejects_bad_port() {
        assert!(RelayConfig::try_parse_from(["signal-relay", "--port", "70000"]).is_err());
    }
}
