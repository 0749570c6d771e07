// Node configuration.
//
// `HostConfig` and `JoinConfig` carry what `start_host` and `join` need to
// bring a node up; both embed a `NetConfig` with the transport tunables the
// node loop and reader threads use. All three are plain serde structs with
// `#[serde(default)]`, so a host application can keep them in a JSON file
// and only list the fields it changes.

use serde::{Deserialize, Serialize};

use gametable_protocol::{MAX_MESSAGE_SIZE, PROTOCOL_VERSION};

use crate::error::NetError;

/// Transport tunables shared by hosts and joiners.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// How often the node pings every logged-in connection.
    pub ping_interval_ms: u64,
    /// How long a connection may take to finish the join handshake.
    pub handshake_timeout_ms: u64,
    /// Malformed or out-of-place packets tolerated per connection before it
    /// is closed.
    pub max_protocol_faults: u32,
    /// Largest frame a reader thread will accept.
    pub max_message_size: u32,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 5_000,
            handshake_timeout_ms: 10_000,
            max_protocol_faults: 8,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl NetConfig {
    pub fn from_json(json: &str) -> Result<Self, NetError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Configuration for `start_host`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Port to listen on. 0 lets the OS pick (see `NodeHandle::local_addr`).
    pub port: u16,
    pub bind_address: String,
    /// Shared session password. `None` admits anyone.
    pub password: Option<String>,
    /// Roster size cap, host included.
    pub max_players: usize,
    pub player_name: String,
    pub character_name: String,
    pub net: NetConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: 6812,
            bind_address: "127.0.0.1".into(),
            password: None,
            max_players: 8,
            player_name: "host".into(),
            character_name: "Game Master".into(),
            net: NetConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn from_json(json: &str) -> Result<Self, NetError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Configuration for `join`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Host address, `host:port`.
    pub address: String,
    pub password: String,
    pub player_name: String,
    pub character_name: String,
    /// Protocol version to request. Defaults to the newest this build
    /// speaks; the host answers with what it will actually use.
    pub version: u32,
    pub net: NetConfig,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6812".into(),
            password: String::new(),
            player_name: "player".into(),
            character_name: "Adventurer".into(),
            version: PROTOCOL_VERSION,
            net: NetConfig::default(),
        }
    }
}

impl JoinConfig {
    pub fn from_json(json: &str) -> Result<Self, NetError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = HostConfig::from_json(r#"{"port": 0, "net": {"ping_interval_ms": 250}}"#).unwrap();
        assert_eq!(config.port, 0);
        assert_eq!(config.net.ping_interval_ms, 250);
        assert_eq!(config.net.max_protocol_faults, NetConfig::default().max_protocol_faults);
        assert_eq!(config.max_players, 8);
    }

    #[test]
    fn join_config_defaults_to_current_version() {
        let config = JoinConfig::from_json("{}").unwrap();
        assert_eq!(config.version, PROTOCOL_VERSION);
    }

    #[test]
    fn bad_json_is_config_error() {
        assert!(matches!(NetConfig::from_json("[1, 2"), Err(NetError::Config(_))));
    }
}
