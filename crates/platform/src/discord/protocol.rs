//! Discord gateway wire format (API v10, JSON encoding).
//!
//! Only the opcodes and dispatch events this bot drives are modeled; any
//! other frame is decoded to the envelope and ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway opcodes used by this adapter.
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const PRESENCE_UPDATE: u8 = 3;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Intent bit for guild lifecycle events (GUILD_CREATE / GUILD_DELETE).
pub const INTENT_GUILDS: u64 = 1 << 0;

/// Activity type clients render as "Watching ...".
pub const ACTIVITY_WATCHING: u8 = 3;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Envelope every gateway frame travels in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    /// Sequence number, present on dispatches; echoed back in heartbeats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    /// Dispatch event name, only present when `op` is 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

/// Encode one outbound frame as gateway JSON text.
pub fn encode<T: Serialize>(op: u8, d: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&GatewayFrame {
        op,
        d: serde_json::to_value(d)?,
        s: None,
        t: None,
    })
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

/// Payload of Hello (op 10).
#[derive(Debug, Clone, Deserialize)]
pub struct Hello {
    /// Heartbeat cadence in milliseconds.
    pub heartbeat_interval: u64,
}

/// Payload of the READY dispatch.
#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    pub session_id: String,
    pub user: ReadyUser,
    #[serde(default)]
    pub guilds: Vec<GuildRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyUser {
    /// Snowflake ids arrive as strings on the wire.
    pub id: String,
    pub username: String,
}

/// Guild reference carried by READY, GUILD_CREATE, and GUILD_DELETE.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildRef {
    pub id: String,
    /// On GUILD_DELETE, true means an outage rather than a removal.
    #[serde(default)]
    pub unavailable: bool,
}

// ---------------------------------------------------------------------------
// Outbound payloads
// ---------------------------------------------------------------------------

/// Identify payload (op 2).
#[derive(Debug, Serialize)]
pub struct Identify<'a> {
    pub token: &'a str,
    pub intents: u64,
    pub properties: ConnectionProperties,
}

#[derive(Debug, Serialize)]
pub struct ConnectionProperties {
    pub os: &'static str,
    pub browser: &'static str,
    pub device: &'static str,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS,
            browser: "tickerbot",
            device: "tickerbot",
        }
    }
}

/// Presence update payload (op 3).
#[derive(Debug, Serialize)]
pub struct PresenceUpdate<'a> {
    pub since: Option<u64>,
    pub activities: Vec<Activity<'a>>,
    pub status: &'a str,
    pub afk: bool,
}

#[derive(Debug, Serialize)]
pub struct Activity<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub kind: u8,
}

impl<'a> PresenceUpdate<'a> {
    /// Online presence with a single "watching" activity.
    pub fn watching(label: &'a str) -> Self {
        Self {
            since: None,
            activities: vec![Activity {
                name: label,
                kind: ACTIVITY_WATCHING,
            }],
            status: "online",
            afk: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_identify_shape() {
        let identify = Identify {
            token: "token-x",
            intents: INTENT_GUILDS,
            properties: ConnectionProperties::default(),
        };
        let text = encode(opcode::IDENTIFY, &identify).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["op"], 2);
        assert_eq!(value["d"]["token"], "token-x");
        assert_eq!(value["d"]["intents"], 1);
        assert!(value.get("s").is_none());
        assert!(value.get("t").is_none());
    }

    #[test]
    fn test_encode_heartbeat_echoes_sequence() {
        let text = encode(opcode::HEARTBEAT, &Some(42u64)).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["op"], 1);
        assert_eq!(value["d"], 42);

        let text = encode(opcode::HEARTBEAT, &None::<u64>).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert!(value["d"].is_null());
    }

    #[test]
    fn test_presence_update_is_watching_and_online() {
        let text = encode(
            opcode::PRESENCE_UPDATE,
            &PresenceUpdate::watching("WEMIX at $1,234.5000"),
        )
        .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["op"], 3);
        assert_eq!(value["d"]["status"], "online");
        assert_eq!(value["d"]["afk"], false);
        assert_eq!(value["d"]["activities"][0]["name"], "WEMIX at $1,234.5000");
        assert_eq!(value["d"]["activities"][0]["type"], 3);
    }

    #[test]
    fn test_decode_hello_frame() {
        let text = r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#;
        let frame: GatewayFrame = serde_json::from_str(text).unwrap();
        assert_eq!(frame.op, opcode::HELLO);

        let hello: Hello = serde_json::from_value(frame.d).unwrap();
        assert_eq!(hello.heartbeat_interval, 41250);
    }

    #[test]
    fn test_decode_ready_dispatch() {
        let text = r#"{
            "op": 0,
            "s": 1,
            "t": "READY",
            "d": {
                "v": 10,
                "session_id": "abc123",
                "user": {"id": "159", "username": "tickerbot"},
                "guilds": [{"id": "42", "unavailable": true}]
            }
        }"#;
        let frame: GatewayFrame = serde_json::from_str(text).unwrap();
        assert_eq!(frame.op, opcode::DISPATCH);
        assert_eq!(frame.s, Some(1));
        assert_eq!(frame.t.as_deref(), Some("READY"));

        let ready: Ready = serde_json::from_value(frame.d).unwrap();
        assert_eq!(ready.session_id, "abc123");
        assert_eq!(ready.user.username, "tickerbot");
        assert_eq!(ready.guilds.len(), 1);
        assert_eq!(ready.guilds[0].id, "42");
    }

    #[test]
    fn test_guild_ref_defaults_to_available() {
        let guild: GuildRef = serde_json::from_str(r#"{"id":"7"}"#).unwrap();
        assert!(!guild.unavailable);
    }
}
