//! Voice gateway opcodes and their `{op, d}` envelope.

use crate::id::{GuildId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::trace;

/// Encryption mode requested during SELECT_PROTOCOL.
pub(crate) const ENCRYPTION_MODE: &str = "xsalsa20_poly1305";

/// Op 0: authenticate against the voice gateway.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Identify {
    pub server_id: GuildId,
    pub user_id: UserId,
    pub session_id: String,
    pub token: String,
}

/// Op 1: select the UDP transport after IP discovery.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct SelectProtocol {
    pub protocol: String,
    pub data: ProtocolData,
}

/// Transport parameters inside SELECT_PROTOCOL.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct ProtocolData {
    pub address: String,
    pub port: u16,
    pub mode: String,
}

/// Op 2: server handshake reply carrying the RTP parameters.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Ready {
    pub ssrc: u32,
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub modes: Vec<String>,
}

/// Op 4: session keys after protocol selection.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct SessionDescription {
    pub mode: String,
    pub secret_key: Vec<u8>,
}

/// Op 5: speaking flag announcement, in either direction.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Speaking {
    /// Raw speaking bits; bit 0 is the microphone flag.
    pub speaking: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
    pub ssrc: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

/// Op 7: resume a dropped voice session.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Resume {
    pub server_id: GuildId,
    pub session_id: String,
    pub token: String,
}

/// Op 8: server greeting with the heartbeat cadence.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Hello {
    pub heartbeat_interval: f64,
}

/// Op 13: another client left the call.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct ClientDisconnect {
    pub user_id: UserId,
}

/// Every voice gateway message this library sends or understands.
#[derive(Clone, Debug)]
pub(crate) enum VoiceEvent {
    Identify(Identify),
    SelectProtocol(SelectProtocol),
    Ready(Ready),
    /// Op 3; `d` is the bare nonce.
    Heartbeat(u64),
    SessionDescription(SessionDescription),
    Speaking(Speaking),
    /// Op 6; `d` echoes the heartbeat nonce.
    HeartbeatAck(u64),
    Resume(Resume),
    Hello(Hello),
    Resumed,
    ClientDisconnect(ClientDisconnect),
}

impl VoiceEvent {
    /// Wire opcode of this event.
    pub(crate) fn opcode(&self) -> u8 {
        match self {
            Self::Identify(_) => 0,
            Self::SelectProtocol(_) => 1,
            Self::Ready(_) => 2,
            Self::Heartbeat(_) => 3,
            Self::SessionDescription(_) => 4,
            Self::Speaking(_) => 5,
            Self::HeartbeatAck(_) => 6,
            Self::Resume(_) => 7,
            Self::Hello(_) => 8,
            Self::Resumed => 9,
            Self::ClientDisconnect(_) => 13,
        }
    }

    /// Serialises into the `{op, d}` envelope.
    pub(crate) fn to_json_string(&self) -> String {
        let d = match self {
            Self::Identify(p) => json!(p),
            Self::SelectProtocol(p) => json!(p),
            Self::Ready(p) => json!(p),
            Self::Heartbeat(nonce) => json!(nonce),
            Self::SessionDescription(p) => json!(p),
            Self::Speaking(p) => json!(p),
            Self::HeartbeatAck(nonce) => json!(nonce),
            Self::Resume(p) => json!(p),
            Self::Hello(p) => json!(p),
            Self::Resumed => Value::Null,
            Self::ClientDisconnect(p) => json!(p),
        };

        json!({ "op": self.opcode(), "d": d }).to_string()
    }

    /// Parses one envelope; unknown opcodes yield `None`.
    pub(crate) fn parse(text: &str) -> serde_json::Result<Option<Self>> {
        #[derive(Deserialize)]
        struct Envelope {
            op: u8,
            #[serde(default)]
            d: Value,
        }

        let env: Envelope = serde_json::from_str(text)?;
        Ok(Some(match env.op {
            0 => Self::Identify(serde_json::from_value(env.d)?),
            1 => Self::SelectProtocol(serde_json::from_value(env.d)?),
            2 => Self::Ready(serde_json::from_value(env.d)?),
            3 => Self::Heartbeat(serde_json::from_value(env.d)?),
            4 => Self::SessionDescription(serde_json::from_value(env.d)?),
            5 => Self::Speaking(serde_json::from_value(env.d)?),
            6 => Self::HeartbeatAck(serde_json::from_value(env.d)?),
            7 => Self::Resume(serde_json::from_value(env.d)?),
            8 => Self::Hello(serde_json::from_value(env.d)?),
            9 => Self::Resumed,
            13 => Self::ClientDisconnect(serde_json::from_value(env.d)?),
            other => {
                trace!("Ignoring unknown voice opcode {other}");
                return Ok(None);
            },
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identify_envelope_shape() {
        let raw = VoiceEvent::Identify(Identify {
            server_id: GuildId(1),
            user_id: UserId(2),
            session_id: "s".into(),
            token: "tk".into(),
        })
        .to_json_string();

        let v: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["op"], 0);
        assert_eq!(v["d"]["server_id"], "1");
        assert_eq!(v["d"]["user_id"], "2");
        assert_eq!(v["d"]["session_id"], "s");
        assert_eq!(v["d"]["token"], "tk");
    }

    #[test]
    fn heartbeat_carries_bare_nonce() {
        let raw = VoiceEvent::Heartbeat(123_456).to_json_string();
        let v: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["op"], 3);
        assert_eq!(v["d"], 123_456);

        match VoiceEvent::parse(r#"{"op":6,"d":123456}"#).unwrap() {
            Some(VoiceEvent::HeartbeatAck(nonce)) => assert_eq!(nonce, 123_456),
            other => panic!("wrong parse: {other:?}"),
        }
    }

    #[test]
    fn unknown_opcodes_are_skipped() {
        assert!(VoiceEvent::parse(r#"{"op":12,"d":{}}"#).unwrap().is_none());
    }

    #[test]
    fn session_description_parses_key_bytes() {
        let raw = format!(
            r#"{{"op":4,"d":{{"mode":"xsalsa20_poly1305","secret_key":[{}]}}}}"#,
            (0..32).map(|i| i.to_string()).collect::<Vec<_>>().join(",")
        );

        match VoiceEvent::parse(&raw).unwrap() {
            Some(VoiceEvent::SessionDescription(desc)) => {
                assert_eq!(desc.secret_key.len(), 32);
                assert_eq!(desc.mode, ENCRYPTION_MODE);
            },
            other => panic!("wrong parse: {other:?}"),
        }
    }
}
