//! Gateway wire envelope and the payloads this library sends.

use crate::{
    id::{ChannelId, GuildId, UserId},
    intents::Intents,
    model::Activity,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Gateway operation codes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum Opcode {
    /// Server dispatches an event.
    Dispatch = 0,
    /// Keepalive, sent in both directions.
    Heartbeat = 1,
    /// Client authenticates a new session.
    Identify = 2,
    /// Client updates its presence.
    PresenceUpdate = 3,
    /// Client joins, moves, or leaves a voice channel.
    VoiceStateUpdate = 4,
    /// Client resumes a dropped session.
    Resume = 6,
    /// Server requests a reconnect.
    Reconnect = 7,
    /// Client requests guild member chunks.
    RequestGuildMembers = 8,
    /// Server invalidates the session.
    InvalidSession = 9,
    /// Server greets a fresh connection.
    Hello = 10,
    /// Server acknowledges a heartbeat.
    HeartbeatAck = 11,
}

impl Opcode {
    /// Maps a wire value onto an opcode.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::VoiceStateUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestGuildMembers,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            _ => return None,
        })
    }
}

/// The `{op, s, t, d}` JSON envelope every gateway message travels in.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub op: u8,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub d: Value,
}

fn envelope(op: Opcode, d: Value) -> String {
    json!({ "op": op as u8, "d": d }).to_string()
}

/// Presence block sent in IDENTIFY and op 3 updates.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PresenceUpdate {
    /// Unix ms timestamp of going idle, if idle.
    pub since: Option<u64>,
    /// Activities to display.
    #[serde(default)]
    pub activities: Vec<Activity>,
    /// `online`, `idle`, `dnd`, `invisible`, or `offline`.
    pub status: String,
    /// Whether the client is marked AFK.
    pub afk: bool,
}

/// Serialises an op 1 heartbeat carrying the last received sequence.
pub(crate) fn heartbeat(last_sequence: Option<u64>) -> String {
    envelope(
        Opcode::Heartbeat,
        last_sequence.map_or(Value::Null, Value::from),
    )
}

/// Serialises an op 2 IDENTIFY.
pub(crate) fn identify(
    token: &str,
    intents: Intents,
    shard: [u32; 2],
    presence: Option<&PresenceUpdate>,
) -> String {
    let mut d = json!({
        "token": token,
        "intents": intents.bits(),
        "properties": {
            "$os": std::env::consts::OS,
            "$browser": "shrike",
            "$device": "shrike",
        },
        "compress": false,
        "shard": shard,
    });

    if let Some(p) = presence {
        d["presence"] = json!(p);
    }

    envelope(Opcode::Identify, d)
}

/// Serialises an op 6 RESUME.
pub(crate) fn resume(token: &str, session_id: &str, seq: u64) -> String {
    envelope(
        Opcode::Resume,
        json!({
            "token": token,
            "session_id": session_id,
            "seq": seq,
        }),
    )
}

/// Serialises an op 3 presence update.
pub(crate) fn presence_update(presence: &PresenceUpdate) -> String {
    envelope(Opcode::PresenceUpdate, json!(presence))
}

/// Serialises an op 4 voice state update.
///
/// A `None` channel leaves the current voice channel.
pub(crate) fn voice_state_update(
    guild_id: GuildId,
    channel_id: Option<ChannelId>,
    self_mute: bool,
    self_deaf: bool,
) -> String {
    envelope(
        Opcode::VoiceStateUpdate,
        json!({
            "guild_id": guild_id,
            "channel_id": channel_id,
            "self_mute": self_mute,
            "self_deaf": self_deaf,
        }),
    )
}

/// Serialises an op 8 guild member chunk request.
pub(crate) fn request_guild_members(
    guild_id: GuildId,
    query: &str,
    limit: u64,
    presences: bool,
    user_ids: &[UserId],
    nonce: Option<&str>,
) -> String {
    let mut d = json!({
        "guild_id": guild_id,
        "query": query,
        "limit": limit,
        "presences": presences,
    });

    if !user_ids.is_empty() {
        d["user_ids"] = json!(user_ids);
    }
    if let Some(n) = nonce {
        d["nonce"] = json!(n);
    }

    envelope(Opcode::RequestGuildMembers, d)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identify_carries_token_intents_and_shard() {
        let raw = identify("T", Intents(513), [0, 1], None);
        let v: Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(v["op"], 2);
        assert_eq!(v["d"]["token"], "T");
        assert_eq!(v["d"]["intents"], 513);
        assert_eq!(v["d"]["shard"], serde_json::json!([0, 1]));
        assert_eq!(v["d"]["compress"], false);
        assert!(v["d"]["properties"]["$os"].is_string());
        assert!(v["d"].get("presence").is_none());
    }

    #[test]
    fn resume_replays_session_and_sequence() {
        let raw = resume("T", "abc", 42);
        let v: Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(v["op"], 6);
        assert_eq!(v["d"]["session_id"], "abc");
        assert_eq!(v["d"]["seq"], 42);
    }

    #[test]
    fn heartbeat_sends_null_before_first_sequence() {
        let v: Value = serde_json::from_str(&heartbeat(None)).unwrap();
        assert_eq!(v["op"], 1);
        assert!(v["d"].is_null());

        let v: Value = serde_json::from_str(&heartbeat(Some(7))).unwrap();
        assert_eq!(v["d"], 7);
    }

    #[test]
    fn envelope_parses_with_optional_fields() {
        let e: Envelope =
            serde_json::from_str(r#"{"op":0,"s":3,"t":"READY","d":{"v":10}}"#).unwrap();
        assert_eq!(e.op, 0);
        assert_eq!(e.s, Some(3));
        assert_eq!(e.t.as_deref(), Some("READY"));

        let e: Envelope = serde_json::from_str(r#"{"op":11}"#).unwrap();
        assert_eq!(e.op, 11);
        assert!(e.s.is_none() && e.t.is_none() && e.d.is_null());
    }
}
