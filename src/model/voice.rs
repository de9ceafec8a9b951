use crate::id::{ChannelId, GuildId, UserId};
use serde::{Deserialize, Serialize};

/// A user's voice connection state within a guild.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct VoiceState {
    /// Guild the state belongs to, when the payload carries it.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// Channel the user is connected to; `None` means disconnected.
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    /// User the state describes.
    pub user_id: UserId,
    /// Voice session ID used for voice websocket authentication.
    #[serde(default)]
    pub session_id: String,
    /// Whether the user is server-deafened.
    #[serde(default)]
    pub deaf: bool,
    /// Whether the user is server-muted.
    #[serde(default)]
    pub mute: bool,
    /// Whether the user has deafened themselves.
    #[serde(default)]
    pub self_deaf: bool,
    /// Whether the user has muted themselves.
    #[serde(default)]
    pub self_mute: bool,
    /// Whether the user is screensharing.
    #[serde(default)]
    pub self_stream: bool,
    /// Whether the user is suppressed (stage audience).
    #[serde(default)]
    pub suppress: bool,
}
