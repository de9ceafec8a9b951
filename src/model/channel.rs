use crate::{
    id::{ChannelId, GuildId, MessageId, StageInstanceId},
    model::User,
};
use serde::{Deserialize, Serialize};

/// A guild channel, thread, or direct-message channel.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Channel {
    /// Snowflake of this channel.
    pub id: ChannelId,
    /// Guild this channel belongs to; absent for direct messages.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// Channel name; absent for direct messages.
    #[serde(default)]
    pub name: Option<String>,
    /// Channel type discriminant (text, voice, category, ...).
    #[serde(rename = "type", default)]
    pub kind: u8,
    /// Sort position.
    #[serde(default)]
    pub position: i64,
    /// Channel topic.
    #[serde(default)]
    pub topic: Option<String>,
    /// Parent category or thread parent.
    #[serde(default)]
    pub parent_id: Option<ChannelId>,
    /// Snowflake of the most recent message.
    #[serde(default)]
    pub last_message_id: Option<MessageId>,
}

/// A live stage instance inside a stage channel.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StageInstance {
    /// Snowflake of this stage instance.
    pub id: StageInstanceId,
    /// Guild the stage belongs to.
    pub guild_id: GuildId,
    /// Stage channel hosting the instance.
    pub channel_id: ChannelId,
    /// Stage topic.
    #[serde(default)]
    pub topic: String,
    /// Privacy level discriminant.
    #[serde(default)]
    pub privacy_level: u8,
}

/// A channel invite.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Invite {
    /// Unique invite code.
    #[serde(default)]
    pub code: String,
    /// Guild the invite points into, when known.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// Channel the invite points at.
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    /// User who created the invite.
    #[serde(default)]
    pub inviter: Option<User>,
    /// Seconds until expiry, zero for never.
    #[serde(default)]
    pub max_age: u64,
    /// Maximum number of uses, zero for unlimited.
    #[serde(default)]
    pub max_uses: u64,
    /// Whether the invite grants temporary membership.
    #[serde(default)]
    pub temporary: bool,
}
