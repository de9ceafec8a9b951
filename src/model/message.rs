use crate::{
    id::{ChannelId, EmojiId, GuildId, MessageId, WebhookId},
    model::{Member, User},
};
use serde::{Deserialize, Serialize};

/// A message in a text channel.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Message {
    /// Snowflake of this message.
    pub id: MessageId,
    /// Channel the message was sent in.
    pub channel_id: ChannelId,
    /// Guild the message was sent in; absent for direct messages.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// Author of the message. Absent on some webhook-crossposted payloads.
    #[serde(default)]
    pub author: Option<User>,
    /// Guild member form of the author, when in a guild.
    #[serde(default)]
    pub member: Option<Member>,
    /// Message text content.
    #[serde(default)]
    pub content: String,
    /// ISO8601 creation timestamp.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// ISO8601 edit timestamp, if the message was edited.
    #[serde(default)]
    pub edited_timestamp: Option<String>,
    /// Whether this was a text-to-speech message.
    #[serde(default)]
    pub tts: bool,
    /// Whether the message mentions @everyone.
    #[serde(default)]
    pub mention_everyone: bool,
    /// Users mentioned in the message.
    #[serde(default)]
    pub mentions: Vec<User>,
    /// Whether the message is pinned.
    #[serde(default)]
    pub pinned: bool,
    /// Webhook that produced the message, if any.
    #[serde(default)]
    pub webhook_id: Option<WebhookId>,
    /// Message type discriminant.
    #[serde(rename = "type", default)]
    pub kind: u8,
}

/// The emoji half of a reaction payload.
///
/// Unicode emoji carry only `name`; custom emoji carry `id` too.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ReactionEmoji {
    /// Snowflake, for custom emoji.
    #[serde(default)]
    pub id: Option<EmojiId>,
    /// Unicode glyph or custom emoji name.
    #[serde(default)]
    pub name: Option<String>,
    /// Whether a custom emoji is animated.
    #[serde(default)]
    pub animated: bool,
}
