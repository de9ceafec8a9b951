use crate::id::{EmojiId, GuildId, IntegrationId, RoleId, UserId};
use serde::{Deserialize, Serialize};

/// A Discord guild.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Guild {
    /// Snowflake of this guild.
    pub id: GuildId,
    /// Guild name.
    #[serde(default)]
    pub name: String,
    /// Snowflake of the owning user.
    #[serde(default)]
    pub owner_id: UserId,
    /// Icon image hash.
    #[serde(default)]
    pub icon: Option<String>,
    /// Total member count, sent on GUILD_CREATE.
    #[serde(default)]
    pub member_count: Option<u64>,
    /// Whether this guild is marked unavailable due to an outage.
    #[serde(default)]
    pub unavailable: bool,
}

/// A guild role.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Role {
    /// Snowflake of this role.
    pub id: RoleId,
    /// Guild this role belongs to, when the payload carries it.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// Role name.
    #[serde(default)]
    pub name: String,
    /// Packed RGB display colour.
    #[serde(default)]
    pub color: u32,
    /// Sort position in the role list.
    #[serde(default)]
    pub position: i64,
    /// Whether the role is hoisted in the member sidebar.
    #[serde(default)]
    pub hoist: bool,
    /// Whether the role is mentionable by everyone.
    #[serde(default)]
    pub mentionable: bool,
}

/// A custom guild emoji.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Emoji {
    /// Snowflake of this emoji.
    pub id: EmojiId,
    /// Emoji name.
    #[serde(default)]
    pub name: String,
    /// Whether the emoji is animated.
    #[serde(default)]
    pub animated: bool,
    /// Whether the emoji is managed by an integration.
    #[serde(default)]
    pub managed: bool,
}

/// A guild integration (twitch, youtube, or an application).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Integration {
    /// Snowflake of this integration.
    pub id: IntegrationId,
    /// Guild this integration belongs to, when the payload carries it.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// Integration name.
    #[serde(default)]
    pub name: String,
    /// Integration type string.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Whether the integration is enabled.
    #[serde(default)]
    pub enabled: bool,
}
