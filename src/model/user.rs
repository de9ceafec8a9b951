use crate::id::{GuildId, RoleId, UserId};
use serde::{Deserialize, Serialize};

/// A Discord user.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct User {
    /// Snowflake of this user.
    pub id: UserId,
    /// Account name.
    #[serde(default)]
    pub username: String,
    /// Four-digit legacy discriminator, `"0"` on migrated accounts.
    #[serde(default)]
    pub discriminator: String,
    /// Whether the account belongs to an application.
    #[serde(default)]
    pub bot: bool,
    /// Avatar image hash.
    #[serde(default)]
    pub avatar: Option<String>,
}

/// A user's membership of one guild.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Member {
    /// The underlying user, absent in partial member payloads.
    #[serde(default)]
    pub user: Option<User>,
    /// Guild this membership belongs to, when the payload carries it.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// Per-guild display name override.
    #[serde(default)]
    pub nick: Option<String>,
    /// Roles held in the guild.
    #[serde(default)]
    pub roles: Vec<RoleId>,
    /// ISO8601 timestamp of joining.
    #[serde(default)]
    pub joined_at: Option<String>,
    /// Whether the member is server-deafened.
    #[serde(default)]
    pub deaf: bool,
    /// Whether the member is server-muted.
    #[serde(default)]
    pub mute: bool,
}

impl Member {
    /// Snowflake of the member's user, when present.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id)
    }
}

/// A user's presence on a guild.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Presence {
    /// User this presence belongs to.
    pub user: User,
    /// Guild the presence was observed on.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// `online`, `idle`, `dnd`, or `offline`.
    #[serde(default)]
    pub status: String,
    /// Activities the user is engaged in.
    #[serde(default)]
    pub activities: Vec<Activity>,
}

/// One activity within a presence.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Activity {
    /// Display name of the activity.
    pub name: String,
    /// Activity type discriminant (game, streaming, listening, ...).
    #[serde(rename = "type", default)]
    pub kind: u8,
    /// Stream or other URL, when given.
    #[serde(default)]
    pub url: Option<String>,
}
