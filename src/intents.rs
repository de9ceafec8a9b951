//! Gateway intents, declaring which event families a connection receives.

use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// Bitmask of gateway intents sent during IDENTIFY.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Intents(pub u64);

impl Intents {
    /// Guild create/update/delete, roles, channels.
    pub const GUILDS: Intents = Intents(1 << 0);
    /// Member add/update/remove. Privileged.
    pub const GUILD_MEMBERS: Intents = Intents(1 << 1);
    /// Ban add/remove.
    pub const GUILD_BANS: Intents = Intents(1 << 2);
    /// Emoji updates.
    pub const GUILD_EMOJIS: Intents = Intents(1 << 3);
    /// Integration updates.
    pub const GUILD_INTEGRATIONS: Intents = Intents(1 << 4);
    /// Webhook updates.
    pub const GUILD_WEBHOOKS: Intents = Intents(1 << 5);
    /// Invite create/delete.
    pub const GUILD_INVITES: Intents = Intents(1 << 6);
    /// Voice state updates. Required for voice connections.
    pub const GUILD_VOICE_STATES: Intents = Intents(1 << 7);
    /// Presence updates. Privileged.
    pub const GUILD_PRESENCES: Intents = Intents(1 << 8);
    /// Guild message create/update/delete.
    pub const GUILD_MESSAGES: Intents = Intents(1 << 9);
    /// Guild reaction add/remove.
    pub const GUILD_MESSAGE_REACTIONS: Intents = Intents(1 << 10);
    /// Guild typing notifications.
    pub const GUILD_MESSAGE_TYPING: Intents = Intents(1 << 11);
    /// Direct message create/update/delete.
    pub const DIRECT_MESSAGES: Intents = Intents(1 << 12);
    /// Direct message reaction add/remove.
    pub const DIRECT_MESSAGE_REACTIONS: Intents = Intents(1 << 13);
    /// Direct message typing notifications.
    pub const DIRECT_MESSAGE_TYPING: Intents = Intents(1 << 14);

    /// Every non-privileged intent.
    pub const fn unprivileged() -> Intents {
        Intents(
            Self::GUILDS.0
                | Self::GUILD_BANS.0
                | Self::GUILD_EMOJIS.0
                | Self::GUILD_INTEGRATIONS.0
                | Self::GUILD_WEBHOOKS.0
                | Self::GUILD_INVITES.0
                | Self::GUILD_VOICE_STATES.0
                | Self::GUILD_MESSAGES.0
                | Self::GUILD_MESSAGE_REACTIONS.0
                | Self::GUILD_MESSAGE_TYPING.0
                | Self::DIRECT_MESSAGES.0
                | Self::DIRECT_MESSAGE_REACTIONS.0
                | Self::DIRECT_MESSAGE_TYPING.0,
        )
    }

    /// Returns the raw bitmask.
    #[must_use]
    pub fn bits(self) -> u64 {
        self.0
    }

    /// Returns whether every intent in `other` is enabled in `self`.
    #[must_use]
    pub fn contains(self, other: Intents) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Intents {
    type Output = Intents;

    fn bitor(self, rhs: Intents) -> Intents {
        Intents(self.0 | rhs.0)
    }
}

impl BitOrAssign for Intents {
    fn bitor_assign(&mut self, rhs: Intents) {
        self.0 |= rhs.0;
    }
}
