//! Newtypes around Discord snowflake IDs.
//!
//! Discord transmits snowflakes as JSON strings to avoid 53-bit float
//! truncation; all ID types here deserialize from either a string or a
//! bare integer, and serialize back to a string.

use serde::{
    de::{Error as DeError, Visitor},
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};
use std::fmt::{Display, Formatter, Result as FmtResult};

macro_rules! impl_id {
    ($(#[$attr:meta])* $Id:ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub struct $Id(pub u64);

        impl $Id {
            /// Returns the u64 representation of this Id.
            #[must_use]
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $Id {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl Display for $Id {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                Display::fmt(&self.0, f)
            }
        }

        impl Serialize for $Id {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $Id {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(SnowflakeVisitor).map(Self)
            }
        }
    };
}

impl_id! {
    /// ID of a Discord guild (colloquially, "server").
    GuildId
}
impl_id! {
    /// ID of a Discord voice/text channel.
    ChannelId
}
impl_id! {
    /// ID of a Discord user.
    UserId
}
impl_id! {
    /// ID of a guild role.
    RoleId
}
impl_id! {
    /// ID of a custom emoji.
    EmojiId
}
impl_id! {
    /// ID of a message.
    MessageId
}
impl_id! {
    /// ID of a webhook.
    WebhookId
}
impl_id! {
    /// ID of an application.
    ApplicationId
}
impl_id! {
    /// ID of an interaction.
    InteractionId
}
impl_id! {
    /// ID of a slash command.
    CommandId
}
impl_id! {
    /// ID of a stage instance.
    StageInstanceId
}
impl_id! {
    /// ID of a guild integration.
    IntegrationId
}

struct SnowflakeVisitor;

impl<'de> Visitor<'de> for SnowflakeVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("a snowflake as a string or integer")
    }

    fn visit_u64<E: DeError>(self, value: u64) -> Result<Self::Value, E> {
        Ok(value)
    }

    fn visit_i64<E: DeError>(self, value: i64) -> Result<Self::Value, E> {
        u64::try_from(value).map_err(|_| E::custom("snowflake out of range"))
    }

    fn visit_str<E: DeError>(self, value: &str) -> Result<Self::Value, E> {
        value.parse().map_err(E::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn snowflake_accepts_string_and_integer() {
        let s: GuildId = serde_json::from_str("\"81384788765712384\"").unwrap();
        let i: GuildId = serde_json::from_str("81384788765712384").unwrap();

        assert_eq!(s, i);
        assert_eq!(s.get(), 81_384_788_765_712_384);
    }

    #[test]
    fn snowflake_serializes_as_string() {
        let id = ChannelId(703_979_171_136_094_208);
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"703979171136094208\""
        );
    }
}
