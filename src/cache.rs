//! The object cache interface consumed by the runtime.
//!
//! The cache itself is an external collaborator; the runtime only needs
//! snowflake-keyed lookup, insert, and remove. Returned entries are
//! shared (`Arc`) so event records stay valid for the duration of a
//! dispatch regardless of concurrent cache eviction.

use crate::{
    id::{ChannelId, EmojiId, GuildId, RoleId, UserId},
    model::{Channel, Emoji, Guild, Role, User},
};
use std::sync::Arc;

/// Snowflake-keyed lookup/insert/remove surface the runtime expects from
/// the embedding application's object cache.
///
/// All methods must be cheap; they are called on shard dispatch tasks.
pub trait Cache: Send + Sync {
    /// Looks up a guild.
    fn guild(&self, id: GuildId) -> Option<Arc<Guild>>;
    /// Looks up a user.
    fn user(&self, id: UserId) -> Option<Arc<User>>;
    /// Looks up a channel.
    fn channel(&self, id: ChannelId) -> Option<Arc<Channel>>;
    /// Looks up a role.
    fn role(&self, id: RoleId) -> Option<Arc<Role>>;
    /// Looks up an emoji.
    fn emoji(&self, id: EmojiId) -> Option<Arc<Emoji>>;

    /// Stores a guild observed on the gateway.
    fn insert_guild(&self, guild: Arc<Guild>);
    /// Stores a user observed on the gateway.
    fn insert_user(&self, user: Arc<User>);
    /// Stores a channel observed on the gateway.
    fn insert_channel(&self, channel: Arc<Channel>);
    /// Stores a role observed on the gateway.
    fn insert_role(&self, role: Arc<Role>);
    /// Stores an emoji observed on the gateway.
    fn insert_emoji(&self, emoji: Arc<Emoji>);

    /// Drops a guild.
    fn remove_guild(&self, id: GuildId);
    /// Drops a channel.
    fn remove_channel(&self, id: ChannelId);
    /// Drops a role.
    fn remove_role(&self, id: RoleId);
}

/// A cache which stores nothing and resolves nothing.
///
/// Useful for gateway-only deployments and tests exercising the
/// missing-reference dispatch path.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullCache;

impl Cache for NullCache {
    fn guild(&self, _: GuildId) -> Option<Arc<Guild>> {
        None
    }

    fn user(&self, _: UserId) -> Option<Arc<User>> {
        None
    }

    fn channel(&self, _: ChannelId) -> Option<Arc<Channel>> {
        None
    }

    fn role(&self, _: RoleId) -> Option<Arc<Role>> {
        None
    }

    fn emoji(&self, _: EmojiId) -> Option<Arc<Emoji>> {
        None
    }

    fn insert_guild(&self, _: Arc<Guild>) {}

    fn insert_user(&self, _: Arc<User>) {}

    fn insert_channel(&self, _: Arc<Channel>) {}

    fn insert_role(&self, _: Arc<Role>) {}

    fn insert_emoji(&self, _: Arc<Emoji>) {}

    fn remove_guild(&self, _: GuildId) {}

    fn remove_channel(&self, _: ChannelId) {}

    fn remove_role(&self, _: RoleId) {}
}

#[cfg(any(test, doc))]
pub(crate) mod memory {
    //! A trivial in-memory cache used by the dispatch tests.

    use super::Cache;
    use crate::{
        id::{ChannelId, EmojiId, GuildId, RoleId, UserId},
        model::{Channel, Emoji, Guild, Role, User},
    };
    use dashmap::DashMap;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    pub struct MemoryCache {
        guilds: DashMap<GuildId, Arc<Guild>>,
        users: DashMap<UserId, Arc<User>>,
        channels: DashMap<ChannelId, Arc<Channel>>,
        roles: DashMap<RoleId, Arc<Role>>,
        emojis: DashMap<EmojiId, Arc<Emoji>>,
    }

    impl Cache for MemoryCache {
        fn guild(&self, id: GuildId) -> Option<Arc<Guild>> {
            self.guilds.get(&id).map(|g| Arc::clone(&g))
        }

        fn user(&self, id: UserId) -> Option<Arc<User>> {
            self.users.get(&id).map(|u| Arc::clone(&u))
        }

        fn channel(&self, id: ChannelId) -> Option<Arc<Channel>> {
            self.channels.get(&id).map(|c| Arc::clone(&c))
        }

        fn role(&self, id: RoleId) -> Option<Arc<Role>> {
            self.roles.get(&id).map(|r| Arc::clone(&r))
        }

        fn emoji(&self, id: EmojiId) -> Option<Arc<Emoji>> {
            self.emojis.get(&id).map(|e| Arc::clone(&e))
        }

        fn insert_guild(&self, guild: Arc<Guild>) {
            self.guilds.insert(guild.id, guild);
        }

        fn insert_user(&self, user: Arc<User>) {
            self.users.insert(user.id, user);
        }

        fn insert_channel(&self, channel: Arc<Channel>) {
            self.channels.insert(channel.id, channel);
        }

        fn insert_role(&self, role: Arc<Role>) {
            self.roles.insert(role.id, role);
        }

        fn insert_emoji(&self, emoji: Arc<Emoji>) {
            self.emojis.insert(emoji.id, emoji);
        }

        fn remove_guild(&self, id: GuildId) {
            self.guilds.remove(&id);
        }

        fn remove_channel(&self, id: ChannelId) {
            self.channels.remove(&id);
        }

        fn remove_role(&self, id: RoleId) {
            self.roles.remove(&id);
        }
    }
}
