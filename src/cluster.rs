//! The cluster: owner of every shard and the handler table.

use crate::{
    cache::{Cache, NullCache},
    config::Config,
    error::{ClusterError, ClusterResult},
    events::{Event, EventKind, Handlers},
    gateway::{PresenceUpdate, Shard},
    id::{ChannelId, GuildId},
    intents::Intents,
};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// A cluster owns `shard_count` gateway shards, fans their events out to
/// registered handlers, and routes voice joins to the owning shard.
///
/// Handlers are registered per event kind, at most one each; register
/// them before calling [`run`](Cluster::run).
pub struct Cluster {
    shard_count: u32,
    handlers: Arc<Handlers>,
    shards: DashMap<u32, Arc<Shard>>,
}

impl Cluster {
    /// Builds a cluster with default configuration and no cache.
    pub fn new(token: impl Into<String>, intents: Intents, shard_count: u32) -> ClusterResult<Self> {
        Self::with_config(
            token,
            intents,
            shard_count,
            Config::default(),
            Arc::new(NullCache),
            None,
        )
    }

    /// Builds a cluster with explicit configuration, cache, and initial
    /// presence.
    pub fn with_config(
        token: impl Into<String>,
        intents: Intents,
        shard_count: u32,
        config: Config,
        cache: Arc<dyn Cache>,
        presence: Option<PresenceUpdate>,
    ) -> ClusterResult<Self> {
        if shard_count == 0 {
            return Err(ClusterError::InvalidShardCount);
        }

        let token = token.into();
        let handlers = Arc::new(Handlers::new());
        let shards = DashMap::new();

        for id in 0..shard_count {
            shards.insert(
                id,
                Arc::new(Shard::new(
                    id,
                    shard_count,
                    token.clone(),
                    intents,
                    presence.clone(),
                    config.clone(),
                    Arc::clone(&handlers),
                    Arc::clone(&cache),
                )),
            );
        }

        Ok(Self {
            shard_count,
            handlers,
            shards,
        })
    }

    /// Number of shards owned by this cluster.
    #[must_use]
    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// Installs the handler for one event kind, replacing any earlier one.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.handlers.set(kind, Arc::new(handler));
    }

    /// Looks up a shard by index.
    #[must_use]
    pub fn shard(&self, id: u32) -> Option<Arc<Shard>> {
        self.shards.get(&id).map(|s| Arc::clone(&s))
    }

    /// The shard which owns a guild's events.
    #[must_use]
    pub fn shard_for(&self, guild_id: GuildId) -> Arc<Shard> {
        let id = shard_id(guild_id.get(), u64::from(self.shard_count));
        self.shards
            .get(&(id as u32))
            .map(|s| Arc::clone(&s))
            .expect("Every index below shard_count exists.")
    }

    /// Spawns one task per shard and returns their join handles.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        info!("Starting {} shard(s)", self.shard_count);

        self.shards
            .iter()
            .map(|entry| tokio::spawn(Arc::clone(entry.value()).run()))
            .collect()
    }

    /// Runs every shard until each halts (fatal close or exhausted
    /// retries).
    pub async fn run(&self) {
        let handles = self.start();
        for handle in handles {
            drop(handle.await);
        }
    }

    /// Begins joining a voice channel, routed to the guild's shard.
    pub fn connect_voice(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.shard_for(guild_id).connect_voice(guild_id, channel_id);
    }

    /// Leaves the voice channel on a guild.
    pub fn disconnect_voice(&self, guild_id: GuildId) {
        self.shard_for(guild_id).disconnect_voice(guild_id);
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("shard_count", &self.shard_count)
            .field("handlers", &self.handlers)
            .finish()
    }
}

#[inline]
fn shard_id(guild_id: u64, shard_count: u64) -> u64 {
    (guild_id >> 22) % shard_count
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zero_shards_is_a_programmer_error() {
        assert!(matches!(
            Cluster::new("T", Intents::unprivileged(), 0),
            Err(ClusterError::InvalidShardCount)
        ));
    }

    #[test]
    fn guilds_route_to_their_shard() {
        let cluster = Cluster::new("T", Intents::unprivileged(), 4).unwrap();

        // The snowflake timestamp (bits 22+) selects the shard.
        let guild = GuildId(0xDEAD_BEEF << 22);
        let shard = cluster.shard_for(guild);
        assert_eq!(u64::from(shard.id()), (guild.get() >> 22) % 4);

        assert!(cluster.shard(3).is_some());
        assert!(cluster.shard(4).is_none());
    }
}
