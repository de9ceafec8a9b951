#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
//! Shrike is a sharded Discord gateway and voice runtime, written in Rust.
//! The library offers:
//!  * A gateway shard cluster with transparent session resume, heartbeat
//!    liveness detection, compressed transport, and priority-queued,
//!    rate-limited sends.
//!  * A typed event dispatch table resolving snowflake references through
//!    a pluggable cache.
//!  * Per-guild voice connections implementing Discord's secure RTP
//!    profile: two-phase handshake, IP discovery, sealed 20 ms Opus
//!    frames with deadline pacing, markers, and receive attribution.
//!
//! ## Intents
//! Voice functionality requires the `GUILD_VOICE_STATES` intent.
//!
//! ## Scope
//! REST calls and object caching are external collaborators; the runtime
//! consumes a [`Cache`] lookup interface and nothing else.

pub mod cache;
mod cluster;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod gateway;
pub mod id;
pub mod intents;
pub mod model;
pub mod retry;
pub mod voice;
mod ws;

pub use crate::{
    cache::{Cache, NullCache},
    cluster::Cluster,
    config::{Config, DecodeMode},
    error::{ClusterError, ClusterResult},
    events::{Event, EventData, EventKind},
    gateway::{PresenceUpdate, Shard, ShardState},
    id::{ChannelId, GuildId, UserId},
    intents::Intents,
    voice::{VoiceHandle, VoiceSession},
};
