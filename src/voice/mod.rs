//! Voice connections: join bookkeeping, the connection supervisor, and
//! the public audio handle.
//!
//! Joining is two-phase. The shard sends a gateway voice state update,
//! then `VOICE_STATE_UPDATE` and `VOICE_SERVER_UPDATE` arrive in either
//! order; once session id, endpoint, and token are all present the
//! supervisor task connects the voice websocket and UDP pipe.

pub(crate) mod connection;
pub mod crypto;
pub mod error;
pub(crate) mod payload;
pub(crate) mod udp_rx;
pub(crate) mod udp_tx;
pub(crate) mod ws;

use crate::{
    config::Config,
    events::{Event, EventData, Handlers},
    id::{ChannelId, GuildId, UserId},
    retry::Backoff,
};
use bytes::Bytes;
use flume::{Receiver, Sender};
use std::{fmt, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Join state accumulated from the two gateway replies.
///
/// Becomes a [`VoiceSession`] once all of session id, endpoint, and token
/// have arrived. A channel move discards server details, since Discord
/// reassigns the endpoint for the new channel.
#[derive(Clone, Debug)]
pub(crate) struct VoiceProgress {
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    pub user_id: UserId,
    session_id: Option<String>,
    endpoint: Option<String>,
    token: Option<String>,
    started: Instant,
}

impl VoiceProgress {
    pub(crate) fn new(guild_id: GuildId, channel_id: ChannelId, user_id: UserId) -> Self {
        Self {
            channel_id,
            guild_id,
            user_id,
            session_id: None,
            endpoint: None,
            token: None,
            started: Instant::now(),
        }
    }

    pub(crate) fn apply_state_update(
        &mut self,
        session_id: String,
        channel_id: ChannelId,
    ) -> Option<VoiceSession> {
        if self.channel_id != channel_id {
            // Moved by an admin while joining; server details are stale.
            self.endpoint = None;
            self.token = None;
        }

        self.channel_id = channel_id;
        self.session_id = Some(session_id);

        self.finalise()
    }

    pub(crate) fn apply_server_update(
        &mut self,
        endpoint: String,
        token: String,
    ) -> Option<VoiceSession> {
        self.endpoint = Some(endpoint);
        self.token = Some(token);

        self.finalise()
    }

    /// Whether the join has outlived the configured reply deadline.
    pub(crate) fn expired(&self, timeout: Option<Duration>, now: Instant) -> bool {
        timeout.is_some_and(|t| now.duration_since(self.started) >= t)
    }

    fn finalise(&mut self) -> Option<VoiceSession> {
        if self.endpoint.is_some() && self.session_id.is_some() && self.token.is_some() {
            Some(VoiceSession {
                channel_id: self.channel_id,
                endpoint: self.endpoint.take().unwrap(),
                guild_id: self.guild_id,
                session_id: self.session_id.take().unwrap(),
                token: self.token.take().unwrap(),
                user_id: self.user_id,
            })
        } else {
            None
        }
    }
}

/// Everything needed to authenticate against a voice server.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct VoiceSession {
    /// Voice channel being joined.
    pub channel_id: ChannelId,
    /// Hostname of the assigned voice websocket gateway.
    pub endpoint: String,
    /// Guild owning the voice channel.
    pub guild_id: GuildId,
    /// Session identifier from `VOICE_STATE_UPDATE`.
    pub session_id: String,
    /// Ephemeral token from `VOICE_SERVER_UPDATE`.
    pub token: String,
    /// The bot's own user.
    pub user_id: UserId,
}

impl fmt::Debug for VoiceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceSession")
            .field("channel_id", &self.channel_id)
            .field("endpoint", &self.endpoint)
            .field("guild_id", &self.guild_id)
            .field("session_id", &self.session_id)
            .field("token", &"<secret>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Dispatch access handed to voice tasks for their synthetic events.
#[derive(Clone)]
pub(crate) struct EventSink {
    pub handlers: Arc<Handlers>,
    pub shard: u32,
}

impl EventSink {
    pub(crate) fn fire(&self, data: EventData) {
        self.handlers.dispatch(&Event {
            shard: self.shard,
            raw: None,
            data,
        });
    }
}

/// One queued item of outbound audio.
#[derive(Clone, Debug)]
pub(crate) enum AudioItem {
    /// A pre-encoded 20 ms Opus frame.
    Opus(Bytes),
    /// One 20 ms frame of interleaved stereo PCM at 48 kHz.
    Pcm(Vec<i16>),
    /// Opaque marker; fires an event when playback reaches it.
    Marker(String),
}

/// Control messages into the connection supervisor.
#[derive(Debug)]
pub(crate) enum CoreMessage {
    /// A network task hit a recoverable failure; rebuild the connection.
    Reconnect,
    /// The server refused the session; stop without retrying.
    Fatal,
    /// User asked to leave the channel.
    Shutdown,
}

/// Handle to a live (or establishing) voice connection.
///
/// Audio is queued here and paced out by the connection's sender task at
/// one frame per 20 ms.
#[derive(Clone, Debug)]
pub struct VoiceHandle {
    guild_id: GuildId,
    channel_id: ChannelId,
    audio_tx: Sender<AudioItem>,
    core_tx: Sender<CoreMessage>,
}

impl VoiceHandle {
    /// Guild this connection belongs to.
    #[must_use]
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Channel this connection targets.
    #[must_use]
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Queues one pre-encoded 20 ms Opus frame.
    pub fn play_opus(&self, frame: Bytes) {
        drop(self.audio_tx.send(AudioItem::Opus(frame)));
    }

    /// Queues one 20 ms frame of interleaved stereo PCM at 48 kHz,
    /// which the sender encodes with Opus.
    pub fn play_pcm(&self, samples: &[i16]) {
        drop(self.audio_tx.send(AudioItem::Pcm(samples.to_vec())));
    }

    /// Inserts a marker after the audio queued so far; a
    /// [`VoiceTrackMarker`](crate::events::EventKind::VoiceTrackMarker)
    /// event fires when playback reaches it.
    pub fn insert_marker(&self, marker: impl Into<String>) {
        drop(self.audio_tx.send(AudioItem::Marker(marker.into())));
    }

    /// Tears the connection down.
    pub(crate) fn shutdown(&self) {
        drop(self.core_tx.send(CoreMessage::Shutdown));
    }
}

/// Starts the supervisor for a completed join and returns its handle.
pub(crate) fn spawn(session: VoiceSession, config: Config, sink: EventSink) -> VoiceHandle {
    let (audio_tx, audio_rx) = flume::unbounded();
    let (core_tx, core_rx) = flume::unbounded();

    let handle = VoiceHandle {
        guild_id: session.guild_id,
        channel_id: session.channel_id,
        audio_tx,
        core_tx: core_tx.clone(),
    };

    tokio::spawn(runner(session, config, sink, audio_rx, core_tx, core_rx));

    handle
}

/// Supervises one voice connection: establish, run, and rebuild on
/// recoverable failure.
#[instrument(skip_all, fields(guild = %session.guild_id))]
pub(crate) async fn runner(
    session: VoiceSession,
    config: Config,
    sink: EventSink,
    audio_rx: Receiver<AudioItem>,
    core_tx: Sender<CoreMessage>,
    core_rx: Receiver<CoreMessage>,
) {
    let mut established: Option<connection::Resumable> = None;
    let mut backoff = Backoff::new(config.voice_retry);

    loop {
        let attempt = match established.take() {
            Some(prev) => connection::resume_or_connect(&session, &config, prev).await,
            None => connection::Established::connect(&session, &config).await,
        };

        let conn = match attempt {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Voice connection failed: {e}");
                let Some(wait) = backoff.next_wait() else {
                    warn!("Abandoning voice connection after repeated failures");
                    return;
                };
                tokio::time::sleep(wait).await;
                continue;
            },
        };

        backoff.reset();

        sink.fire(EventData::VoiceReady {
            guild_id: session.guild_id,
            ssrc: conn.ssrc,
        });

        // A failing connection can signal twice (ws and udp); flush
        // leftovers so they cannot kill the fresh connection. A shutdown
        // that raced the rebuild still wins.
        while let Ok(msg) = core_rx.try_recv() {
            if matches!(msg, CoreMessage::Shutdown) {
                return;
            }
        }

        let running = conn.start_tasks(&session, &config, sink.clone(), &audio_rx, &core_tx);

        // Hold the pieces a resume can reuse, then wait for a verdict.
        match core_rx.recv_async().await {
            Ok(CoreMessage::Reconnect) => {
                info!("Rebuilding voice connection");
                established = Some(running.stop_for_resume());
            },
            Ok(CoreMessage::Fatal) => {
                warn!("Voice session refused by server; closing");
                running.stop();
                return;
            },
            Ok(CoreMessage::Shutdown) | Err(_) => {
                running.stop();
                return;
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn progress_completes_in_either_order() {
        let mut p = VoiceProgress::new(GuildId(1), ChannelId(2), UserId(3));

        assert!(p.apply_state_update("sess".into(), ChannelId(2)).is_none());
        let session = p
            .apply_server_update("eu-west1.discord.media".into(), "tk".into())
            .expect("both halves arrived");
        assert_eq!(session.session_id, "sess");
        assert_eq!(session.endpoint, "eu-west1.discord.media");
        assert_eq!(session.token, "tk");

        let mut p = VoiceProgress::new(GuildId(1), ChannelId(2), UserId(3));
        assert!(p
            .apply_server_update("host".into(), "tk".into())
            .is_none());
        assert!(p.apply_state_update("sess".into(), ChannelId(2)).is_some());
    }

    #[tokio::test]
    async fn channel_move_discards_server_details() {
        let mut p = VoiceProgress::new(GuildId(1), ChannelId(2), UserId(3));
        assert!(p.apply_server_update("host".into(), "tk".into()).is_none());

        // Moved to another channel before completion: endpoint and token
        // belong to the old assignment and must not complete the session.
        assert!(p.apply_state_update("sess".into(), ChannelId(9)).is_none());
        assert_eq!(p.channel_id, ChannelId(9));

        assert!(p
            .apply_server_update("host2".into(), "tk2".into())
            .is_some());
    }

    #[tokio::test]
    async fn progress_expiry_uses_the_configured_deadline() {
        tokio::time::pause();
        let p = VoiceProgress::new(GuildId(1), ChannelId(2), UserId(3));

        let deadline = Some(Duration::from_secs(10));
        assert!(!p.expired(deadline, Instant::now()));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(p.expired(deadline, Instant::now()));
        assert!(!p.expired(None, Instant::now()));
    }
}
