//! One sharded gateway connection and its session state machine.
//!
//! Each shard runs as a single task driving a `select!` loop over the
//! websocket, a one-second tick, and the shared outbound queue. The
//! session bookkeeping (`Session`) is plain state transitions over
//! inbound payloads, so the machine is testable without a socket.

use super::{
    close::{classify, ReconnectPolicy},
    compression::Inflater,
    payload::{self, Envelope, Opcode, PresenceUpdate},
    queue::OutboundQueue,
};
use crate::{
    cache::Cache,
    config::Config,
    constants::{GATEWAY_HOST, GATEWAY_VERSION},
    events::{decode::decode, Event, EventData, EventKind, Handlers, EVENT_TABLE},
    id::{ChannelId, GuildId, UserId},
    intents::Intents,
    retry::Backoff,
    voice::{self, EventSink, VoiceHandle, VoiceProgress},
    ws::{Error as WsError, WireCounters, WsItem, WsStream},
};
use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Shared, observable state of one shard.
///
/// Everything here is written by the shard task and read from anywhere.
#[derive(Debug, Default)]
pub struct ShardState {
    pub(crate) wire: Arc<WireCounters>,
    pub(crate) decompressed_total: Arc<AtomicU64>,
    pub(crate) resumes: AtomicU64,
    pub(crate) reconnects: AtomicU64,
    pub(crate) ready: AtomicBool,
    pub(crate) last_sequence: AtomicU64,
    pub(crate) user_id: AtomicU64,
    connected_since: Mutex<Option<Instant>>,
}

impl ShardState {
    /// Wire payload bytes received on the live connection family.
    #[must_use]
    pub fn bytes_in(&self) -> u64 {
        self.wire.bytes_in.load(Ordering::Relaxed)
    }

    /// Wire payload bytes sent.
    #[must_use]
    pub fn bytes_out(&self) -> u64 {
        self.wire.bytes_out.load(Ordering::Relaxed)
    }

    /// Total bytes produced by the transport inflater.
    #[must_use]
    pub fn decompressed_total(&self) -> u64 {
        self.decompressed_total.load(Ordering::Relaxed)
    }

    /// Number of successful session resumes.
    #[must_use]
    pub fn resumes(&self) -> u64 {
        self.resumes.load(Ordering::Relaxed)
    }

    /// Number of reconnect cycles.
    #[must_use]
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Whether READY or RESUMED has been received on the live connection.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Last dispatch sequence observed.
    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Relaxed)
    }

    /// The bot's own user, learned from READY; zero before then.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId(self.user_id.load(Ordering::Relaxed))
    }
}

/// What the connection loop should do after handling one payload.
#[derive(Debug)]
enum Inbound {
    Continue,
    /// A decoded dispatch to fan out.
    Dispatch {
        kind: EventKind,
        d: Value,
        raw: Arc<str>,
    },
    /// Tear the connection down and apply the policy.
    Reconnect {
        policy: ReconnectPolicy,
        delay: Option<Duration>,
    },
}

/// Why a connection ended.
#[derive(Debug)]
enum ConnectionEnd {
    Fatal,
    Retry {
        policy: ReconnectPolicy,
        delay: Option<Duration>,
    },
}

/// Session bookkeeping for one shard, surviving across reconnects.
struct Session {
    token: String,
    intents: Intents,
    shard_info: [u32; 2],
    presence: Option<PresenceUpdate>,
    state: Arc<ShardState>,
    queue: Arc<OutboundQueue>,

    session_id: Option<String>,
    heartbeat_interval: Option<Duration>,
    last_heartbeat_sent: Option<Instant>,
    last_heartbeat_ack: Option<Instant>,
}

/// Raised by the tick when the server has stopped acknowledging
/// heartbeats.
struct Zombied;

impl Session {
    fn new(
        token: String,
        intents: Intents,
        shard_info: [u32; 2],
        presence: Option<PresenceUpdate>,
        state: Arc<ShardState>,
        queue: Arc<OutboundQueue>,
    ) -> Self {
        Self {
            token,
            intents,
            shard_info,
            presence,
            state,
            queue,
            session_id: None,
            heartbeat_interval: None,
            last_heartbeat_sent: None,
            last_heartbeat_ack: None,
        }
    }

    fn clear_session(&mut self) {
        self.session_id = None;
    }

    /// Resets per-connection liveness state before a fresh connect.
    fn begin_connection(&mut self) {
        self.heartbeat_interval = None;
        self.last_heartbeat_sent = None;
        self.last_heartbeat_ack = None;
        self.state.ready.store(false, Ordering::Relaxed);
    }

    /// Handles one decompressed gateway payload.
    fn handle_payload(&mut self, text: &str, now: Instant) -> Inbound {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(env) => env,
            Err(e) => {
                debug!("Undecodable gateway payload: {e}");
                return Inbound::Continue;
            },
        };

        if let Some(s) = envelope.s {
            self.state.last_sequence.store(s, Ordering::Relaxed);
        }

        match Opcode::from_u8(envelope.op) {
            Some(Opcode::Hello) => {
                let interval_ms = envelope.d["heartbeat_interval"].as_u64().unwrap_or(41_250);
                self.heartbeat_interval = Some(Duration::from_millis(interval_ms));
                self.last_heartbeat_ack = Some(now);

                if let Some(session_id) = &self.session_id {
                    let seq = self.state.last_sequence.load(Ordering::Relaxed);
                    info!("Resuming session {session_id} at seq {seq}");
                    self.queue
                        .push_priority(payload::resume(&self.token, session_id, seq));
                } else {
                    info!("Identifying as shard {:?}", self.shard_info);
                    self.state.last_sequence.store(0, Ordering::Relaxed);
                    self.queue.push_priority(payload::identify(
                        &self.token,
                        self.intents,
                        self.shard_info,
                        self.presence.as_ref(),
                    ));
                }
                Inbound::Continue
            },
            Some(Opcode::Dispatch) => self.handle_dispatch(envelope, text),
            Some(Opcode::Heartbeat) => {
                // The server may demand an immediate beat.
                let seq = self.sequence_for_heartbeat();
                self.queue.push_heartbeat(payload::heartbeat(seq));
                Inbound::Continue
            },
            Some(Opcode::HeartbeatAck) => {
                self.last_heartbeat_ack = Some(now);
                Inbound::Continue
            },
            Some(Opcode::Reconnect) => {
                info!("Server requested reconnect");
                Inbound::Reconnect {
                    policy: if self.session_id.is_some() {
                        ReconnectPolicy::Resume
                    } else {
                        ReconnectPolicy::Reidentify
                    },
                    delay: None,
                }
            },
            Some(Opcode::InvalidSession) => {
                let resumable = envelope.d.as_bool().unwrap_or(false);
                if resumable {
                    info!("Session invalidated, but resumable");
                    Inbound::Reconnect {
                        policy: ReconnectPolicy::Resume,
                        delay: None,
                    }
                } else {
                    info!("Session invalidated; re-identifying after back-off");
                    self.clear_session();
                    let wait = rand::thread_rng().gen_range(1_000..=5_000);
                    Inbound::Reconnect {
                        policy: ReconnectPolicy::Reidentify,
                        delay: Some(Duration::from_millis(wait)),
                    }
                }
            },
            Some(_) | None => {
                debug!("Ignoring unexpected gateway opcode {}", envelope.op);
                Inbound::Continue
            },
        }
    }

    fn handle_dispatch(&mut self, envelope: Envelope, raw: &str) -> Inbound {
        let Some(name) = envelope.t.as_deref() else {
            return Inbound::Continue;
        };

        let Some(&kind) = EVENT_TABLE.get(name) else {
            debug!("Unknown dispatch event {name}");
            return Inbound::Continue;
        };

        match kind {
            EventKind::Ready => {
                if let Some(session_id) = envelope.d["session_id"].as_str() {
                    self.session_id = Some(session_id.to_owned());
                }
                if let Some(id) = envelope.d["user"]["id"]
                    .as_str()
                    .and_then(|s| s.parse::<u64>().ok())
                {
                    self.state.user_id.store(id, Ordering::Relaxed);
                }
                self.state.ready.store(true, Ordering::Relaxed);
            },
            EventKind::Resumed => {
                self.state.ready.store(true, Ordering::Relaxed);
                self.state.resumes.fetch_add(1, Ordering::Relaxed);
            },
            _ => {},
        }

        Inbound::Dispatch {
            kind,
            d: envelope.d,
            raw: Arc::from(raw),
        }
    }

    fn sequence_for_heartbeat(&self) -> Option<u64> {
        match self.state.last_sequence.load(Ordering::Relaxed) {
            0 => None,
            seq => Some(seq),
        }
    }

    /// One-second housekeeping: heartbeat cadence and the zombie rule.
    fn tick(&mut self, now: Instant) -> Result<(), Zombied> {
        let Some(interval) = self.heartbeat_interval else {
            return Ok(());
        };

        // A connection is zombied when the newest ACK trails the newest
        // send by more than two heartbeat intervals.
        if let (Some(sent), Some(ack)) = (self.last_heartbeat_sent, self.last_heartbeat_ack) {
            if sent > ack && now.duration_since(ack) > 2 * interval {
                return Err(Zombied);
            }
        }

        let due = self
            .last_heartbeat_sent
            .map_or(true, |sent| now.duration_since(sent) >= interval);

        if due {
            self.queue
                .push_heartbeat(payload::heartbeat(self.sequence_for_heartbeat()));
            self.last_heartbeat_sent = Some(now);
        }

        Ok(())
    }
}

enum VoiceSlot {
    Joining(VoiceProgress),
    Active(VoiceHandle),
}

/// One sharded gateway connection.
///
/// Created by the [`Cluster`](crate::Cluster); user code interacts with
/// it through the voice-join and send helpers.
pub struct Shard {
    id: u32,
    count: u32,
    token: String,
    intents: Intents,
    presence: Option<PresenceUpdate>,
    config: Config,
    state: Arc<ShardState>,
    queue: Arc<OutboundQueue>,
    handlers: Arc<Handlers>,
    cache: Arc<dyn Cache>,
    voice: Mutex<HashMap<GuildId, VoiceSlot>>,
}

impl Shard {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u32,
        count: u32,
        token: String,
        intents: Intents,
        presence: Option<PresenceUpdate>,
        config: Config,
        handlers: Arc<Handlers>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            id,
            count,
            token,
            intents,
            presence,
            config,
            state: Arc::new(ShardState::default()),
            queue: Arc::new(OutboundQueue::new()),
            handlers,
            cache,
            voice: Mutex::new(HashMap::new()),
        }
    }

    /// Index of this shard.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Observable counters and flags.
    #[must_use]
    pub fn state(&self) -> &Arc<ShardState> {
        &self.state
    }

    /// Whether READY or RESUMED has been seen on the live connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.ready.load(Ordering::Relaxed)
    }

    /// Time since the live connection was established.
    #[must_use]
    pub fn uptime(&self) -> Option<Duration> {
        (*self.state.connected_since.lock()).map(|t| Instant::now().duration_since(t))
    }

    /// Number of queued outbound messages.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Discards every queued outbound message.
    pub fn clear_queue(&self) {
        self.queue.clear();
    }

    /// Queues an op 3 presence update (priority lane).
    pub fn update_presence(&self, presence: &PresenceUpdate) {
        self.queue.push_priority(payload::presence_update(presence));
    }

    /// Queues an op 8 guild member chunk request (normal lane).
    pub fn request_guild_members(&self, guild_id: GuildId, query: &str, limit: u64) {
        self.queue.push(payload::request_guild_members(
            guild_id, query, limit, false, &[], None,
        ));
    }

    /// Begins joining a voice channel.
    ///
    /// The shard sends the op 4 update; once Discord replies with both
    /// the state and server updates, the voice connection is established
    /// in the background and a
    /// [`VoiceReady`](crate::events::EventKind::VoiceReady) event fires.
    pub fn connect_voice(&self, guild_id: GuildId, channel_id: ChannelId) {
        let user_id = UserId(self.state.user_id.load(Ordering::Relaxed));

        {
            let mut voice = self.voice.lock();
            if let Some(VoiceSlot::Active(handle)) = voice.get(&guild_id) {
                if handle.channel_id() == channel_id {
                    return;
                }
                handle.shutdown();
            }
            voice.insert(
                guild_id,
                VoiceSlot::Joining(VoiceProgress::new(guild_id, channel_id, user_id)),
            );
        }

        self.queue.push_priority(payload::voice_state_update(
            guild_id,
            Some(channel_id),
            false,
            false,
        ));
    }

    /// Leaves the voice channel on the given guild.
    pub fn disconnect_voice(&self, guild_id: GuildId) {
        if let Some(slot) = self.voice.lock().remove(&guild_id) {
            if let VoiceSlot::Active(handle) = slot {
                handle.shutdown();
            }
        }

        self.queue
            .push_priority(payload::voice_state_update(guild_id, None, false, false));
    }

    /// Handle to the voice connection on a guild, if one is live.
    #[must_use]
    pub fn voice(&self, guild_id: GuildId) -> Option<VoiceHandle> {
        match self.voice.lock().get(&guild_id) {
            Some(VoiceSlot::Active(handle)) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Feeds voice join bookkeeping from dispatched events.
    fn observe_voice(&self, data: &EventData) {
        let completed = match data {
            EventData::VoiceStateUpdate { state } => {
                let our_id = self.state.user_id.load(Ordering::Relaxed);
                if state.user_id.get() != our_id || our_id == 0 {
                    return;
                }

                let Some(guild_id) = state.guild_id else {
                    return;
                };

                let Some(channel_id) = state.channel_id else {
                    // Disconnected by an admin; drop any local connection.
                    if let Some(VoiceSlot::Active(handle)) =
                        self.voice.lock().remove(&guild_id)
                    {
                        handle.shutdown();
                    }
                    return;
                };

                let mut voice = self.voice.lock();
                match voice.get_mut(&guild_id) {
                    Some(VoiceSlot::Joining(progress)) => progress
                        .apply_state_update(state.session_id.clone(), channel_id)
                        .map(|session| (guild_id, session)),
                    _ => None,
                }
            },
            EventData::VoiceServerUpdate {
                guild_id,
                endpoint,
                token,
            } => {
                let Some(endpoint) = endpoint else {
                    // Endpoint withdrawn while the server migrates.
                    return;
                };

                let mut voice = self.voice.lock();
                match voice.get_mut(guild_id) {
                    Some(VoiceSlot::Joining(progress)) => progress
                        .apply_server_update(endpoint.clone(), token.clone())
                        .map(|session| (*guild_id, session)),
                    _ => None,
                }
            },
            _ => None,
        };

        if let Some((guild_id, session)) = completed {
            info!("Voice session for guild {guild_id} complete; connecting");
            let handle = voice::spawn(
                session,
                self.config.clone(),
                EventSink {
                    handlers: Arc::clone(&self.handlers),
                    shard: self.id,
                },
            );
            self.voice.lock().insert(guild_id, VoiceSlot::Active(handle));
        }
    }

    /// Abandons joins which outlived the configured reply deadline.
    fn sweep_stale_joins(&self, now: Instant) {
        self.voice.lock().retain(|guild_id, slot| match slot {
            VoiceSlot::Joining(progress) => {
                let stale = progress.expired(self.config.voice_timeout, now);
                if stale {
                    warn!("Voice setup incomplete for guild {guild_id}; abandoning join");
                }
                !stale
            },
            VoiceSlot::Active(_) => true,
        });
    }

    fn teardown_voice(&self) {
        let mut voice = self.voice.lock();
        for (_, slot) in voice.drain() {
            if let VoiceSlot::Active(handle) = slot {
                handle.shutdown();
            }
        }
    }

    fn gateway_url(&self) -> Url {
        let mut url = format!(
            "wss://{GATEWAY_HOST}/?v={GATEWAY_VERSION}&encoding=json"
        );
        if self.config.compression {
            url.push_str("&compress=zlib-stream");
        }

        Url::parse(&url).expect("Gateway URL is statically valid.")
    }

    /// Runs this shard until a fatal close or cluster shutdown.
    #[instrument(skip(self), fields(shard = self.id))]
    pub(crate) async fn run(self: Arc<Self>) {
        let mut session = Session::new(
            self.token.clone(),
            self.intents,
            [self.id, self.count],
            self.presence.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.queue),
        );

        let mut backoff = Backoff::new(self.config.gateway_retry);

        loop {
            session.begin_connection();
            let end = self.run_connection(&mut session).await;

            if self.state.ready.load(Ordering::Relaxed) {
                backoff.reset();
            }

            *self.state.connected_since.lock() = None;
            self.state.ready.store(false, Ordering::Relaxed);
            self.teardown_voice();

            match end {
                ConnectionEnd::Fatal => {
                    error!("Shard {} halted by fatal close", self.id);
                    break;
                },
                ConnectionEnd::Retry { policy, delay } => {
                    if policy == ReconnectPolicy::Reidentify {
                        session.clear_session();
                    }
                    self.state.reconnects.fetch_add(1, Ordering::Relaxed);

                    let Some(wait) = backoff.next_wait() else {
                        error!("Shard {} out of reconnect attempts", self.id);
                        break;
                    };

                    // An invalid-session back-off overrides the doubling run.
                    let wait = delay.unwrap_or(wait);
                    info!("Shard {} reconnecting in {wait:?}", self.id);
                    sleep(wait).await;
                },
            }
        }
    }

    async fn run_connection(&self, session: &mut Session) -> ConnectionEnd {
        let wire = Arc::clone(&self.state.wire);
        let mut ws = match WsStream::connect(self.gateway_url(), wire).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("Gateway connect failed: {e}");
                return ConnectionEnd::Retry {
                    policy: ReconnectPolicy::Resume,
                    delay: None,
                };
            },
        };

        *self.state.connected_since.lock() = Some(Instant::now());

        let mut inflater = self
            .config
            .compression
            .then(|| Inflater::new(Arc::clone(&self.state.decompressed_total)));

        let mut tick = interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                item = ws.recv_no_timeout() => {
                    let text = match item {
                        Ok(Some(WsItem::Text(text))) => Some(text),
                        Ok(Some(WsItem::Binary(frame))) => {
                            let Some(inflater) = inflater.as_mut() else {
                                debug!("Binary frame without negotiated compression");
                                continue;
                            };
                            match inflater.push(&frame) {
                                Ok(text) => text,
                                Err(e) => {
                                    warn!("Inflate failure: {e}");
                                    return ConnectionEnd::Retry {
                                        policy: ReconnectPolicy::Resume,
                                        delay: None,
                                    };
                                },
                            }
                        },
                        Ok(None) => None,
                        Err(e) => return self.classify_ws_end(session, &e),
                    };

                    if let Some(text) = text {
                        match session.handle_payload(&text, Instant::now()) {
                            Inbound::Continue => {},
                            Inbound::Dispatch { kind, d, raw } => self.fan_out(kind, &d, &raw),
                            Inbound::Reconnect { policy, delay } => {
                                ws.close().await;
                                return ConnectionEnd::Retry { policy, delay };
                            },
                        }
                    }
                },
                _ = tick.tick() => {
                    let now = Instant::now();

                    if session.tick(now).is_err() {
                        warn!("Shard {} zombied; forcing reconnect", self.id);
                        ws.close().await;
                        return ConnectionEnd::Retry {
                            policy: ReconnectPolicy::Resume,
                            delay: None,
                        };
                    }

                    self.sweep_stale_joins(now);

                    if let Err(e) = self.drain_queue(&mut ws).await {
                        return self.classify_ws_end(session, &e);
                    }
                },
            }
        }
    }

    fn classify_ws_end(&self, session: &Session, err: &WsError) -> ConnectionEnd {
        let has_session = session.session_id.is_some();

        match err.close_code() {
            Some(code) => {
                let policy = classify(code, has_session);
                info!("Gateway closed with code {code}; policy {policy:?}");
                if policy == ReconnectPolicy::Fatal {
                    ConnectionEnd::Fatal
                } else {
                    ConnectionEnd::Retry {
                        policy,
                        delay: None,
                    }
                }
            },
            None => {
                debug!("Gateway transport error: {err}");
                ConnectionEnd::Retry {
                    policy: if has_session {
                        ReconnectPolicy::Resume
                    } else {
                        ReconnectPolicy::Reidentify
                    },
                    delay: None,
                }
            },
        }
    }

    fn fan_out(&self, kind: EventKind, d: &Value, raw: &Arc<str>) {
        for data in decode(kind, d, self.cache.as_ref()) {
            self.observe_voice(&data);
            self.handlers.dispatch(&Event {
                shard: self.id,
                raw: Some(Arc::clone(raw)),
                data,
            });
        }
    }

    async fn drain_queue(&self, ws: &mut WsStream) -> Result<(), WsError> {
        while let Some(msg) = self.queue.pop_sendable(std::time::Instant::now()) {
            ws.send_text(msg.json).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("id", &self.id)
            .field("count", &self.count)
            .field("intents", &self.intents)
            .field("ready", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_session() -> (Session, Arc<ShardState>, Arc<OutboundQueue>) {
        let state = Arc::new(ShardState::default());
        let queue = Arc::new(OutboundQueue::new());
        let session = Session::new(
            "T".into(),
            Intents(513),
            [0, 1],
            None,
            Arc::clone(&state),
            Arc::clone(&queue),
        );
        (session, state, queue)
    }

    fn drain(queue: &OutboundQueue) -> Vec<Value> {
        let now = std::time::Instant::now();
        let mut out = Vec::new();
        while let Some(msg) = queue.pop_sendable(now) {
            out.push(serde_json::from_str(&msg.json).unwrap());
        }
        out
    }

    const HELLO: &str = r#"{"op":10,"d":{"heartbeat_interval":41250}}"#;

    #[tokio::test]
    async fn identify_flow() {
        let (mut session, state, queue) = new_session();

        assert!(matches!(
            session.handle_payload(HELLO, Instant::now()),
            Inbound::Continue
        ));
        assert_eq!(session.heartbeat_interval, Some(Duration::from_millis(41_250)));

        let sent = drain(&queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["op"], 2);
        assert_eq!(sent[0]["d"]["token"], "T");
        assert_eq!(sent[0]["d"]["intents"], 513);
        assert_eq!(sent[0]["d"]["shard"], serde_json::json!([0, 1]));

        let ready = r#"{"op":0,"t":"READY","s":1,"d":{"session_id":"abc","user":{"id":"99","username":"b","discriminator":"0"}}}"#;
        match session.handle_payload(ready, Instant::now()) {
            Inbound::Dispatch { kind, .. } => assert_eq!(kind, EventKind::Ready),
            other => panic!("wrong flow: {other:?}"),
        }

        assert!(state.is_ready());
        assert_eq!(session.session_id.as_deref(), Some("abc"));
        assert_eq!(state.last_sequence(), 1);
        assert_eq!(state.user_id(), UserId(99));
    }

    #[tokio::test]
    async fn resume_path() {
        let (mut session, state, queue) = new_session();

        session.handle_payload(HELLO, Instant::now());
        let ready = r#"{"op":0,"t":"READY","s":1,"d":{"session_id":"abc","user":{"id":"99"}}}"#;
        session.handle_payload(ready, Instant::now());
        // Later traffic moves the sequence along.
        session.handle_payload(r#"{"op":0,"t":"UNKNOWN_TO_US","s":42,"d":{}}"#, Instant::now());
        drain(&queue);

        // Server asks us to reconnect; with a held session this resumes.
        match session.handle_payload(r#"{"op":7}"#, Instant::now()) {
            Inbound::Reconnect {
                policy: ReconnectPolicy::Resume,
                delay: None,
            } => {},
            other => panic!("wrong flow: {other:?}"),
        }

        session.begin_connection();
        session.handle_payload(HELLO, Instant::now());

        let sent = drain(&queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["op"], 6);
        assert_eq!(sent[0]["d"]["token"], "T");
        assert_eq!(sent[0]["d"]["session_id"], "abc");
        assert_eq!(sent[0]["d"]["seq"], 42);

        session.handle_payload(r#"{"op":0,"t":"RESUMED","s":43,"d":{}}"#, Instant::now());
        assert_eq!(state.resumes(), 1);
        assert!(state.is_ready());
    }

    #[tokio::test]
    async fn invalid_session_non_resumable() {
        let (mut session, state, queue) = new_session();

        session.handle_payload(HELLO, Instant::now());
        session.handle_payload(
            r#"{"op":0,"t":"READY","s":1,"d":{"session_id":"abc","user":{"id":"99"}}}"#,
            Instant::now(),
        );
        drain(&queue);

        match session.handle_payload(r#"{"op":9,"d":false}"#, Instant::now()) {
            Inbound::Reconnect {
                policy: ReconnectPolicy::Reidentify,
                delay: Some(wait),
            } => {
                assert!(wait >= Duration::from_secs(1) && wait <= Duration::from_secs(5));
            },
            other => panic!("wrong flow: {other:?}"),
        }
        assert!(session.session_id.is_none());

        // The next HELLO must produce a fresh IDENTIFY, not a RESUME.
        session.begin_connection();
        session.handle_payload(HELLO, Instant::now());
        let sent = drain(&queue);
        assert_eq!(sent[0]["op"], 2);
        assert_eq!(state.last_sequence(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zombie_detection_after_three_unacked_heartbeats() {
        let (mut session, _state, queue) = new_session();

        let t0 = Instant::now();
        session.handle_payload(r#"{"op":10,"d":{"heartbeat_interval":1000}}"#, t0);

        assert!(session.tick(t0).is_ok());
        assert!(session.tick(t0 + Duration::from_secs(1)).is_ok());
        assert!(session.tick(t0 + Duration::from_secs(2)).is_ok());
        // Three heartbeats out, none acknowledged: zombied at the third
        // second.
        assert!(session.tick(t0 + Duration::from_secs(3)).is_err());

        let heartbeats = drain(&queue)
            .into_iter()
            .filter(|v| v["op"] == 1)
            .count();
        assert_eq!(heartbeats, 3);
    }

    #[tokio::test]
    async fn acked_heartbeats_keep_the_session_alive() {
        let (mut session, _state, queue) = new_session();

        let t0 = Instant::now();
        session.handle_payload(r#"{"op":10,"d":{"heartbeat_interval":1000}}"#, t0);

        for i in 0..10u64 {
            let now = t0 + Duration::from_secs(i);
            assert!(session.tick(now).is_ok());
            session.handle_payload(r#"{"op":11}"#, now + Duration::from_millis(50));
        }

        assert_eq!(drain(&queue).iter().filter(|v| v["op"] == 1).count(), 10);
    }

    #[tokio::test]
    async fn sequence_is_replayed_on_resume_and_reset_on_identify() {
        let (mut session, state, queue) = new_session();

        session.handle_payload(HELLO, Instant::now());
        session.handle_payload(
            r#"{"op":0,"t":"READY","s":3,"d":{"session_id":"abc","user":{"id":"9"}}}"#,
            Instant::now(),
        );
        session.handle_payload(r#"{"op":0,"t":"UNKNOWN_TO_US","s":7,"d":{}}"#, Instant::now());
        assert_eq!(state.last_sequence(), 7);

        // Resume replays the held sequence untouched.
        session.begin_connection();
        session.handle_payload(HELLO, Instant::now());
        assert_eq!(state.last_sequence(), 7);

        // Losing the session resets it for the fresh IDENTIFY.
        session.clear_session();
        session.begin_connection();
        session.handle_payload(HELLO, Instant::now());
        assert_eq!(state.last_sequence(), 0);

        drain(&queue);
    }

    #[tokio::test]
    async fn voice_join_round_trip() {
        let shard = Shard::new(
            0,
            1,
            "T".into(),
            Intents(513),
            None,
            Config::default(),
            Arc::new(Handlers::new()),
            Arc::new(crate::cache::NullCache),
        );
        shard.state.user_id.store(99, Ordering::Relaxed);

        shard.connect_voice(GuildId(7), ChannelId(8));

        let sent = drain(&shard.queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["op"], 4);
        assert_eq!(sent[0]["d"]["guild_id"], "7");
        assert_eq!(sent[0]["d"]["channel_id"], "8");
        assert_eq!(sent[0]["d"]["self_mute"], false);
        assert_eq!(sent[0]["d"]["self_deaf"], false);

        // First half of the reply: no connection yet.
        shard.observe_voice(&EventData::VoiceStateUpdate {
            state: crate::model::VoiceState {
                guild_id: Some(GuildId(7)),
                channel_id: Some(ChannelId(8)),
                user_id: UserId(99),
                session_id: "s".into(),
                ..Default::default()
            },
        });
        assert!(shard.voice(GuildId(7)).is_none());

        // Second half completes the session and spawns the connection.
        shard.observe_voice(&EventData::VoiceServerUpdate {
            guild_id: GuildId(7),
            endpoint: Some("eu-west1.discord.media".into()),
            token: "tk".into(),
        });
        let handle = shard.voice(GuildId(7)).expect("connection spawned");
        assert_eq!(handle.guild_id(), GuildId(7));
        assert_eq!(handle.channel_id(), ChannelId(8));

        // Another user's state must not disturb the registry.
        shard.observe_voice(&EventData::VoiceStateUpdate {
            state: crate::model::VoiceState {
                guild_id: Some(GuildId(7)),
                channel_id: None,
                user_id: UserId(1234),
                ..Default::default()
            },
        });
        assert!(shard.voice(GuildId(7)).is_some());

        shard.disconnect_voice(GuildId(7));
        assert!(shard.voice(GuildId(7)).is_none());
        let sent = drain(&shard.queue);
        assert_eq!(sent[0]["op"], 4);
        assert!(sent[0]["d"]["channel_id"].is_null());
    }

    #[tokio::test]
    async fn server_heartbeat_request_is_answered_immediately() {
        let (mut session, _state, queue) = new_session();

        session.handle_payload(HELLO, Instant::now());
        session.handle_payload(r#"{"op":0,"t":"UNKNOWN_TO_US","s":5,"d":{}}"#, Instant::now());
        drain(&queue);

        session.handle_payload(r#"{"op":1}"#, Instant::now());
        let sent = drain(&queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["op"], 1);
        assert_eq!(sent[0]["d"], 5);
    }
}

