//! The voice websocket task: heartbeats, speaking state, and the
//! SSRC/user table.

use super::{payload::VoiceEvent, CoreMessage, EventSink};
use crate::{
    events::EventData,
    id::{GuildId, UserId},
    ws::{Error as WsError, WsItem, WsStream},
};
use dashmap::DashMap;
use flume::{Receiver, Sender};
use rand::random;
use std::{sync::Arc, time::Duration};
use tokio::{
    select,
    time::{sleep_until, Instant},
};
use tracing::{debug, info, instrument, trace, warn};

/// Control messages into the websocket task.
#[derive(Debug)]
pub(crate) enum WsTaskMessage {
    /// Assert or clear the microphone speaking flag.
    Speaking(bool),
}

pub(crate) struct AuxNetwork {
    ws_client: WsStream,
    rx: Receiver<WsTaskMessage>,

    ssrc: u32,
    guild_id: GuildId,
    heartbeat_interval: Duration,

    speaking: bool,
    last_heartbeat_nonce: Option<u64>,
    last_ack: Instant,

    ssrc_map: Arc<DashMap<u32, UserId>>,
    sink: EventSink,
    core_tx: Sender<CoreMessage>,
    stop_rx: Receiver<()>,
}

impl AuxNetwork {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ws_client: WsStream,
        rx: Receiver<WsTaskMessage>,
        ssrc: u32,
        heartbeat_interval: f64,
        guild_id: GuildId,
        ssrc_map: Arc<DashMap<u32, UserId>>,
        sink: EventSink,
        core_tx: Sender<CoreMessage>,
        stop_rx: Receiver<()>,
    ) -> Self {
        Self {
            ws_client,
            rx,
            ssrc,
            guild_id,
            heartbeat_interval: Duration::from_secs_f64(heartbeat_interval / 1000.0),
            speaking: false,
            last_heartbeat_nonce: None,
            last_ack: Instant::now(),
            ssrc_map,
            sink,
            core_tx,
            stop_rx,
        }
    }

    #[instrument(skip(self), fields(guild = %self.guild_id))]
    async fn run(&mut self) {
        let mut next_heartbeat = Instant::now() + self.heartbeat_interval;

        loop {
            let hb = sleep_until(next_heartbeat);

            select! {
                () = hb => {
                    if Instant::now().duration_since(self.last_ack)
                        > 2 * self.heartbeat_interval
                    {
                        warn!("Voice heartbeat ACK overdue; connection zombied");
                        drop(self.core_tx.send(CoreMessage::Reconnect));
                        break;
                    }

                    if let Err(e) = self.send_heartbeat().await {
                        self.signal_failure(&e);
                        break;
                    }
                    next_heartbeat = Instant::now() + self.heartbeat_interval;
                }
                ws_msg = self.ws_client.recv_no_timeout() => {
                    match ws_msg {
                        Ok(Some(WsItem::Text(text))) => self.process_ws(&text),
                        Ok(_) => {},
                        Err(e) => {
                            self.signal_failure(&e);
                            break;
                        },
                    }
                }
                inner_msg = self.rx.recv_async() => {
                    match inner_msg {
                        Ok(WsTaskMessage::Speaking(is_speaking)) => {
                            if let Err(e) = self.set_speaking(is_speaking).await {
                                self.signal_failure(&e);
                                break;
                            }
                        },
                        Err(flume::RecvError::Disconnected) => break,
                    }
                }
                _ = self.stop_rx.recv_async() => break,
            }
        }
    }

    async fn send_heartbeat(&mut self) -> Result<(), WsError> {
        let nonce = random::<u64>();
        self.last_heartbeat_nonce = Some(nonce);

        trace!("Sent voice heartbeat");

        self.ws_client
            .send_text(VoiceEvent::Heartbeat(nonce).to_json_string())
            .await
    }

    async fn set_speaking(&mut self, is_speaking: bool) -> Result<(), WsError> {
        if self.speaking == is_speaking {
            return Ok(());
        }

        self.speaking = is_speaking;
        info!("Changing speaking state to {is_speaking}");

        self.ws_client
            .send_text(
                VoiceEvent::Speaking(super::payload::Speaking {
                    speaking: u8::from(is_speaking),
                    delay: Some(0),
                    ssrc: self.ssrc,
                    user_id: None,
                })
                .to_json_string(),
            )
            .await
    }

    fn process_ws(&mut self, text: &str) {
        let event = match VoiceEvent::parse(text) {
            Ok(Some(ev)) => ev,
            Ok(None) => return,
            Err(e) => {
                debug!("Undecodable voice payload: {e}");
                return;
            },
        };

        match event {
            VoiceEvent::Speaking(ev) => {
                let user_id = ev.user_id.unwrap_or(UserId(0));
                if user_id.get() != 0 {
                    self.ssrc_map.insert(ev.ssrc, user_id);
                }

                self.sink.fire(EventData::VoiceUserTalking {
                    guild_id: self.guild_id,
                    user_id,
                    ssrc: ev.ssrc,
                    speaking: ev.speaking,
                });
            },
            VoiceEvent::ClientDisconnect(ev) => {
                self.ssrc_map.retain(|_, uid| *uid != ev.user_id);
            },
            VoiceEvent::HeartbeatAck(nonce) => {
                self.last_ack = Instant::now();
                match self.last_heartbeat_nonce.take() {
                    Some(expected) if expected == nonce => {
                        trace!("Voice heartbeat ACK received.");
                    },
                    Some(expected) => {
                        warn!("Heartbeat nonce mismatch! Expected {expected}, saw {nonce}.");
                    },
                    None => {},
                }
            },
            other => {
                trace!("Received other voice websocket data: {:?}", other);
            },
        }
    }

    fn signal_failure(&self, err: &WsError) {
        let fatal = err.close_code().is_some_and(voice_close_is_fatal);
        debug!("Voice websocket failure ({err}); fatal: {fatal}");

        drop(self.core_tx.send(if fatal {
            CoreMessage::Fatal
        } else {
            CoreMessage::Reconnect
        }));
    }
}

/// Voice close codes after which a session must not be resumed.
fn voice_close_is_fatal(code: u16) -> bool {
    matches!(code, 4004 | 4006 | 4011 | 4012 | 4014 | 4016)
}

#[instrument(skip_all)]
pub(crate) async fn runner(mut aux: AuxNetwork) {
    trace!("Voice WS task started.");
    aux.run().await;
    trace!("Voice WS task finished.");
}
