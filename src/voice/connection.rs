//! Two-phase voice connection establishment.
//!
//! Phase one is the websocket handshake (IDENTIFY, HELLO, READY); phase
//! two is UDP IP discovery followed by SELECT_PROTOCOL and the session
//! description that carries the secret key.

use super::{
    crypto::{self, VoiceCipher},
    error::{Error, Result},
    payload::{
        Identify,
        ProtocolData,
        Resume,
        SelectProtocol,
        VoiceEvent,
        ENCRYPTION_MODE,
    },
    udp_rx,
    udp_tx,
    ws as ws_task,
    AudioItem,
    CoreMessage,
    EventSink,
    VoiceSession,
};
use crate::{
    constants::VOICE_GATEWAY_VERSION,
    config::Config,
    id::UserId,
    ws::{WireCounters, WsItem, WsStream},
};
use dashmap::DashMap;
use discortp::discord::{IpDiscoveryPacket, IpDiscoveryType, MutableIpDiscoveryPacket};
use flume::{Receiver, Sender};
use std::{net::IpAddr, str::FromStr, sync::Arc};
use tokio::{net::UdpSocket, spawn, time::timeout};
use tracing::{debug, info, instrument};
use url::Url;

/// A fully negotiated connection, ready to start its network tasks.
pub(crate) struct Established {
    ws: WsStream,
    pub(crate) ssrc: u32,
    cipher: VoiceCipher,
    udp: Arc<UdpSocket>,
    ssrc_map: Arc<DashMap<u32, UserId>>,
    heartbeat_interval: f64,
}

/// The pieces of a dead connection which a RESUME can reuse.
pub(crate) struct Resumable {
    ssrc: u32,
    cipher: VoiceCipher,
    udp: Arc<UdpSocket>,
    ssrc_map: Arc<DashMap<u32, UserId>>,
}

/// Live task set for one established connection.
pub(crate) struct Running {
    // Dropping this ends every task blocked on its receiver.
    stop_tx: Sender<()>,
    ssrc: u32,
    cipher: VoiceCipher,
    udp: Arc<UdpSocket>,
    ssrc_map: Arc<DashMap<u32, UserId>>,
}

impl Running {
    pub(crate) fn stop(self) {
        drop(self.stop_tx);
    }

    pub(crate) fn stop_for_resume(self) -> Resumable {
        Resumable {
            ssrc: self.ssrc,
            cipher: self.cipher,
            udp: self.udp,
            ssrc_map: self.ssrc_map,
        }
    }
}

impl Established {
    /// Performs the full two-phase handshake.
    pub(crate) async fn connect(session: &VoiceSession, config: &Config) -> Result<Self> {
        if let Some(t) = config.voice_connect_timeout {
            timeout(t, Self::connect_inner(session)).await?
        } else {
            Self::connect_inner(session).await
        }
    }

    #[instrument(skip_all, fields(endpoint = %session.endpoint))]
    async fn connect_inner(session: &VoiceSession) -> Result<Self> {
        let url = generate_url(&mut session.endpoint.clone())?;
        let mut client = WsStream::connect(url, Arc::new(WireCounters::default()))
            .await
            .map_err(Error::Ws)?;

        client
            .send_text(
                VoiceEvent::Identify(Identify {
                    server_id: session.guild_id,
                    user_id: session.user_id,
                    session_id: session.session_id.clone(),
                    token: session.token.clone(),
                })
                .to_json_string(),
            )
            .await?;

        let mut hello = None;
        let mut ready = None;

        loop {
            let Some(value) = recv_event(&mut client).await? else {
                continue;
            };

            match value {
                VoiceEvent::Ready(r) => {
                    ready = Some(r);
                    if hello.is_some() {
                        break;
                    }
                },
                VoiceEvent::Hello(h) => {
                    hello = Some(h);
                    if ready.is_some() {
                        break;
                    }
                },
                other => {
                    debug!("Expected ready/hello; got: {:?}", other);
                },
            }
        }

        let hello = hello.ok_or(Error::HandshakeIncomplete)?;
        let ready = ready.ok_or(Error::HandshakeIncomplete)?;

        if !ready.modes.iter().any(|m| m == ENCRYPTION_MODE) {
            return Err(Error::CryptoModeUnavailable);
        }

        let udp = UdpSocket::bind("0.0.0.0:0").await?;
        udp.connect((ready.ip.as_str(), ready.port)).await?;

        // Follow Discord's IP discovery procedure, in case NAT tunnelling
        // is needed.
        let mut bytes = [0; IpDiscoveryPacket::const_packet_size()];
        {
            let mut view = MutableIpDiscoveryPacket::new(&mut bytes[..])
                .expect("Size known to fit the discovery packet.");
            view.set_pkt_type(IpDiscoveryType::Request);
            view.set_length(70);
            view.set_ssrc(ready.ssrc);
        }

        udp.send(&bytes).await?;
        let (len, _addr) = udp.recv_from(&mut bytes).await?;

        let external = {
            let view =
                IpDiscoveryPacket::new(&bytes[..len]).ok_or(Error::IllegalDiscoveryResponse)?;

            if view.get_pkt_type() != IpDiscoveryType::Response {
                return Err(Error::IllegalDiscoveryResponse);
            }

            // UDP spoofing precludes assuming a clean left edge of NULs,
            // so scan for the terminator instead.
            let nul_byte_index = view
                .get_address_raw()
                .iter()
                .position(|&b| b == 0)
                .ok_or(Error::IllegalIp)?;

            let address_str = std::str::from_utf8(&view.get_address_raw()[..nul_byte_index])
                .map_err(|_| Error::IllegalIp)?;

            let address = IpAddr::from_str(address_str).map_err(|_| Error::IllegalIp)?;

            (address, view.get_port())
        };

        client
            .send_text(
                VoiceEvent::SelectProtocol(SelectProtocol {
                    protocol: "udp".into(),
                    data: ProtocolData {
                        address: external.0.to_string(),
                        port: external.1,
                        mode: ENCRYPTION_MODE.into(),
                    },
                })
                .to_json_string(),
            )
            .await?;

        let cipher = init_cipher(&mut client).await?;

        info!("Connected to: {}", session.endpoint);
        info!("WS heartbeat duration {}ms.", hello.heartbeat_interval);

        Ok(Self {
            ws: client,
            ssrc: ready.ssrc,
            cipher,
            udp: Arc::new(udp),
            ssrc_map: Arc::new(DashMap::new()),
            heartbeat_interval: hello.heartbeat_interval,
        })
    }

    /// Spawns the websocket and UDP tasks for this connection.
    pub(crate) fn start_tasks(
        self,
        session: &VoiceSession,
        config: &Config,
        sink: EventSink,
        audio_rx: &Receiver<AudioItem>,
        core_tx: &Sender<CoreMessage>,
    ) -> Running {
        let (stop_tx, stop_rx) = flume::unbounded::<()>();
        let (ws_tx, ws_rx) = flume::unbounded();

        spawn(ws_task::runner(ws_task::AuxNetwork::new(
            self.ws,
            ws_rx,
            self.ssrc,
            self.heartbeat_interval,
            session.guild_id,
            Arc::clone(&self.ssrc_map),
            sink.clone(),
            core_tx.clone(),
            stop_rx.clone(),
        )));

        spawn(udp_tx::runner(udp_tx::UdpTx::new(
            Arc::clone(&self.udp),
            self.cipher.clone(),
            self.ssrc,
            session.guild_id,
            audio_rx.clone(),
            ws_tx,
            sink.clone(),
            stop_rx.clone(),
        )));

        spawn(udp_rx::runner(udp_rx::UdpRx::new(
            Arc::clone(&self.udp),
            self.cipher.clone(),
            config.decode_mode,
            session.guild_id,
            Arc::clone(&self.ssrc_map),
            sink,
            stop_rx,
        )));

        Running {
            stop_tx,
            ssrc: self.ssrc,
            cipher: self.cipher,
            udp: self.udp,
            ssrc_map: self.ssrc_map,
        }
    }
}

/// Attempts a RESUME against a fresh websocket, falling back to a full
/// reconnect when the server refuses it.
pub(crate) async fn resume_or_connect(
    session: &VoiceSession,
    config: &Config,
    prev: Resumable,
) -> Result<Established> {
    match resume(session, config, &prev).await {
        Ok(established) => Ok(established),
        Err(e) => {
            debug!("Voice resume failed ({e}); reconnecting from scratch");
            Established::connect(session, config).await
        },
    }
}

async fn resume(session: &VoiceSession, config: &Config, prev: &Resumable) -> Result<Established> {
    let inner = async {
        let url = generate_url(&mut session.endpoint.clone())?;
        let mut client = WsStream::connect(url, Arc::new(WireCounters::default()))
            .await
            .map_err(Error::Ws)?;

        client
            .send_text(
                VoiceEvent::Resume(Resume {
                    server_id: session.guild_id,
                    session_id: session.session_id.clone(),
                    token: session.token.clone(),
                })
                .to_json_string(),
            )
            .await?;

        let mut hello = None;
        let mut resumed = false;

        loop {
            let Some(value) = recv_event(&mut client).await? else {
                continue;
            };

            match value {
                VoiceEvent::Resumed => {
                    resumed = true;
                    if hello.is_some() {
                        break;
                    }
                },
                VoiceEvent::Hello(h) => {
                    hello = Some(h);
                    if resumed {
                        break;
                    }
                },
                other => {
                    debug!("Expected resumed/hello; got: {:?}", other);
                },
            }
        }

        let hello = hello.ok_or(Error::HandshakeIncomplete)?;
        info!("Reconnected to: {}", session.endpoint);

        Ok(Established {
            ws: client,
            ssrc: prev.ssrc,
            cipher: prev.cipher.clone(),
            udp: Arc::clone(&prev.udp),
            ssrc_map: Arc::clone(&prev.ssrc_map),
            heartbeat_interval: hello.heartbeat_interval,
        })
    };

    if let Some(t) = config.voice_connect_timeout {
        timeout(t, inner).await?
    } else {
        inner.await
    }
}

async fn recv_event(client: &mut WsStream) -> Result<Option<VoiceEvent>> {
    match client.recv().await {
        Ok(Some(WsItem::Text(text))) => Ok(VoiceEvent::parse(&text)?),
        Ok(Some(WsItem::Binary(_))) => {
            // The voice gateway never negotiates compression.
            debug!("Unexpected binary frame on voice websocket");
            Ok(None)
        },
        Ok(None) => Ok(None),
        Err(e) => Err(Error::Ws(e)),
    }
}

async fn init_cipher(client: &mut WsStream) -> Result<VoiceCipher> {
    loop {
        let Some(value) = recv_event(client).await? else {
            continue;
        };

        match value {
            VoiceEvent::SessionDescription(desc) => {
                if desc.mode != ENCRYPTION_MODE {
                    return Err(Error::CryptoModeInvalid);
                }

                return crypto::cipher_from_key(&desc.secret_key)
                    .map_err(|_| Error::CryptoInvalidLength);
            },
            other => {
                debug!("Expected session description; got: {:?}", other);
            },
        }
    }
}

fn generate_url(endpoint: &mut String) -> Result<Url> {
    if endpoint.ends_with(":80") {
        let len = endpoint.len();

        endpoint.truncate(len - 3);
    }

    Url::parse(&format!("wss://{endpoint}/?v={VOICE_GATEWAY_VERSION}")).or(Err(Error::EndpointUrl))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn url_strips_legacy_port_suffix() {
        let mut ep = String::from("eu-west1.discord.media:80");
        let url = generate_url(&mut ep).unwrap();
        assert_eq!(url.as_str(), "wss://eu-west1.discord.media/?v=4");

        let mut bad = String::from("not a host name");
        assert!(generate_url(&mut bad).is_err());
    }
}
