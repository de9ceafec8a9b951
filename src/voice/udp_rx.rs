//! The voice receive task: unseal, attribute, decode, dispatch.

use super::{
    crypto::{self, VoiceCipher},
    EventSink,
};
use crate::{
    config::DecodeMode,
    constants::{RTP_PROFILE_TYPE, RTP_VERSION, SAMPLE_RATE, STEREO_FRAME_SIZE, VOICE_PACKET_MAX},
    events::EventData,
    id::{GuildId, UserId},
};
use audiopus::{coder::Decoder as OpusDecoder, Channels};
use bytes::Bytes;
use dashmap::DashMap;
use discortp::{rtp::MutableRtpPacket, Packet};
use flume::Receiver;
use std::{collections::HashMap, sync::Arc};
use tokio::{net::UdpSocket, select};
use tracing::{instrument, trace, warn};

pub(crate) struct UdpRx {
    udp: Arc<UdpSocket>,
    cipher: VoiceCipher,
    decode_mode: DecodeMode,
    guild_id: GuildId,
    ssrc_map: Arc<DashMap<u32, UserId>>,
    sink: EventSink,
    stop_rx: Receiver<()>,
    decoders: HashMap<u32, OpusDecoder>,
}

impl UdpRx {
    pub(crate) fn new(
        udp: Arc<UdpSocket>,
        cipher: VoiceCipher,
        decode_mode: DecodeMode,
        guild_id: GuildId,
        ssrc_map: Arc<DashMap<u32, UserId>>,
        sink: EventSink,
        stop_rx: Receiver<()>,
    ) -> Self {
        Self {
            udp,
            cipher,
            decode_mode,
            guild_id,
            ssrc_map,
            sink,
            stop_rx,
            decoders: HashMap::new(),
        }
    }

    async fn run(&mut self) {
        let mut buf = [0u8; VOICE_PACKET_MAX];

        loop {
            select! {
                received = self.udp.recv(&mut buf) => {
                    match received {
                        Ok(len) => self.process_packet(&mut buf[..len]),
                        Err(e) => {
                            warn!("Voice UDP receive error: {e}");
                            break;
                        },
                    }
                },
                _ = self.stop_rx.recv_async() => break,
            }
        }
    }

    fn process_packet(&mut self, data: &mut [u8]) {
        let Some(mut rtp) = MutableRtpPacket::new(data) else {
            return;
        };

        // Keepalive echoes and RTCP share the socket; only dynamic-type
        // RTP carries audio.
        if rtp.get_version() != RTP_VERSION || rtp.get_payload_type() != RTP_PROFILE_TYPE {
            trace!("Ignoring non-audio datagram");
            return;
        }

        let ssrc = rtp.get_ssrc();
        let extension = rtp.get_extension() != 0;

        let start = match crypto::decrypt_in_place(&mut rtp, &self.cipher) {
            Ok(start) => start,
            Err(_) => {
                warn!("Received packet which could not be opened; dropping");
                return;
            },
        };

        let payload = &rtp.packet()[discortp::rtp::RtpPacket::minimum_packet_size() + start..];
        let Some(opus) = strip_extension(payload, extension) else {
            trace!("Malformed header extension; dropping packet");
            return;
        };

        let user_id = self
            .ssrc_map
            .get(&ssrc)
            .map_or(UserId(0), |entry| *entry.value());

        let opus = Bytes::copy_from_slice(opus);
        let pcm = if self.decode_mode.should_decode() {
            match self.decode_opus(ssrc, &opus) {
                Ok(pcm) => Some(pcm),
                Err(e) => {
                    warn!("Opus decode error for SSRC {ssrc}: {e:?}");
                    None
                },
            }
        } else {
            None
        };

        self.sink.fire(EventData::VoiceReceive {
            guild_id: self.guild_id,
            ssrc,
            user_id,
            opus,
            pcm,
        });
    }

    fn decode_opus(&mut self, ssrc: u32, opus: &[u8]) -> super::error::Result<Vec<i16>> {
        let decoder = match self.decoders.entry(ssrc) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) =>
                e.insert(OpusDecoder::new(SAMPLE_RATE, Channels::Stereo)?),
        };

        let mut pcm = vec![0i16; STEREO_FRAME_SIZE];
        let samples_per_channel = decoder.decode(Some(opus), &mut pcm[..], false)?;
        pcm.truncate(samples_per_channel * 2);

        Ok(pcm)
    }
}

/// Drops an RFC 3550 header extension from the decrypted payload.
///
/// Discord seals the extension alongside the audio, so it can only be
/// skipped after opening the packet.
fn strip_extension(payload: &[u8], extension: bool) -> Option<&[u8]> {
    if !extension {
        return Some(payload);
    }

    if payload.len() < 4 {
        return None;
    }

    let words = usize::from(u16::from_be_bytes([payload[2], payload[3]]));
    let skip = 4 + 4 * words;
    payload.get(skip..)
}

#[instrument(skip_all)]
pub(crate) async fn runner(mut rx: UdpRx) {
    trace!("UDP receive task started.");
    rx.run().await;
    trace!("UDP receive task stopped.");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        constants::TIMESTEP_LENGTH,
        events::{EventKind, Handlers},
        voice::{crypto::KEY_SIZE, crypto::TAG_SIZE},
    };
    use discortp::MutablePacket;

    #[test]
    fn extension_stripping() {
        // 1 word of extension data: profile(2) + len(2) + 4 bytes.
        let payload = [0xBE, 0xDE, 0x00, 0x01, 9, 9, 9, 9, 0xAA, 0xBB];
        assert_eq!(strip_extension(&payload, true), Some(&payload[8..]));
        assert_eq!(strip_extension(&payload, false), Some(&payload[..]));
        assert_eq!(strip_extension(&[0u8; 2], true), None);
    }

    #[tokio::test]
    async fn received_packets_surface_with_ssrc_attribution() {
        let receiver_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.connect(receiver_sock.local_addr().unwrap()).await.unwrap();

        let cipher = crypto::cipher_from_key(&[3u8; KEY_SIZE]).unwrap();
        let ssrc_map = Arc::new(DashMap::new());
        ssrc_map.insert(0xCAFE, UserId(42));

        let handlers = Arc::new(Handlers::new());
        let (recv_tx, recv_rx) = flume::unbounded::<(u32, u64, Bytes)>();
        handlers.set(
            EventKind::VoiceReceive,
            Arc::new(move |ev| {
                if let EventData::VoiceReceive { ssrc, user_id, opus, .. } = &ev.data {
                    drop(recv_tx.send((*ssrc, user_id.get(), opus.clone())));
                }
            }),
        );

        let (_stop_tx, stop_rx) = flume::unbounded::<()>();
        let rx = UdpRx::new(
            Arc::new(receiver_sock),
            cipher.clone(),
            DecodeMode::Decrypt,
            GuildId(1),
            ssrc_map,
            EventSink {
                handlers,
                shard: 0,
            },
            stop_rx,
        );
        tokio::spawn(runner(rx));

        // Build and seal one RTP packet carrying a recognisable payload.
        let opus_payload = [0x11u8, 0x22, 0x33, 0x44];
        let mut buf = vec![
            0u8;
            discortp::rtp::RtpPacket::minimum_packet_size() + TAG_SIZE + opus_payload.len()
        ];
        {
            let mut rtp = MutableRtpPacket::new(&mut buf[..]).unwrap();
            rtp.set_version(RTP_VERSION);
            rtp.set_payload_type(RTP_PROFILE_TYPE);
            rtp.set_sequence(1u16.into());
            rtp.set_timestamp(960u32.into());
            rtp.set_ssrc(0xCAFE);
            rtp.payload_mut()[TAG_SIZE..].copy_from_slice(&opus_payload);
            crypto::encrypt_in_place(&mut rtp, &cipher, TAG_SIZE + opus_payload.len()).unwrap();
        }
        sender.send(&buf).await.unwrap();

        let (ssrc, user, opus) =
            tokio::time::timeout(10 * TIMESTEP_LENGTH, recv_rx.recv_async())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(ssrc, 0xCAFE);
        assert_eq!(user, 42);
        assert_eq!(&opus[..], &opus_payload[..]);
    }
}
