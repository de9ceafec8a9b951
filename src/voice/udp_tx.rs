//! The paced voice sender: one sealed RTP packet every 20 ms.
//!
//! Pacing sleeps to fixed frame deadlines rather than between sends, so
//! encode and network jitter do not accumulate. Sequence numbers advance
//! by one and RTP timestamps by one frame of samples per packet sent.

use super::{
    crypto::{self, VoiceCipher, TAG_SIZE},
    ws::WsTaskMessage,
    AudioItem,
    EventSink,
};
use crate::{
    constants::{
        AUDIO_BUFFER_LOW_WATER,
        MONO_FRAME_SIZE,
        RTP_PROFILE_TYPE,
        RTP_VERSION,
        SAMPLE_RATE,
        SILENCE_TAIL_FRAMES,
        SILENT_FRAME,
        TIMESTEP_LENGTH,
        UDP_KEEPALIVE_GAP,
        VOICE_PACKET_MAX,
    },
    events::EventData,
    id::GuildId,
};
use audiopus::{coder::Encoder as OpusEncoder, Application, Channels};
use discortp::{
    discord::MutableKeepalivePacket,
    rtp::{MutableRtpPacket, RtpPacket},
    MutablePacket,
};
use flume::{Receiver, Sender};
use rand::random;
use std::{collections::VecDeque, num::Wrapping, sync::Arc};
use tokio::{net::UdpSocket, select, time::{sleep_until, Instant}};
use tracing::{error, instrument, trace};

pub(crate) struct UdpTx {
    udp: Arc<UdpSocket>,
    cipher: VoiceCipher,
    ssrc: u32,
    guild_id: GuildId,
    audio_rx: Receiver<AudioItem>,
    ws_tx: Sender<WsTaskMessage>,
    sink: EventSink,
    stop_rx: Receiver<()>,

    buffer: VecDeque<AudioItem>,
    encoder: Option<OpusEncoder>,
    sequence: Wrapping<u16>,
    timestamp: Wrapping<u32>,
    speaking: bool,
    silence_frames: usize,
    below_low_water: bool,
    packet: [u8; VOICE_PACKET_MAX],
    opus_scratch: [u8; VOICE_PACKET_MAX],
}

impl UdpTx {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        udp: Arc<UdpSocket>,
        cipher: VoiceCipher,
        ssrc: u32,
        guild_id: GuildId,
        audio_rx: Receiver<AudioItem>,
        ws_tx: Sender<WsTaskMessage>,
        sink: EventSink,
        stop_rx: Receiver<()>,
    ) -> Self {
        Self {
            udp,
            cipher,
            ssrc,
            guild_id,
            audio_rx,
            ws_tx,
            sink,
            stop_rx,
            buffer: VecDeque::new(),
            encoder: None,
            sequence: Wrapping(random::<u16>()),
            timestamp: Wrapping(random::<u32>()),
            speaking: false,
            silence_frames: 0,
            below_low_water: false,
            packet: [0u8; VOICE_PACKET_MAX],
            opus_scratch: [0u8; VOICE_PACKET_MAX],
        }
    }

    async fn run(&mut self) {
        let mut keepalive_bytes = [0u8; MutableKeepalivePacket::minimum_packet_size()];
        let mut ka = MutableKeepalivePacket::new(&mut keepalive_bytes[..])
            .expect("Size known to fit the keepalive packet.");
        ka.set_ssrc(self.ssrc);

        let mut next_frame = Instant::now() + TIMESTEP_LENGTH;
        let mut ka_time = Instant::now() + UDP_KEEPALIVE_GAP;

        loop {
            select! {
                () = sleep_until(next_frame) => {
                    if let Err(e) = self.frame_tick().await {
                        error!("Fatal voice send error: {e}");
                        break;
                    }
                    next_frame += TIMESTEP_LENGTH;
                },
                () = sleep_until(ka_time) => {
                    trace!("Sending UDP keepalive.");
                    if let Err(e) = self.udp.send(&keepalive_bytes[..]).await {
                        error!("Fatal UDP keepalive send error: {e}");
                        break;
                    }
                    ka_time += UDP_KEEPALIVE_GAP;
                },
                item = self.audio_rx.recv_async() => {
                    match item {
                        Ok(item) => self.buffer.push_back(item),
                        Err(flume::RecvError::Disconnected) => break,
                    }
                },
                _ = self.stop_rx.recv_async() => break,
            }
        }
    }

    /// Emits one frame: queued audio, a silence-tail frame, or nothing.
    async fn frame_tick(&mut self) -> super::error::Result<()> {
        let mut next_audio = None;
        while let Some(item) = self.buffer.pop_front() {
            match item {
                AudioItem::Marker(marker) => self.sink.fire(EventData::VoiceTrackMarker {
                    guild_id: self.guild_id,
                    marker,
                }),
                audio => {
                    next_audio = Some(audio);
                    break;
                },
            }
        }

        match next_audio {
            Some(item) => {
                if !self.speaking {
                    self.speaking = true;
                    drop(self.ws_tx.send(WsTaskMessage::Speaking(true)));
                }
                self.silence_frames = SILENCE_TAIL_FRAMES;

                let len = match item {
                    AudioItem::Opus(frame) => {
                        let len = frame.len().min(self.opus_scratch.len());
                        self.opus_scratch[..len].copy_from_slice(&frame[..len]);
                        len
                    },
                    AudioItem::Pcm(samples) => self.encode_pcm(&samples)?,
                    AudioItem::Marker(_) => unreachable!("markers drained above"),
                };
                self.send_rtp(len).await?;

                let remaining = self.buffer.len();
                if remaining < AUDIO_BUFFER_LOW_WATER {
                    if !self.below_low_water {
                        self.below_low_water = true;
                        self.sink.fire(EventData::VoiceBufferSend {
                            guild_id: self.guild_id,
                            remaining,
                        });
                    }
                } else {
                    self.below_low_water = false;
                }
            },
            None if self.speaking => {
                // Speech tail: a few silent frames stop remote decoders
                // glitching, then the speaking flag clears.
                if self.silence_frames > 0 {
                    self.silence_frames -= 1;
                    let len = SILENT_FRAME.len();
                    self.opus_scratch[..len].copy_from_slice(&SILENT_FRAME);
                    self.send_rtp(len).await?;
                } else {
                    self.speaking = false;
                    drop(self.ws_tx.send(WsTaskMessage::Speaking(false)));
                }
            },
            None => {},
        }

        Ok(())
    }

    fn encode_pcm(&mut self, samples: &[i16]) -> super::error::Result<usize> {
        if self.encoder.is_none() {
            self.encoder = Some(OpusEncoder::new(
                SAMPLE_RATE,
                Channels::Stereo,
                Application::Audio,
            )?);
        }

        let encoder = self.encoder.as_mut().expect("Created just above.");
        Ok(encoder.encode(samples, &mut self.opus_scratch[..])?)
    }

    async fn send_rtp(&mut self, opus_len: usize) -> super::error::Result<()> {
        let header_len = RtpPacket::minimum_packet_size();
        let payload_len = TAG_SIZE + opus_len;

        let mut rtp = MutableRtpPacket::new(&mut self.packet[..])
            .expect("Fixed packet store is larger than the RTP header.");
        rtp.set_version(RTP_VERSION);
        rtp.set_payload_type(RTP_PROFILE_TYPE);
        rtp.set_sequence(self.sequence.0.into());
        rtp.set_timestamp(self.timestamp.0.into());
        rtp.set_ssrc(self.ssrc);
        rtp.payload_mut()[TAG_SIZE..payload_len].copy_from_slice(&self.opus_scratch[..opus_len]);

        crypto::encrypt_in_place(&mut rtp, &self.cipher, payload_len)?;

        self.udp.send(&self.packet[..header_len + payload_len]).await?;

        self.sequence += 1;
        self.timestamp += Wrapping(MONO_FRAME_SIZE as u32);

        Ok(())
    }
}

#[instrument(skip_all)]
pub(crate) async fn runner(mut tx: UdpTx) {
    trace!("UDP transmit task started.");
    tx.run().await;
    trace!("UDP transmit task stopped.");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{events::Handlers, voice::crypto::KEY_SIZE};
    use byteorder::{NetworkEndian, ReadBytesExt};
    use bytes::Bytes;
    use std::time::Duration;

    async fn sender_pair() -> (Arc<UdpSocket>, UdpSocket) {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.connect(receiver.local_addr().unwrap()).await.unwrap();
        (Arc::new(sender), receiver)
    }

    #[tokio::test(start_paused = true)]
    async fn hundred_frames_pace_to_two_seconds() {
        let (udp, receiver) = sender_pair().await;
        let (audio_tx, audio_rx) = flume::unbounded();
        let (ws_tx, ws_rx) = flume::unbounded();
        let (stop_tx, stop_rx) = flume::unbounded::<()>();

        let sink = EventSink {
            handlers: Arc::new(Handlers::new()),
            shard: 0,
        };
        let cipher = crypto::cipher_from_key(&[7u8; KEY_SIZE]).unwrap();

        for _ in 0..100 {
            audio_tx.send(AudioItem::Opus(Bytes::from_static(&[0x42; 40]))).unwrap();
        }

        let tx = UdpTx::new(
            udp,
            cipher,
            0x1234_5678,
            GuildId(1),
            audio_rx,
            ws_tx,
            sink,
            stop_rx,
        );
        tokio::spawn(runner(tx));

        let started = Instant::now();
        let mut buf = [0u8; VOICE_PACKET_MAX];
        let mut seqs = Vec::with_capacity(100);
        let mut timestamps = Vec::with_capacity(100);

        for _ in 0..100 {
            let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
            assert!(len >= RtpPacket::minimum_packet_size() + TAG_SIZE);
            // Wire layout: V=2 in the top bits, PT 0x78, then big-endian
            // seq, timestamp, ssrc.
            assert_eq!(buf[0] >> 6, RTP_VERSION);
            assert_eq!(buf[1] & 0x7f, 120);
            let mut fields = &buf[2..12];
            seqs.push(fields.read_u16::<NetworkEndian>().unwrap());
            timestamps.push(fields.read_u32::<NetworkEndian>().unwrap());
            assert_eq!(fields.read_u32::<NetworkEndian>().unwrap(), 0x1234_5678);
        }

        let elapsed = Instant::now().duration_since(started);
        assert!(
            elapsed >= Duration::from_millis(1980) && elapsed <= Duration::from_millis(2100),
            "100 frames of 20ms took {elapsed:?}"
        );

        for pair in seqs.windows(2) {
            assert_eq!(pair[1], pair[0].wrapping_add(1));
        }
        for pair in timestamps.windows(2) {
            assert_eq!(pair[1], pair[0].wrapping_add(MONO_FRAME_SIZE as u32));
        }

        // Speech must be announced before the first frame went out.
        assert!(matches!(
            ws_rx.try_recv(),
            Ok(WsTaskMessage::Speaking(true))
        ));

        drop(stop_tx);
        drop(audio_tx);
    }

    #[tokio::test(start_paused = true)]
    async fn markers_fire_between_frames() {
        let (udp, receiver) = sender_pair().await;
        let (audio_tx, audio_rx) = flume::unbounded();
        let (ws_tx, _ws_rx) = flume::unbounded();
        let (_stop_tx, stop_rx) = flume::unbounded::<()>();

        let handlers = Arc::new(Handlers::new());
        let (marker_tx, marker_rx) = flume::unbounded::<String>();
        handlers.set(
            crate::events::EventKind::VoiceTrackMarker,
            Arc::new(move |ev| {
                if let EventData::VoiceTrackMarker { marker, .. } = &ev.data {
                    drop(marker_tx.send(marker.clone()));
                }
            }),
        );

        let sink = EventSink {
            handlers,
            shard: 0,
        };
        let cipher = crypto::cipher_from_key(&[7u8; KEY_SIZE]).unwrap();

        audio_tx.send(AudioItem::Opus(Bytes::from_static(&[1; 8]))).unwrap();
        audio_tx.send(AudioItem::Marker("track-two".into())).unwrap();
        audio_tx.send(AudioItem::Opus(Bytes::from_static(&[2; 8]))).unwrap();

        let tx = UdpTx::new(
            udp,
            cipher,
            1,
            GuildId(1),
            audio_rx,
            ws_tx,
            sink,
            stop_rx,
        );
        tokio::spawn(runner(tx));

        let mut buf = [0u8; VOICE_PACKET_MAX];
        receiver.recv_from(&mut buf).await.unwrap();
        receiver.recv_from(&mut buf).await.unwrap();

        assert_eq!(marker_rx.recv_async().await.unwrap(), "track-two");
    }
}
