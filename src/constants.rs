//! Constants affecting gateway and voice behaviour.

use audiopus::SampleRate;
use discortp::rtp::RtpType;
use std::time::Duration;

/// Gateway protocol version requested during connection.
pub const GATEWAY_VERSION: u8 = 10;

/// Voice gateway protocol version requested during connection.
pub const VOICE_GATEWAY_VERSION: u8 = 4;

/// Hostname of the primary gateway.
pub const GATEWAY_HOST: &str = "gateway.discord.gg";

/// Maximum number of gateway messages which may be sent in one
/// rate-limit window.
pub const GATEWAY_SEND_LIMIT: usize = 120;

/// Length of the gateway send rate-limit window.
pub const GATEWAY_SEND_WINDOW: Duration = Duration::from_secs(60);

/// Number of send slots held back from the rate limit so that
/// heartbeats always have room.
pub const GATEWAY_RESERVED_HEARTBEATS: usize = 2;

/// Sample rate of audio to be sent to Discord.
pub const SAMPLE_RATE: SampleRate = SampleRate::Hz48000;

/// Sample rate of audio to be sent to Discord.
pub const SAMPLE_RATE_RAW: usize = 48_000;

/// Number of audio frames/packets to be sent per second.
pub const AUDIO_FRAME_RATE: usize = 50;

/// Length of time between any two audio frames.
pub const TIMESTEP_LENGTH: Duration = Duration::from_millis(1000 / AUDIO_FRAME_RATE as u64);

/// Number of samples in one complete frame of audio per channel.
pub const MONO_FRAME_SIZE: usize = SAMPLE_RATE_RAW / AUDIO_FRAME_RATE;

/// Number of individual samples in one complete frame of stereo audio.
pub const STEREO_FRAME_SIZE: usize = 2 * MONO_FRAME_SIZE;

/// Maximum packet size for a voice packet.
///
/// Set a safe amount below the Ethernet MTU to avoid fragmentation/rejection.
pub const VOICE_PACKET_MAX: usize = 1460;

/// Delay between sends of UDP keepalive frames.
///
/// Passive monitoring of Discord itself shows that these fire every 5 seconds
/// irrespective of outgoing UDP traffic.
pub const UDP_KEEPALIVE_GAP: Duration = Duration::from_millis(5_000);

/// Opus silent frame, used to signal speech start and end (and prevent audio glitching).
pub const SILENT_FRAME: [u8; 3] = [0xf8, 0xff, 0xfe];

/// Number of silent frames sent when a stream goes quiet before
/// SPEAKING is cleared.
pub const SILENCE_TAIL_FRAMES: usize = 5;

/// The one (and only) RTP version.
pub const RTP_VERSION: u8 = 2;

/// Profile type used by Discord's Opus audio traffic.
pub const RTP_PROFILE_TYPE: RtpType = RtpType::Dynamic(120);

/// Number of buffered outbound audio items below which a
/// buffer-send notification fires.
pub const AUDIO_BUFFER_LOW_WATER: usize = AUDIO_FRAME_RATE / 2;

/// Chunk size used when draining the zlib inflate stream.
pub const INFLATE_CHUNK_SIZE: usize = 16 * 1024;

/// Suffix marking a complete zlib-stream message.
pub const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xff, 0xff];
