use crate::retry::Retry;
use std::time::Duration;

/// Configuration for clusters, shards, and voice connections.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Config {
    /// Whether the gateway connection negotiates zlib-stream transport
    /// compression.
    ///
    /// Defaults to `true`.
    pub compression: bool,
    /// Configures whether decoding occurs for received voice packets.
    ///
    /// If listening to the audio itself, choose [`DecodeMode::Decode`];
    /// [`DecodeMode::Decrypt`] hands out raw Opus payloads.
    ///
    /// Defaults to [`DecodeMode::Decrypt`], due to per-packet decode costs
    /// which most users will not want to pay.
    pub decode_mode: DecodeMode,
    /// Amount of time to wait for both the voice state and voice server
    /// updates after a join request before the attempt is abandoned.
    ///
    /// Defaults to 10 seconds. If set to `None`, joins will never time out.
    pub voice_timeout: Option<Duration>,
    /// Maximum amount of time to wait for an attempted voice connection
    /// (websocket handshake through session description).
    ///
    /// Defaults to 10 seconds. If set to `None`, connections will never
    /// time out.
    pub voice_connect_timeout: Option<Duration>,
    /// Reconnect retry logic for gateway shards.
    ///
    /// Controls how many times a shard retries its connection, and how long
    /// to wait between attempts.
    pub gateway_retry: Retry,
    /// Reconnect retry logic for established voice connections.
    pub voice_retry: Retry,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compression: true,
            decode_mode: DecodeMode::Decrypt,
            voice_timeout: Some(Duration::from_secs(10)),
            voice_connect_timeout: Some(Duration::from_secs(10)),
            gateway_retry: Retry::default(),
            voice_retry: Retry::default(),
        }
    }
}

impl Config {
    /// Sets this `Config`'s transport compression choice.
    #[must_use]
    pub fn compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Sets this `Config`'s received packet decryption/decoding behaviour.
    #[must_use]
    pub fn decode_mode(mut self, decode_mode: DecodeMode) -> Self {
        self.decode_mode = decode_mode;
        self
    }

    /// Sets this `Config`'s timeout for receiving voice join replies over
    /// the gateway.
    #[must_use]
    pub fn voice_timeout(mut self, voice_timeout: Option<Duration>) -> Self {
        self.voice_timeout = voice_timeout;
        self
    }

    /// Sets this `Config`'s timeout for establishing a voice connection.
    #[must_use]
    pub fn voice_connect_timeout(mut self, voice_connect_timeout: Option<Duration>) -> Self {
        self.voice_connect_timeout = voice_connect_timeout;
        self
    }

    /// Sets this `Config`'s gateway reconnect retry configuration.
    #[must_use]
    pub fn gateway_retry(mut self, gateway_retry: Retry) -> Self {
        self.gateway_retry = gateway_retry;
        self
    }

    /// Sets this `Config`'s voice reconnect retry configuration.
    #[must_use]
    pub fn voice_retry(mut self, voice_retry: Retry) -> Self {
        self.voice_retry = voice_retry;
        self
    }
}

/// Decode behaviour for received voice packets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum DecodeMode {
    /// Decrypts the body of each received packet, handing out raw Opus.
    Decrypt,
    /// Decrypts and decodes each received packet into PCM audio.
    Decode,
}

impl DecodeMode {
    /// Returns whether this mode will decode received Opus payloads.
    #[must_use]
    pub fn should_decode(self) -> bool {
        self == DecodeMode::Decode
    }
}
