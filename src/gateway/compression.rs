//! Streaming zlib inflation for compressed gateway transport.
//!
//! Discord's `zlib-stream` transport shares one zlib context across the
//! whole connection: frames are fragments of a single stream, and a
//! message boundary is marked by the 4-byte sync-flush suffix. The
//! inflate context must therefore live as long as the connection and is
//! only rebuilt on reconnect.

use crate::constants::{INFLATE_CHUNK_SIZE, ZLIB_SUFFIX};
use flate2::{Decompress, DecompressError, FlushDecompress};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

pub(crate) struct Inflater {
    decompress: Decompress,
    /// Compressed bytes accumulated until a message boundary arrives.
    pending: Vec<u8>,
    /// Scratch output, drained in fixed-size chunks.
    scratch: Vec<u8>,
    decompressed_total: Arc<AtomicU64>,
}

impl Inflater {
    pub(crate) fn new(decompressed_total: Arc<AtomicU64>) -> Self {
        Self {
            decompress: Decompress::new(true),
            pending: Vec::new(),
            scratch: Vec::with_capacity(INFLATE_CHUNK_SIZE),
            decompressed_total,
        }
    }

    /// Feeds one websocket binary frame into the stream.
    ///
    /// Returns the decompressed message once the frame completes one,
    /// `None` while a message is still split across frames.
    pub(crate) fn push(&mut self, frame: &[u8]) -> Result<Option<String>, InflateError> {
        self.pending.extend_from_slice(frame);

        if !self.pending.ends_with(&ZLIB_SUFFIX) {
            return Ok(None);
        }

        let mut message = Vec::new();
        let mut offset = 0usize;

        while offset < self.pending.len() {
            let consumed_before = self.decompress.total_in();
            self.scratch.clear();
            self.decompress
                .decompress_vec(&self.pending[offset..], &mut self.scratch, FlushDecompress::Sync)
                .map_err(InflateError::Zlib)?;
            offset += (self.decompress.total_in() - consumed_before) as usize;
            message.extend_from_slice(&self.scratch);
        }

        // Input is exhausted, but the last round may have filled the
        // scratch buffer exactly; drain any output zlib still holds.
        while self.scratch.len() == self.scratch.capacity() {
            self.scratch.clear();
            self.decompress
                .decompress_vec(&[], &mut self.scratch, FlushDecompress::Sync)
                .map_err(InflateError::Zlib)?;
            message.extend_from_slice(&self.scratch);
        }

        self.pending.clear();
        self.decompressed_total
            .fetch_add(message.len() as u64, Ordering::Relaxed);

        String::from_utf8(message)
            .map(Some)
            .map_err(|_| InflateError::NonUtf8Payload)
    }
}

/// Failure while inflating the compressed transport stream.
#[derive(Debug)]
pub enum InflateError {
    /// The zlib stream itself reported corruption.
    Zlib(DecompressError),
    /// Decompressed output was not valid UTF-8 JSON text.
    NonUtf8Payload,
}

impl std::fmt::Display for InflateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zlib(e) => write!(f, "zlib stream error: {e}"),
            Self::NonUtf8Payload => write!(f, "decompressed payload was not UTF-8"),
        }
    }
}

impl std::error::Error for InflateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Zlib(e) => Some(e),
            Self::NonUtf8Payload => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flate2::{Compress, Compression, FlushCompress};

    fn deflate_message(compress: &mut Compress, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len() + 64);
        compress
            .compress_vec(text.as_bytes(), &mut out, FlushCompress::Sync)
            .unwrap();
        out
    }

    #[test]
    fn inflater_reassembles_messages_across_frames() {
        let total = Arc::new(AtomicU64::new(0));
        let mut inflater = Inflater::new(Arc::clone(&total));
        let mut compress = Compress::new(Compression::default(), true);

        let first = r#"{"op":10,"d":{"heartbeat_interval":41250}}"#;
        let deflated = deflate_message(&mut compress, first);

        // Split the compressed message into two websocket frames.
        let (head, tail) = deflated.split_at(deflated.len() / 2);
        assert!(inflater.push(head).unwrap().is_none());
        assert_eq!(inflater.push(tail).unwrap().as_deref(), Some(first));

        // The shared context must survive into the next message.
        let second = r#"{"op":11}"#;
        let deflated = deflate_message(&mut compress, second);
        assert_eq!(inflater.push(&deflated).unwrap().as_deref(), Some(second));

        let expected = (first.len() + second.len()) as u64;
        assert_eq!(total.load(Ordering::Relaxed), expected);
    }

    #[test]
    fn inflater_handles_messages_larger_than_one_chunk() {
        let total = Arc::new(AtomicU64::new(0));
        let mut inflater = Inflater::new(total);
        let mut compress = Compress::new(Compression::default(), true);

        let big = format!(r#"{{"op":0,"t":"X","d":"{}"}}"#, "a".repeat(4 * INFLATE_CHUNK_SIZE));
        let deflated = deflate_message(&mut compress, &big);

        assert_eq!(inflater.push(&deflated).unwrap().as_deref(), Some(big.as_str()));
    }
}
