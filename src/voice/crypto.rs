//! Packet sealing for Discord's secure RTP profile.
//!
//! The negotiated mode is `xsalsa20_poly1305`: the 12-byte RTP header,
//! zero-padded to 24 bytes, is the nonce, and the payload is sealed with
//! the session's 32-byte secret key. The Poly1305 tag sits at the start
//! of the payload region.

use crypto_secretbox::{
    AeadInPlace,
    Error as CryptoError,
    KeyInit,
    Nonce,
    SecretBox,
    Tag,
    XSalsa20Poly1305 as Cipher,
};
use discortp::MutablePacket;

pub(crate) use crypto_secretbox::XSalsa20Poly1305 as VoiceCipher;

/// Length of the Poly1305 tag preceding each sealed payload.
pub const TAG_SIZE: usize = SecretBox::<()>::TAG_SIZE;

/// Length of the XSalsa20 nonce.
pub const NONCE_SIZE: usize = SecretBox::<()>::NONCE_SIZE;

/// Length of the session secret key.
pub const KEY_SIZE: usize = SecretBox::<()>::KEY_SIZE;

/// Builds a cipher from the session description's key bytes.
pub(crate) fn cipher_from_key(key: &[u8]) -> Result<Cipher, CryptoError> {
    Cipher::new_from_slice(key).map_err(|_| CryptoError)
}

fn header_nonce(header: &[u8]) -> Nonce {
    let mut nonce = Nonce::default();
    nonce[..header.len().min(NONCE_SIZE)]
        .copy_from_slice(&header[..header.len().min(NONCE_SIZE)]);
    nonce
}

/// Seals a voice packet in place.
///
/// The packet's payload region must hold `TAG_SIZE` reserved bytes, then
/// `payload_len - TAG_SIZE` bytes of plaintext Opus.
pub(crate) fn encrypt_in_place(
    packet: &mut impl MutablePacket,
    cipher: &Cipher,
    payload_len: usize,
) -> Result<(), CryptoError> {
    let header_len = packet.packet().len() - packet.payload().len();
    let (header, body) = packet.packet_mut().split_at_mut(header_len);

    if payload_len < TAG_SIZE || payload_len > body.len() {
        return Err(CryptoError);
    }

    let nonce = header_nonce(header);
    let body = &mut body[..payload_len];

    let tag = cipher.encrypt_in_place_detached(&nonce, b"", &mut body[TAG_SIZE..])?;
    body[..TAG_SIZE].copy_from_slice(&tag[..]);

    Ok(())
}

/// Opens a sealed voice packet in place.
///
/// On success the plaintext occupies the payload region from `TAG_SIZE`
/// onward; the returned value is that starting offset.
pub(crate) fn decrypt_in_place(
    packet: &mut impl MutablePacket,
    cipher: &Cipher,
) -> Result<usize, CryptoError> {
    let header_len = packet.packet().len() - packet.payload().len();
    let (header, body) = packet.packet_mut().split_at_mut(header_len);

    if body.len() < TAG_SIZE {
        return Err(CryptoError);
    }

    let nonce = header_nonce(header);
    let (tag_bytes, data) = body.split_at_mut(TAG_SIZE);
    let tag = Tag::from_slice(tag_bytes);

    cipher
        .decrypt_in_place_detached(&nonce, b"", data, tag)
        .map(|()| TAG_SIZE)
}

#[cfg(test)]
mod test {
    use super::*;
    use discortp::rtp::MutableRtpPacket;
    use discortp::Packet;
    use rand::{thread_rng, Rng};

    #[test]
    fn small_packet_decrypts_error() {
        let mut buf = [0u8; MutableRtpPacket::minimum_packet_size()];
        let mut pkt = MutableRtpPacket::new(&mut buf[..]).unwrap();
        let cipher = cipher_from_key(&[1u8; KEY_SIZE]).unwrap();

        // AIM: should error, and not panic.
        assert!(decrypt_in_place(&mut pkt, &cipher).is_err());
    }

    #[test]
    fn sealed_packets_only_open_under_the_same_key() {
        let mut rng = thread_rng();

        for _ in 0..64 {
            let payload_len: usize = rng.gen_range(1..=256);
            let mut payload = vec![0u8; payload_len];
            rng.fill(&mut payload[..]);

            let mut buf =
                vec![0u8; MutableRtpPacket::minimum_packet_size() + TAG_SIZE + payload_len];
            let mut pkt = MutableRtpPacket::new(&mut buf[..]).unwrap();
            pkt.set_version(2);
            pkt.set_sequence(rng.gen::<u16>().into());
            pkt.set_timestamp(rng.gen::<u32>().into());
            pkt.set_ssrc(rng.gen());
            pkt.payload_mut()[TAG_SIZE..].copy_from_slice(&payload);

            let key: [u8; KEY_SIZE] = rng.gen();
            let cipher = cipher_from_key(&key).unwrap();
            encrypt_in_place(&mut pkt, &cipher, TAG_SIZE + payload_len).unwrap();

            // Round trip under the same key restores the payload.
            let mut opened = buf.clone();
            let mut pkt = MutableRtpPacket::new(&mut opened[..]).unwrap();
            let start = decrypt_in_place(&mut pkt, &cipher).unwrap();
            assert_eq!(&pkt.payload()[start..], &payload[..]);

            // A different key must refuse the packet.
            let mut wrong_key = key;
            wrong_key[0] ^= 0x01;
            let wrong = cipher_from_key(&wrong_key).unwrap();
            let mut tampered = buf.clone();
            let mut pkt = MutableRtpPacket::new(&mut tampered[..]).unwrap();
            assert!(decrypt_in_place(&mut pkt, &wrong).is_err());
        }
    }
}
