//! JT/T 808 wire protocol
//!
//! Frames are delimited by `0x7E` flag bytes. Between the flags sits the
//! 12-byte header, the message body and a single XOR checksum byte, all
//! byte-stuffed so that neither `0x7E` nor the escape byte `0x7D` occur
//! literally: `0x7E` is sent as `0x7D 0x02` and `0x7D` as `0x7D 0x01`.
//!
//! [`open_frame`] takes one raw delimited frame off the wire and returns
//! the unescaped header+body; [`seal_frame`] is the inverse used by the
//! encoders in [`encode`].

pub mod encode;
pub mod location;
pub mod message;
pub mod stream;

/// Frame delimiter.
pub const FLAG: u8 = 0x7e;

/// Escape introducer inside the stuffed region.
pub const ESCAPE: u8 = 0x7d;

const ESCAPED_FLAG: u8 = 0x02;
const ESCAPED_ESCAPE: u8 = 0x01;

/// Shortest possible frame: two flags, 12-byte header, checksum.
pub const MIN_FRAME_LENGTH: usize = 15;

/// Header and body length cap; the 10-bit body length field can't
/// describe more than 1023 body bytes.
pub const MAX_PACKET_LENGTH: usize = 12 + 1023;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not delimited by flag bytes")]
    BadFraming,

    #[error("invalid escape sequence 0x7d 0x{byte:02x}")]
    InvalidEscape { byte: u8 },

    #[error("packet too short: {length} bytes")]
    PacketTooShort { length: usize },

    #[error("checksum mismatch: frame carries 0x{carried:02x}, computed 0x{computed:02x}")]
    ChecksumMismatch { carried: u8, computed: u8 },

    #[error("header declares {declared} body bytes, packet carries {actual}")]
    BodyLengthMismatch { declared: usize, actual: usize },

    #[error("message body truncated")]
    TruncatedBody,

    #[error("invalid BCD timestamp")]
    InvalidTimestamp,
}

// Bounds-checked cursor reads shared by the body parsers. Everything
// attacker-controlled goes through these; a short buffer is a decode
// error, never a panic.

pub(crate) fn take_u8<B: bytes::Buf>(buffer: &mut B) -> Result<u8, DecodeError> {
    buffer.try_get_u8().map_err(|_| DecodeError::TruncatedBody)
}

pub(crate) fn take_u16<B: bytes::Buf>(buffer: &mut B) -> Result<u16, DecodeError> {
    buffer.try_get_u16().map_err(|_| DecodeError::TruncatedBody)
}

pub(crate) fn take_i16<B: bytes::Buf>(buffer: &mut B) -> Result<i16, DecodeError> {
    buffer.try_get_i16().map_err(|_| DecodeError::TruncatedBody)
}

pub(crate) fn take_u32<B: bytes::Buf>(buffer: &mut B) -> Result<u32, DecodeError> {
    buffer.try_get_u32().map_err(|_| DecodeError::TruncatedBody)
}

pub(crate) fn take_bytes<B: bytes::Buf>(buffer: &mut B, n: usize) -> Result<Vec<u8>, DecodeError> {
    if buffer.remaining() < n {
        return Err(DecodeError::TruncatedBody);
    }
    let mut bytes = vec![0; n];
    buffer.copy_to_slice(&mut bytes);
    Ok(bytes)
}

pub(crate) fn take_array<B: bytes::Buf, const N: usize>(
    buffer: &mut B,
) -> Result<[u8; N], DecodeError> {
    if buffer.remaining() < N {
        return Err(DecodeError::TruncatedBody);
    }
    let mut bytes = [0; N];
    buffer.copy_to_slice(&mut bytes);
    Ok(bytes)
}

/// Whether a checksum mismatch rejects the frame or is only logged.
///
/// Some deployed firmware emits bad checksums; `Lenient` keeps those
/// terminals usable while still surfacing the mismatch in the logs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ChecksumMode {
    #[default]
    Strict,
    Lenient,
}

/// Bit layout used for the location-report alarm word.
///
/// Two incompatible layouts exist across firmware families. The dialect
/// is fixed per deployment; the layouts are never mixed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum AlarmDialect {
    /// National-standard layout: emergency at bit 0, overspeed at
    /// bit 1, rollover at bit 28.
    #[default]
    #[value(name = "standard-2013")]
    Standard2013,
    /// Vendor layout: overspeed at bit 0, vibration at bit 16,
    /// collision at bit 25.
    #[value(name = "vendor-legacy")]
    VendorLegacy,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub checksum_mode: ChecksumMode,
    pub alarm_dialect: AlarmDialect,
}

/// XOR fold over header+body. The two flag bytes and the checksum byte
/// itself are outside the folded region.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, byte| acc ^ byte)
}

/// Reverses the byte stuffing. Any escape introducer followed by
/// something other than `0x01`/`0x02` fails the frame; continuing past
/// it would corrupt every following byte.
pub fn unescape(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut output = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();

    while let Some(byte) = iter.next() {
        if byte == ESCAPE {
            match iter.next() {
                Some(ESCAPED_FLAG) => output.push(FLAG),
                Some(ESCAPED_ESCAPE) => output.push(ESCAPE),
                Some(other) => return Err(DecodeError::InvalidEscape { byte: other }),
                None => return Err(DecodeError::BadFraming),
            }
        }
        else {
            output.push(byte);
        }
    }

    Ok(output)
}

/// Applies the byte stuffing to header+body+checksum.
pub fn escape(bytes: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(bytes.len());

    for &byte in bytes {
        match byte {
            FLAG => output.extend_from_slice(&[ESCAPE, ESCAPED_FLAG]),
            ESCAPE => output.extend_from_slice(&[ESCAPE, ESCAPED_ESCAPE]),
            _ => output.push(byte),
        }
    }

    output
}

/// Opens one raw delimited frame: checks the flags, reverses the byte
/// stuffing, verifies the checksum per `mode` and returns the packet
/// (header + body, checksum stripped).
pub fn open_frame(raw: &[u8], mode: ChecksumMode) -> Result<Vec<u8>, DecodeError> {
    if raw.len() < 2 || raw[0] != FLAG || raw[raw.len() - 1] != FLAG {
        return Err(DecodeError::BadFraming);
    }

    let mut packet = unescape(&raw[1..raw.len() - 1])?;

    // 12-byte header plus the checksum byte
    if packet.len() < 13 {
        return Err(DecodeError::PacketTooShort {
            length: packet.len(),
        });
    }

    let carried = packet.pop().expect("length checked above");
    let computed = checksum(&packet);

    if carried != computed {
        match mode {
            ChecksumMode::Strict => {
                return Err(DecodeError::ChecksumMismatch { carried, computed });
            }
            ChecksumMode::Lenient => {
                tracing::warn!(carried, computed, "accepting frame with bad checksum");
            }
        }
    }

    Ok(packet)
}

/// Seals a packet (header + body) into a wire frame: appends the
/// checksum, applies the byte stuffing and wraps with flag bytes.
pub fn seal_frame(packet: &[u8]) -> Vec<u8> {
    let mut stuffed = Vec::with_capacity(packet.len() + 1);
    stuffed.extend_from_slice(packet);
    stuffed.push(checksum(packet));

    let escaped = escape(&stuffed);

    let mut frame = Vec::with_capacity(escaped.len() + 2);
    frame.push(FLAG);
    frame.extend_from_slice(&escaped);
    frame.push(FLAG);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_round_trips() {
        let payloads: &[&[u8]] = &[
            b"",
            b"\x00\x01\x02",
            &[0x7e],
            &[0x7d],
            &[0x7d, 0x7e, 0x7d, 0x7d, 0x7e],
            &[0x01, 0x7e, 0x02, 0x7d, 0x03],
        ];

        for payload in payloads {
            assert_eq!(unescape(&escape(payload)).unwrap(), *payload);
        }
    }

    #[test]
    fn escape_substitutes_both_reserved_bytes() {
        assert_eq!(escape(&[0x7e]), [0x7d, 0x02]);
        assert_eq!(escape(&[0x7d]), [0x7d, 0x01]);
    }

    #[test]
    fn invalid_escape_fails_the_frame() {
        assert_eq!(
            unescape(&[0x01, 0x7d, 0x03]),
            Err(DecodeError::InvalidEscape { byte: 0x03 })
        );
        assert_eq!(unescape(&[0x01, 0x7d]), Err(DecodeError::BadFraming));
    }

    #[test]
    fn checksum_folds_to_zero_over_itself() {
        let packet = [0x01u8, 0x02, 0x04, 0x08, 0x10, 0xff];
        let carried = checksum(&packet);

        let mut with_checksum = packet.to_vec();
        with_checksum.push(carried);
        assert_eq!(checksum(&with_checksum), 0);
    }

    #[test]
    fn seal_and_open_round_trip() {
        let packet: Vec<u8> = (0..32).chain([0x7e, 0x7d]).collect();
        let frame = seal_frame(&packet);

        assert_eq!(frame[0], FLAG);
        assert_eq!(*frame.last().unwrap(), FLAG);
        // stuffed region must not contain a literal flag
        assert!(!frame[1..frame.len() - 1].contains(&FLAG));

        assert_eq!(open_frame(&frame, ChecksumMode::Strict).unwrap(), packet);
    }

    #[test]
    fn strict_mode_rejects_bad_checksums() {
        let packet: Vec<u8> = (0..16).collect();
        let mut frame = seal_frame(&packet);
        let len = frame.len();
        frame[len - 2] ^= 0xff;

        assert!(matches!(
            open_frame(&frame, ChecksumMode::Strict),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
        assert_eq!(open_frame(&frame, ChecksumMode::Lenient).unwrap(), packet);
    }

    #[test]
    fn undersized_packets_are_rejected() {
        let frame = seal_frame(&[0x00; 4]);
        assert!(matches!(
            open_frame(&frame, ChecksumMode::Strict),
            Err(DecodeError::PacketTooShort { .. })
        ));
    }
}
