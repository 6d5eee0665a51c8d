//! CoLa telegram framing
//!
//! CoLa-A: `STX <text> ETX`.
//! CoLa-B: four `STX` bytes, a big-endian `u32` payload length, the payload
//! and a one-byte XOR checksum over the payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tracing::{trace, warn};

use crate::dialect::Dialect;

pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;

/// Start sequence of a CoLa-B frame
pub const BINARY_MAGIC: [u8; 4] = [STX; 4];

/// Upper bound for a single payload
pub const MAX_PAYLOAD_LEN: usize = 1024 * 1024;

/// Framing errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColaError {
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
}

/// XOR over all payload bytes
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, b| acc ^ b)
}

/// Frame a command for the given dialect
pub fn encode(dialect: Dialect, payload: &[u8]) -> Bytes {
    match dialect {
        Dialect::Ascii => {
            let mut buf = BytesMut::with_capacity(payload.len() + 2);
            buf.put_u8(STX);
            buf.put_slice(payload);
            buf.put_u8(ETX);
            buf.freeze()
        }
        Dialect::Binary => {
            let mut buf = BytesMut::with_capacity(payload.len() + 9);
            buf.put_slice(&BINARY_MAGIC);
            buf.put_u32(payload.len() as u32);
            buf.put_slice(payload);
            buf.put_u8(checksum(payload));
            buf.freeze()
        }
    }
}

/// Incremental decoder for a byte stream
#[derive(Debug)]
pub struct FrameDecoder {
    dialect: Dialect,
    buf: BytesMut,
    /// CoLa-A: bytes after STX already searched for ETX
    scanned: usize,
}

impl FrameDecoder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            buf: BytesMut::with_capacity(4096),
            scanned: 0,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Append received bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes buffered but not yet framed
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Next complete payload, if any.
    ///
    /// Garbage before a start marker is skipped. A corrupt or oversized
    /// frame is consumed before its error is returned, so decoding can
    /// continue.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, ColaError> {
        match self.dialect {
            Dialect::Ascii => self.next_ascii(),
            Dialect::Binary => self.next_binary(),
        }
    }

    fn next_ascii(&mut self) -> Result<Option<Bytes>, ColaError> {
        let Some(start) = self.buf.iter().position(|b| *b == STX) else {
            self.buf.clear();
            self.scanned = 0;
            return Ok(None);
        };
        if start > 0 {
            trace!(skipped = start, "Skipping bytes before STX");
            self.buf.advance(start);
            self.scanned = 0;
        }

        let from = self.scanned.max(1);
        let Some(rel) = self.buf[from..].iter().position(|b| *b == ETX) else {
            if self.buf.len() > MAX_PAYLOAD_LEN + 2 {
                let len = self.buf.len() - 1;
                warn!(len, "Oversized CoLa-A frame, resynchronizing");
                self.buf.clear();
                self.scanned = 0;
                return Err(ColaError::PayloadTooLarge(len));
            }
            self.scanned = self.buf.len();
            return Ok(None);
        };
        let mut end = from + rel;
        self.scanned = 0;

        // A frame restarted before its ETX: keep the newest start
        let last_start = self.buf[..end].iter().rposition(|b| *b == STX).unwrap_or(0);
        if last_start > 0 {
            trace!(skipped = last_start, "Dropping unterminated CoLa-A frame");
            self.buf.advance(last_start);
            end -= last_start;
        }

        let mut frame = self.buf.split_to(end + 1);
        frame.advance(1);
        frame.truncate(end - 1);
        Ok(Some(frame.freeze()))
    }

    fn next_binary(&mut self) -> Result<Option<Bytes>, ColaError> {
        let Some(start) = self.buf.windows(4).position(|w| w == BINARY_MAGIC) else {
            // Keep a possible partial magic at the tail
            let keep = self.buf.len().min(3);
            let drop = self.buf.len() - keep;
            self.buf.advance(drop);
            return Ok(None);
        };
        if start > 0 {
            trace!(skipped = start, "Skipping bytes before frame start");
            self.buf.advance(start);
        }
        if self.buf.len() < 8 {
            return Ok(None);
        }

        let len = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]) as usize;
        if len > MAX_PAYLOAD_LEN {
            warn!(len, "Oversized CoLa-B frame, resynchronizing");
            self.buf.advance(4);
            return Err(ColaError::PayloadTooLarge(len));
        }
        if self.buf.len() < 8 + len + 1 {
            return Ok(None);
        }

        let mut frame = self.buf.split_to(8 + len + 1);
        frame.advance(8);
        let actual = frame[len];
        frame.truncate(len);
        let expected = checksum(&frame);
        if expected != actual {
            warn!(payload = %hex::encode(&frame), "CoLa-B checksum mismatch");
            return Err(ColaError::ChecksumMismatch { expected, actual });
        }
        Ok(Some(frame.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ascii() {
        let frame = encode(Dialect::Ascii, b"sRN DeviceIdent");
        assert_eq!(&frame[..], b"\x02sRN DeviceIdent\x03");
    }

    #[test]
    fn test_encode_binary() {
        let frame = encode(Dialect::Binary, b"sRN DeviceIdent");
        assert_eq!(
            hex::encode(&frame),
            "020202020000000f73524e204465766963654964656e7425"
        );
    }

    #[test]
    fn test_decode_ascii_split_reads() {
        let mut decoder = FrameDecoder::new(Dialect::Ascii);
        decoder.push(b"junk\x02sRA Device");
        assert_eq!(decoder.next_frame().unwrap(), None);

        decoder.push(b"Ident 8 TiM5xx\x03\x02sEA LMDscandata 1\x03");
        assert_eq!(
            decoder.next_frame().unwrap().as_deref(),
            Some(&b"sRA DeviceIdent 8 TiM5xx"[..])
        );
        assert_eq!(
            decoder.next_frame().unwrap().as_deref(),
            Some(&b"sEA LMDscandata 1"[..])
        );
        assert_eq!(decoder.next_frame().unwrap(), None);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decode_binary_byte_by_byte() {
        let frame = encode(Dialect::Binary, b"sSN LMDscandata \x00\x01");
        let mut decoder = FrameDecoder::new(Dialect::Binary);

        let mut out = None;
        for b in frame.iter() {
            decoder.push(&[*b]);
            if let Some(payload) = decoder.next_frame().unwrap() {
                out = Some(payload);
            }
        }
        assert_eq!(out.as_deref(), Some(&b"sSN LMDscandata \x00\x01"[..]));
    }

    #[test]
    fn test_decode_binary_checksum_mismatch() {
        let mut frame = encode(Dialect::Binary, b"sEA LMDscandata 1").to_vec();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;

        let mut decoder = FrameDecoder::new(Dialect::Binary);
        decoder.push(&frame);
        decoder.push(&encode(Dialect::Binary, b"sRA DeviceIdent"));

        assert!(matches!(
            decoder.next_frame(),
            Err(ColaError::ChecksumMismatch { .. })
        ));
        // The next frame still decodes
        assert_eq!(
            decoder.next_frame().unwrap().as_deref(),
            Some(&b"sRA DeviceIdent"[..])
        );
    }

    #[test]
    fn test_decode_ascii_garbage_without_stx_dropped() {
        let mut decoder = FrameDecoder::new(Dialect::Ascii);
        for _ in 0..64 {
            decoder.push(&[b'x'; 4096]);
            assert_eq!(decoder.next_frame().unwrap(), None);
            assert_eq!(decoder.pending(), 0);
        }

        decoder.push(b"\x02sRA DeviceIdent\x03");
        assert_eq!(
            decoder.next_frame().unwrap().as_deref(),
            Some(&b"sRA DeviceIdent"[..])
        );
    }

    #[test]
    fn test_decode_ascii_oversized() {
        let mut decoder = FrameDecoder::new(Dialect::Ascii);
        decoder.push(&[STX]);
        let chunk = [b'x'; 64 * 1024];
        let mut rejected = 0;
        for _ in 0..32 {
            decoder.push(&chunk);
            match decoder.next_frame() {
                Ok(None) => {}
                Err(ColaError::PayloadTooLarge(len)) => {
                    assert!(len > MAX_PAYLOAD_LEN);
                    rejected += 1;
                }
                other => panic!("unexpected result: {other:?}"),
            }
            assert!(decoder.pending() <= MAX_PAYLOAD_LEN + 2);
        }
        assert_eq!(rejected, 1);

        // Decoding resumes with the next complete frame
        decoder.push(b"\x02sEA LMDscandata 1\x03");
        assert_eq!(
            decoder.next_frame().unwrap().as_deref(),
            Some(&b"sEA LMDscandata 1"[..])
        );
    }

    #[test]
    fn test_decode_ascii_resyncs_to_last_stx() {
        let mut decoder = FrameDecoder::new(Dialect::Ascii);
        decoder.push(b"\x02sSN LMDscan");
        assert_eq!(decoder.next_frame().unwrap(), None);

        decoder.push(b"\x02sRA DeviceIdent\x03");
        assert_eq!(
            decoder.next_frame().unwrap().as_deref(),
            Some(&b"sRA DeviceIdent"[..])
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decode_binary_oversized() {
        let mut decoder = FrameDecoder::new(Dialect::Binary);
        decoder.push(&[STX, STX, STX, STX, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            decoder.next_frame(),
            Err(ColaError::PayloadTooLarge(_))
        ));
    }
}
