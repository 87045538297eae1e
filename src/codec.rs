//! Frame codec: datagram bytes <-> bit-level frames.
//!
//! Frame layout: 8 sync bytes (values 0 or 1, each expanded into its
//! own 8 LSB-first bits like any other byte) + 1 length byte + L
//! payload bytes + 1 XOR checksum byte = `10 + L` bytes = `80 + 8L`
//! transmitted bits.

use std::collections::VecDeque;

use crate::error::CodecError;

pub const MAX_PAYLOAD_LEN: usize = 32;
pub const SYNC_HEADER: [u8; 8] = [1, 0, 1, 0, 1, 1, 0, 1];
const SYNC_HEADER_BITS: usize = SYNC_HEADER.len() * 8;
/// Minimum buffered bits before a sync mismatch triggers an advance
/// rather than a wait for more data.
const SYNC_RETRY_THRESHOLD_BITS: usize = SYNC_HEADER_BITS + 16;
/// A hard cap on the received bit-stream buffer.
const MAX_BIT_BUFFER: usize = 1_000;

fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc ^ b)
}

fn bytes_to_bits_lsb_first(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &b in bytes {
        for i in 0..8 {
            bits.push((b >> i) & 1);
        }
    }
    bits
}

/// Encodes a datagram payload into a bit vector ready for `ToneGenerator`.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge(payload.len()));
    }
    let mut frame_bytes = Vec::with_capacity(10 + payload.len());
    frame_bytes.extend_from_slice(&SYNC_HEADER);
    frame_bytes.push(payload.len() as u8);
    frame_bytes.extend_from_slice(payload);
    frame_bytes.push(checksum(payload));
    Ok(bytes_to_bits_lsb_first(&frame_bytes))
}

/// Re-entrant bit-stream decoder: sync search, length read, payload/CRC
/// read. Owned exclusively by the decode path — no internal locking.
pub struct FrameCodec {
    bits: VecDeque<u8>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            bits: VecDeque::new(),
        }
    }

    /// Appends newly decoded bits and returns every complete frame payload
    /// that could be extracted. May return more than one frame, or none.
    pub fn push_bits(&mut self, bits: &[u8]) -> Vec<Vec<u8>> {
        self.bits.extend(bits.iter().copied());
        self.cap_buffer();

        let mut frames = Vec::new();
        while let Some(payload) = self.try_extract_one() {
            frames.push(payload);
        }
        frames
    }

    fn cap_buffer(&mut self) {
        if self.bits.len() > MAX_BIT_BUFFER {
            let drop_n = self.bits.len() / 2;
            for _ in 0..drop_n {
                self.bits.pop_front();
            }
        }
    }

    fn peek_byte(&self, bit_offset: usize) -> u8 {
        let mut b = 0u8;
        for i in 0..8 {
            b |= (self.bits[bit_offset + i] & 1) << i;
        }
        b
    }

    fn advance_one_bit(&mut self) {
        self.bits.pop_front();
    }

    /// Tries to locate and consume exactly one frame. Returns `None`
    /// when either the buffer is exhausted of candidates or it needs
    /// more bits before it can decide anything further.
    ///
    /// The sync search slides one bit at a time rather than one byte:
    /// junk between frames isn't guaranteed to be a whole number of
    /// bytes, and a byte-stepping search would walk straight past a
    /// real frame that starts at a non-byte-aligned bit offset.
    fn try_extract_one(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.bits.len() < SYNC_HEADER_BITS {
                return None;
            }

            let sync_matches = (0..8).all(|i| self.peek_byte(i * 8) == SYNC_HEADER[i]);
            if !sync_matches {
                if self.bits.len() < SYNC_RETRY_THRESHOLD_BITS {
                    return None;
                }
                self.advance_one_bit();
                continue;
            }

            // Sync header found; need one more byte for the length field.
            if self.bits.len() < SYNC_HEADER_BITS + 8 {
                return None;
            }
            let length = self.peek_byte(SYNC_HEADER_BITS) as usize;
            if length > MAX_PAYLOAD_LEN {
                // False sync: a real length byte never exceeds 32.
                self.advance_one_bit();
                continue;
            }

            let total_bits_needed = (10 + length) * 8;
            if self.bits.len() < total_bits_needed {
                return None;
            }

            let mut payload = Vec::with_capacity(length);
            for i in 0..length {
                payload.push(self.peek_byte((9 + i) * 8));
            }
            let received_checksum = self.peek_byte((9 + length) * 8);

            if received_checksum == checksum(&payload) {
                for _ in 0..total_bits_needed {
                    self.bits.pop_front();
                }
                return Some(payload);
            }

            // Checksum mismatch: treat as false sync, advance and retry.
            self.advance_one_bit();
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}
