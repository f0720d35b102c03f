// Copyright 2023. The Veil Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! Wire codec for [EncodedPayload].
//!
//! Layout, in field order: sender key, ciphertext, ciphertext nonce and recipient nonce as
//! length-prefixed byte strings; recipient boxes and recipient keys as count-prefixed sequences of
//! length-prefixed byte strings; the privacy mode as a single flag byte; the affected contract
//! transaction map as a count-prefixed sequence of (hash, security hash) pairs; the execution hash
//! as a length-prefixed byte string. All lengths and counts are unsigned 64-bit big-endian.
//! Encoding is byte-stable for a given payload value.

use std::convert::TryFrom;

use thiserror::Error;

use crate::{
    payload::EncodedPayload,
    privacy::PrivacyMode,
    types::{CommonTypeError, MessageHash, Nonce, PublicKey, SecurityHash},
};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unexpected end of input while decoding payload")]
    UnexpectedEof,
    #[error("Trailing bytes after payload")]
    TrailingBytes,
    #[error("Declared length {0} exceeds the remaining input")]
    LengthOutOfRange(u64),
    #[error("Invalid payload field: {0}")]
    InvalidField(#[from] CommonTypeError),
}

pub fn encode(payload: &EncodedPayload) -> Vec<u8> {
    let mut buf = Vec::new();
    write_bytes(&mut buf, payload.sender_key.as_bytes());
    write_bytes(&mut buf, &payload.cipher_text);
    write_bytes(&mut buf, payload.cipher_text_nonce.as_bytes());
    write_count(&mut buf, payload.recipient_boxes.len());
    for recipient_box in &payload.recipient_boxes {
        write_bytes(&mut buf, recipient_box);
    }
    write_bytes(&mut buf, payload.recipient_nonce.as_bytes());
    write_count(&mut buf, payload.recipient_keys.len());
    for key in &payload.recipient_keys {
        write_bytes(&mut buf, key.as_bytes());
    }
    buf.push(payload.privacy_mode.flag());
    write_count(&mut buf, payload.affected_contract_transactions.len());
    for (hash, security_hash) in &payload.affected_contract_transactions {
        write_bytes(&mut buf, hash.as_bytes());
        write_bytes(&mut buf, security_hash.as_bytes());
    }
    write_bytes(&mut buf, &payload.exec_hash);
    buf
}

pub fn decode(bytes: &[u8]) -> Result<EncodedPayload, CodecError> {
    let mut reader = ByteReader::new(bytes);

    let sender_key = PublicKey::from_bytes(reader.read_bytes()?).map_err(CodecError::InvalidField)?;
    let cipher_text = reader.read_bytes()?.to_vec();
    let cipher_text_nonce = Nonce::from_bytes(reader.read_bytes()?);

    let box_count = reader.read_count()?;
    let mut recipient_boxes = Vec::with_capacity(box_count.min(1024));
    for _ in 0..box_count {
        recipient_boxes.push(reader.read_bytes()?.to_vec());
    }

    let recipient_nonce = Nonce::from_bytes(reader.read_bytes()?);

    let key_count = reader.read_count()?;
    let mut recipient_keys = Vec::with_capacity(key_count.min(1024));
    for _ in 0..key_count {
        recipient_keys.push(PublicKey::from_bytes(reader.read_bytes()?).map_err(CodecError::InvalidField)?);
    }

    let privacy_mode = PrivacyMode::from_flag(reader.read_u8()?).map_err(CodecError::InvalidField)?;

    let affected_count = reader.read_count()?;
    let mut affected_contract_transactions = Vec::with_capacity(affected_count.min(1024));
    for _ in 0..affected_count {
        let hash = MessageHash::from_bytes(reader.read_bytes()?);
        let security_hash = SecurityHash::from_bytes(reader.read_bytes()?);
        affected_contract_transactions.push((hash, security_hash));
    }

    let exec_hash = reader.read_bytes()?.to_vec();

    if !reader.is_empty() {
        return Err(CodecError::TrailingBytes);
    }

    Ok(EncodedPayload {
        sender_key,
        cipher_text,
        cipher_text_nonce,
        recipient_boxes,
        recipient_nonce,
        recipient_keys,
        privacy_mode,
        affected_contract_transactions,
        exec_hash,
    })
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn write_count(buf: &mut Vec<u8>, count: usize) {
    buf.extend_from_slice(&(count as u64).to_be_bytes());
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        let byte = *self.bytes.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_u64(&mut self) -> Result<u64, CodecError> {
        let end = self.pos.checked_add(8).ok_or(CodecError::UnexpectedEof)?;
        let slice = self.bytes.get(self.pos..end).ok_or(CodecError::UnexpectedEof)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(slice);
        self.pos = end;
        Ok(u64::from_be_bytes(buf))
    }

    /// Reads a length-prefixed byte string, bounds-checked against the remaining input.
    fn read_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let declared = self.read_u64()?;
        let len = usize::try_from(declared).map_err(|_| CodecError::LengthOutOfRange(declared))?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(CodecError::LengthOutOfRange(declared))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Reads a sequence count, bounds-checked so a hostile count cannot trigger a huge
    /// pre-allocation: every element needs at least a length prefix of its own.
    fn read_count(&mut self) -> Result<usize, CodecError> {
        let declared = self.read_u64()?;
        let count = usize::try_from(declared).map_err(|_| CodecError::LengthOutOfRange(declared))?;
        let remaining = self.bytes.len() - self.pos;
        if count > remaining / 8 {
            return Err(CodecError::LengthOutOfRange(declared));
        }
        Ok(count)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn key(seed: u8) -> PublicKey {
        PublicKey::from_bytes(&[seed; 32]).unwrap()
    }

    fn psv_payload() -> EncodedPayload {
        EncodedPayload {
            sender_key: key(1),
            cipher_text: b"cipher text".to_vec(),
            cipher_text_nonce: Nonce::from_bytes(b"ct-nonce"),
            recipient_boxes: vec![b"box-one".to_vec(), b"box-two".to_vec()],
            recipient_nonce: Nonce::from_bytes(b"rc-nonce"),
            recipient_keys: vec![key(1), key(2)],
            privacy_mode: PrivacyMode::PrivateStateValidation,
            affected_contract_transactions: vec![
                (MessageHash::from_bytes(b"hash-one"), SecurityHash::from_bytes(b"sec-one")),
                (MessageHash::from_bytes(b"hash-two"), SecurityHash::from_bytes(b"sec-two")),
            ],
            exec_hash: b"exec".to_vec(),
        }
    }

    #[test]
    fn round_trip_psv_payload() {
        let payload = psv_payload();
        assert_eq!(decode(&encode(&payload)).unwrap(), payload);
    }

    #[test]
    fn round_trip_unlabelled_payload() {
        // A payload as held by a non-originating node: one box, no recipient keys.
        let payload = EncodedPayload {
            recipient_boxes: vec![b"box-one".to_vec()],
            recipient_keys: Vec::new(),
            privacy_mode: PrivacyMode::StandardPrivate,
            affected_contract_transactions: Vec::new(),
            exec_hash: Vec::new(),
            ..psv_payload()
        };
        assert_eq!(decode(&encode(&payload)).unwrap(), payload);
    }

    #[test]
    fn encoding_is_byte_stable() {
        let payload = psv_payload();
        assert_eq!(encode(&payload), encode(&payload));
    }

    #[test]
    fn affected_order_is_preserved() {
        let decoded = decode(&encode(&psv_payload())).unwrap();
        assert_eq!(
            decoded.affected_hashes(),
            vec![MessageHash::from_bytes(b"hash-one"), MessageHash::from_bytes(b"hash-two")]
        );
    }

    #[test]
    fn truncated_input_is_rejected() {
        let encoded = encode(&psv_payload());
        for len in [0, 5, encoded.len() / 2, encoded.len() - 1] {
            assert!(decode(&encoded[..len]).is_err());
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = encode(&psv_payload());
        encoded.push(0);
        assert!(matches!(decode(&encoded), Err(CodecError::TrailingBytes)));
    }

    #[test]
    fn unknown_privacy_flag_is_rejected() {
        let payload = psv_payload();
        let mut encoded = encode(&payload);
        // The flag byte sits immediately after the recipient key sequence.
        let flag_pos = encoded.len()
            - 8 // exec hash length prefix
            - payload.exec_hash.len()
            - 8 // affected count
            - payload
                .affected_contract_transactions
                .iter()
                .map(|(h, s)| 16 + h.as_bytes().len() + s.as_bytes().len())
                .sum::<usize>()
            - 1;
        encoded[flag_pos] = 7;
        assert!(matches!(decode(&encoded), Err(CodecError::InvalidField(_))));
    }

    #[test]
    fn hostile_count_is_rejected() {
        let mut encoded = encode(&psv_payload());
        let len = encoded.len();
        // Overwrite the exec hash length prefix with a huge value.
        encoded[len - 12..len - 4].copy_from_slice(&u64::MAX.to_be_bytes());
        assert!(decode(&encoded).is_err());
    }
}
