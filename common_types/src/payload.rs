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

use thiserror::Error;

use crate::{
    privacy::PrivacyMode,
    types::{MessageHash, Nonce, PublicKey, SecurityHash},
};

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Key {0} is not a recipient of this payload")]
    RecipientNotFound(PublicKey),
}

/// The on-wire and at-rest unit of a private transaction.
///
/// Invariants upheld by the enclave that produces these:
/// * there is at least one recipient box;
/// * when `recipient_keys` is non-empty it is positionally aligned with `recipient_boxes`: the
///   i-th box opens with the i-th key. A payload received by a non-originating node may carry an
///   empty key list and only its own box;
/// * `exec_hash` is non-empty exactly when the mode is private state validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPayload {
    pub sender_key: PublicKey,
    pub cipher_text: Vec<u8>,
    pub cipher_text_nonce: Nonce,
    pub recipient_boxes: Vec<Vec<u8>>,
    pub recipient_nonce: Nonce,
    pub recipient_keys: Vec<PublicKey>,
    pub privacy_mode: PrivacyMode,
    /// Hashes of the prior transactions this one operates on, each bound by a security hash.
    /// Insertion order is preserved so validation reports are reproducible.
    pub affected_contract_transactions: Vec<(MessageHash, SecurityHash)>,
    pub exec_hash: Vec<u8>,
}

impl EncodedPayload {
    /// Projects this payload down to the single box belonging to `recipient`, for publication to
    /// that recipient.
    pub fn for_recipient(&self, recipient: &PublicKey) -> Result<EncodedPayload, PayloadError> {
        let index = self
            .recipient_keys
            .iter()
            .position(|key| key == recipient)
            .ok_or(PayloadError::RecipientNotFound(*recipient))?;
        Ok(EncodedPayload {
            recipient_boxes: vec![self.recipient_boxes[index].clone()],
            recipient_keys: vec![*recipient],
            ..self.clone()
        })
    }

    /// Returns a copy with `recipient` appended to the key list, boxes unchanged. Used to re-label
    /// a stored payload whose recipient list was dropped on receipt, once decryption has revealed
    /// which key worked.
    pub fn with_recipient(&self, recipient: PublicKey) -> EncodedPayload {
        let mut payload = self.clone();
        payload.recipient_keys.push(recipient);
        payload
    }

    /// The affected contract transaction hashes, in insertion order.
    pub fn affected_hashes(&self) -> Vec<MessageHash> {
        self.affected_contract_transactions
            .iter()
            .map(|(hash, _)| hash.clone())
            .collect()
    }

    pub fn security_hash_for(&self, hash: &MessageHash) -> Option<&SecurityHash> {
        self.affected_contract_transactions
            .iter()
            .find(|(h, _)| h == hash)
            .map(|(_, security_hash)| security_hash)
    }

    /// Returns a copy with the given affected entries removed, relative order of the remaining
    /// entries preserved.
    pub fn without_affected(&self, invalid: &[MessageHash]) -> EncodedPayload {
        let mut payload = self.clone();
        payload
            .affected_contract_transactions
            .retain(|(hash, _)| !invalid.contains(hash));
        payload
    }
}

/// The sender's pre-distribution form of a transaction: the message encrypted under a master key
/// that has not yet been boxed for any recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawTransaction {
    pub encrypted_payload: Vec<u8>,
    pub encrypted_key: Vec<u8>,
    pub nonce: Nonce,
    pub from: PublicKey,
}

/// A prior transaction resolved from the local store while validating a new one.
#[derive(Clone, Debug)]
pub struct AffectedTransaction {
    pub hash: MessageHash,
    pub payload: EncodedPayload,
}

#[cfg(test)]
mod test {
    use super::*;

    fn key(seed: u8) -> PublicKey {
        PublicKey::from_bytes(&[seed; 32]).unwrap()
    }

    fn sample_payload() -> EncodedPayload {
        EncodedPayload {
            sender_key: key(1),
            cipher_text: b"cipher".to_vec(),
            cipher_text_nonce: Nonce::from_bytes(b"ct-nonce"),
            recipient_boxes: vec![b"box-a".to_vec(), b"box-b".to_vec()],
            recipient_nonce: Nonce::from_bytes(b"rc-nonce"),
            recipient_keys: vec![key(1), key(2)],
            privacy_mode: PrivacyMode::StandardPrivate,
            affected_contract_transactions: vec![
                (MessageHash::from_bytes(b"t1"), SecurityHash::from_bytes(b"s1")),
                (MessageHash::from_bytes(b"t2"), SecurityHash::from_bytes(b"s2")),
            ],
            exec_hash: Vec::new(),
        }
    }

    #[test]
    fn for_recipient_selects_matching_box() {
        let payload = sample_payload();
        let projection = payload.for_recipient(&key(2)).unwrap();
        assert_eq!(projection.recipient_boxes, vec![b"box-b".to_vec()]);
        assert_eq!(projection.recipient_keys, vec![key(2)]);
        assert_eq!(projection.cipher_text, payload.cipher_text);
        assert_eq!(projection.sender_key, payload.sender_key);
    }

    #[test]
    fn for_recipient_rejects_unknown_key() {
        let payload = sample_payload();
        assert!(matches!(
            payload.for_recipient(&key(9)),
            Err(PayloadError::RecipientNotFound(_))
        ));
    }

    #[test]
    fn with_recipient_appends_key_only() {
        let payload = sample_payload();
        let relabelled = payload.with_recipient(key(3));
        assert_eq!(relabelled.recipient_keys, vec![key(1), key(2), key(3)]);
        assert_eq!(relabelled.recipient_boxes, payload.recipient_boxes);
    }

    #[test]
    fn without_affected_preserves_order() {
        let payload = sample_payload();
        let sanitized = payload.without_affected(&[MessageHash::from_bytes(b"t1")]);
        assert_eq!(
            sanitized.affected_hashes(),
            vec![MessageHash::from_bytes(b"t2")]
        );
    }
}
