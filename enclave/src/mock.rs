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

//! A software enclave for tests.
//!
//! Real deployments keep key material behind a hardened boundary; this mock keeps the full
//! [Enclave] contract honest with an actual AEAD so decrypt-failure paths behave like the real
//! thing. The "shared secret" between two parties is derived from their public keys alone, which
//! is what makes this a mock: anyone can derive it.

use blake2::{Blake2b, Digest};
use chacha20poly1305::{
    aead::{Aead, NewAead},
    ChaCha20Poly1305,
    Key,
    Nonce as AeadNonce,
};
use rand::{rngs::OsRng, RngCore};
use veil_common_types::{
    AffectedTransaction,
    EncodedPayload,
    MessageHash,
    Nonce,
    PrivacyMode,
    PublicKey,
    RawTransaction,
    SecurityHash,
};
use zeroize::Zeroize;

use crate::{Enclave, EnclaveError};

const MASTER_KEY_LEN: usize = 32;
const AEAD_NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct MockEnclave {
    default_key: PublicKey,
    keys: Vec<PublicKey>,
    forwarding: Vec<PublicKey>,
}

impl MockEnclave {
    pub fn new(default_key: PublicKey, keys: Vec<PublicKey>, forwarding: Vec<PublicKey>) -> Self {
        let mut keys = keys;
        if !keys.contains(&default_key) {
            keys.insert(0, default_key);
        }
        Self {
            default_key,
            keys,
            forwarding,
        }
    }

    pub fn with_single_key(key: PublicKey) -> Self {
        Self::new(key, vec![key], Vec::new())
    }

    /// Key under which `sender` boxes the master key for `recipient`. Argument order matters and
    /// must match between boxing and opening.
    fn shared_key(sender: &PublicKey, recipient: &PublicKey) -> [u8; MASTER_KEY_LEN] {
        let digest = Blake2b::new()
            .chain(sender.as_bytes())
            .chain(recipient.as_bytes())
            .finalize();
        let mut key = [0u8; MASTER_KEY_LEN];
        key.copy_from_slice(&digest[..MASTER_KEY_LEN]);
        key
    }

    fn seal(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, EnclaveError> {
        if nonce.len() != AEAD_NONCE_LEN {
            return Err(EnclaveError::EncryptionFailed);
        }
        ChaCha20Poly1305::new(Key::from_slice(key))
            .encrypt(AeadNonce::from_slice(nonce), plaintext)
            .map_err(|_| EnclaveError::EncryptionFailed)
    }

    fn open(key: &[u8], nonce: &[u8], sealed: &[u8]) -> Result<Vec<u8>, EnclaveError> {
        if nonce.len() != AEAD_NONCE_LEN {
            return Err(EnclaveError::DecryptionFailed);
        }
        ChaCha20Poly1305::new(Key::from_slice(key))
            .decrypt(AeadNonce::from_slice(nonce), sealed)
            .map_err(|_| EnclaveError::DecryptionFailed)
    }

    fn random_nonce() -> Vec<u8> {
        let mut nonce = vec![0u8; AEAD_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }

    fn security_hash(cipher_text: &[u8], affected_cipher_text: &[u8]) -> SecurityHash {
        let digest = Blake2b::new().chain(cipher_text).chain(affected_cipher_text).finalize();
        SecurityHash::from_bytes(&digest)
    }

    fn master_key_for(&self, raw: &RawTransaction) -> Result<Vec<u8>, EnclaveError> {
        Self::open(
            &Self::shared_key(&raw.from, &raw.from),
            raw.nonce.as_bytes(),
            &raw.encrypted_key,
        )
    }
}

impl Enclave for MockEnclave {
    fn default_public_key(&self) -> Result<PublicKey, EnclaveError> {
        Ok(self.default_key)
    }

    fn public_keys(&self) -> Result<Vec<PublicKey>, EnclaveError> {
        Ok(self.keys.clone())
    }

    fn forwarding_keys(&self) -> Result<Vec<PublicKey>, EnclaveError> {
        Ok(self.forwarding.clone())
    }

    fn encrypt_payload(
        &self,
        message: &[u8],
        sender: &PublicKey,
        recipients: &[PublicKey],
        privacy_mode: PrivacyMode,
        affected: &[AffectedTransaction],
        exec_hash: &[u8],
    ) -> Result<EncodedPayload, EnclaveError> {
        let mut master = [0u8; MASTER_KEY_LEN];
        OsRng.fill_bytes(&mut master);

        let cipher_text_nonce = Self::random_nonce();
        let recipient_nonce = Self::random_nonce();
        let cipher_text = Self::seal(&master, &cipher_text_nonce, message)?;

        let recipient_boxes = recipients
            .iter()
            .map(|recipient| Self::seal(&Self::shared_key(sender, recipient), &recipient_nonce, &master))
            .collect::<Result<Vec<_>, _>>()?;
        master.zeroize();

        let affected_contract_transactions = affected
            .iter()
            .map(|a| {
                (
                    a.hash.clone(),
                    Self::security_hash(&cipher_text, &a.payload.cipher_text),
                )
            })
            .collect();

        Ok(EncodedPayload {
            sender_key: *sender,
            cipher_text,
            cipher_text_nonce: Nonce::new(cipher_text_nonce),
            recipient_boxes,
            recipient_nonce: Nonce::new(recipient_nonce),
            recipient_keys: recipients.to_vec(),
            privacy_mode,
            affected_contract_transactions,
            exec_hash: exec_hash.to_vec(),
        })
    }

    fn encrypt_payload_from_raw(
        &self,
        raw: &RawTransaction,
        recipients: &[PublicKey],
        privacy_mode: PrivacyMode,
        affected: &[AffectedTransaction],
        exec_hash: &[u8],
    ) -> Result<EncodedPayload, EnclaveError> {
        let mut master = self.master_key_for(raw)?;

        let recipient_nonce = Self::random_nonce();
        let recipient_boxes = recipients
            .iter()
            .map(|recipient| Self::seal(&Self::shared_key(&raw.from, recipient), &recipient_nonce, &master))
            .collect::<Result<Vec<_>, _>>()?;
        master.zeroize();

        let affected_contract_transactions = affected
            .iter()
            .map(|a| {
                (
                    a.hash.clone(),
                    Self::security_hash(&raw.encrypted_payload, &a.payload.cipher_text),
                )
            })
            .collect();

        Ok(EncodedPayload {
            sender_key: raw.from,
            cipher_text: raw.encrypted_payload.clone(),
            cipher_text_nonce: raw.nonce.clone(),
            recipient_boxes,
            recipient_nonce: Nonce::new(recipient_nonce),
            recipient_keys: recipients.to_vec(),
            privacy_mode,
            affected_contract_transactions,
            exec_hash: exec_hash.to_vec(),
        })
    }

    fn encrypt_raw_payload(&self, message: &[u8], sender: &PublicKey) -> Result<RawTransaction, EnclaveError> {
        let mut master = [0u8; MASTER_KEY_LEN];
        OsRng.fill_bytes(&mut master);

        let nonce = Self::random_nonce();
        let encrypted_payload = Self::seal(&master, &nonce, message)?;
        let encrypted_key = Self::seal(&Self::shared_key(sender, sender), &nonce, &master)?;
        master.zeroize();

        Ok(RawTransaction {
            encrypted_payload,
            encrypted_key,
            nonce: Nonce::new(nonce),
            from: *sender,
        })
    }

    fn unencrypt_transaction(
        &self,
        payload: &EncodedPayload,
        recipient: &PublicKey,
    ) -> Result<Vec<u8>, EnclaveError> {
        let shared = Self::shared_key(&payload.sender_key, recipient);
        let candidates: Vec<&Vec<u8>> = match payload.recipient_keys.iter().position(|key| key == recipient) {
            Some(index) => payload.recipient_boxes.get(index).into_iter().collect(),
            // An unlabelled payload: trial-open every box.
            None => payload.recipient_boxes.iter().collect(),
        };
        for recipient_box in candidates {
            if let Ok(mut master) = Self::open(&shared, payload.recipient_nonce.as_bytes(), recipient_box) {
                let message = Self::open(&master, payload.cipher_text_nonce.as_bytes(), &payload.cipher_text);
                master.zeroize();
                return message;
            }
        }
        Err(EnclaveError::DecryptionFailed)
    }

    fn unencrypt_raw_payload(&self, raw: &RawTransaction) -> Result<Vec<u8>, EnclaveError> {
        let mut master = self.master_key_for(raw)?;
        let message = Self::open(&master, raw.nonce.as_bytes(), &raw.encrypted_payload);
        master.zeroize();
        message
    }

    fn find_invalid_security_hashes(
        &self,
        payload: &EncodedPayload,
        affected: &[AffectedTransaction],
    ) -> Result<Vec<MessageHash>, EnclaveError> {
        let mut invalid = Vec::new();
        for a in affected {
            let expected = Self::security_hash(&payload.cipher_text, &a.payload.cipher_text);
            match payload.security_hash_for(&a.hash) {
                Some(stored) if *stored == expected => {},
                Some(_) => invalid.push(a.hash.clone()),
                // Not referenced by the payload at all: nothing to invalidate.
                None => {},
            }
        }
        Ok(invalid)
    }
}
