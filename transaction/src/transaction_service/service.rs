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

//! The private transaction manager. Each public operation is a bounded, synchronous sequence of
//! store reads, one enclave call and at most one store write; distribution to peers happens
//! strictly after persistence and is best-effort.

use std::sync::Arc;

use itertools::Itertools;
use log::*;
use veil_common_types::{codec, AffectedTransaction, EncodedPayload, MessageHash, PrivacyMode, PublicKey};
use veil_enclave::Enclave;

use crate::transaction_service::{
    config::TransactionServiceConfig,
    error::TransactionServiceError,
    privacy,
    publisher::PayloadPublisher,
    resend::{ResendManager, ResendRequest, ResendResponse},
    storage::{
        database::{RawTransactionBackend, RawTransactionDatabase, TransactionBackend, TransactionDatabase},
        models::{EncryptedRawTransaction, EncryptedTransaction},
    },
};

const LOG_TARGET: &str = "transaction_service::service";

/// A request to encrypt and distribute a new private transaction.
#[derive(Clone, Debug)]
pub struct SendRequest {
    pub payload: Vec<u8>,
    /// Sending key; the enclave's default key when absent.
    pub sender: Option<PublicKey>,
    pub recipients: Vec<PublicKey>,
    pub privacy_mode: PrivacyMode,
    /// Required non-empty under private state validation.
    pub exec_hash: Vec<u8>,
    /// Base64 hashes of the affected contract transactions. Every one must resolve locally.
    pub affected_contract_transactions: Vec<String>,
}

/// As [SendRequest], but the plaintext comes from a previously stored raw transaction and the
/// sender is the raw transaction's key.
#[derive(Clone, Debug)]
pub struct SendSignedRequest {
    pub hash: MessageHash,
    pub recipients: Vec<PublicKey>,
    pub privacy_mode: PrivacyMode,
    pub exec_hash: Vec<u8>,
    pub affected_contract_transactions: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SendResponse {
    /// Base64 of the transaction's content address.
    pub transaction_hash: String,
}

#[derive(Clone, Debug)]
pub struct ReceiveRequest {
    pub hash: MessageHash,
    /// Decrypting key; when absent every local key is tried in turn.
    pub recipient: Option<PublicKey>,
    /// Read from the raw store instead of the transaction store.
    pub raw: bool,
}

#[derive(Clone, Debug)]
pub struct ReceiveResponse {
    pub payload: Vec<u8>,
    pub privacy_flag: u8,
    /// Base64 hashes of the affected contract transactions, in payload order.
    pub affected_contract_transactions: Vec<String>,
    pub exec_hash: String,
}

/// Mediates between callers, the enclave, the stores and the peer publisher. Owns no mutable
/// state of its own; it may be shared freely across threads.
pub struct TransactionManager<TBackend, TRawBackend, TEnclave, TPublisher> {
    config: TransactionServiceConfig,
    database: TransactionDatabase<TBackend>,
    raw_database: RawTransactionDatabase<TRawBackend>,
    enclave: Arc<TEnclave>,
    publisher: Arc<TPublisher>,
    resend_manager: ResendManager<TBackend>,
}

impl<TBackend, TRawBackend, TEnclave, TPublisher> TransactionManager<TBackend, TRawBackend, TEnclave, TPublisher>
where
    TBackend: TransactionBackend + 'static,
    TRawBackend: RawTransactionBackend + 'static,
    TEnclave: Enclave,
    TPublisher: PayloadPublisher,
{
    pub fn new(
        config: TransactionServiceConfig,
        database: TransactionDatabase<TBackend>,
        raw_database: RawTransactionDatabase<TRawBackend>,
        enclave: Arc<TEnclave>,
        publisher: Arc<TPublisher>,
    ) -> Self {
        let resend_manager = ResendManager::new(database.clone());
        Self {
            config,
            database,
            raw_database,
            enclave,
            publisher,
            resend_manager,
        }
    }

    /// Encrypts the payload for the full recipient set, persists the result and distributes a
    /// projection to every remote recipient. Persistence strictly precedes publication; a failed
    /// delivery is logged and never rolls the transaction back.
    pub fn send(&self, request: SendRequest) -> Result<SendResponse, TransactionServiceError> {
        let sender = match request.sender {
            Some(key) => key,
            None => self.enclave.default_public_key()?,
        };
        let recipients = self.build_recipient_list(sender, &request.recipients)?;
        let affected = self.build_affected(&request.affected_contract_transactions)?;

        privacy::validate_affected_modes(request.privacy_mode, &affected)?;
        if request.privacy_mode == PrivacyMode::PrivateStateValidation {
            privacy::validate_recipient_sets(&recipients, &affected)?;
        }

        let payload = self.enclave.encrypt_payload(
            &request.payload,
            &sender,
            &recipients,
            request.privacy_mode,
            &affected,
            &request.exec_hash,
        )?;
        let hash = MessageHash::from_cipher_text(&payload.cipher_text);
        self.database
            .save(EncryptedTransaction::new(hash.clone(), codec::encode(&payload)))?;
        debug!(target: LOG_TARGET, "Stored transaction {} for {} recipients", hash, recipients.len());

        self.publish(&payload, &recipients)?;
        Ok(SendResponse {
            transaction_hash: hash.to_base64(),
        })
    }

    /// As [TransactionManager::send], reusing the ciphertext of the stored raw transaction so the
    /// returned hash equals the raw transaction's hash.
    pub fn send_signed_transaction(&self, request: SendSignedRequest) -> Result<SendResponse, TransactionServiceError> {
        let stored = self
            .raw_database
            .retrieve_by_hash(&request.hash)?
            .ok_or_else(|| TransactionServiceError::TransactionNotFound(request.hash.to_base64()))?;
        let recipients = self.build_recipient_list(stored.sender, &request.recipients)?;
        let affected = self.build_affected(&request.affected_contract_transactions)?;

        privacy::validate_affected_modes(request.privacy_mode, &affected)?;
        if request.privacy_mode == PrivacyMode::PrivateStateValidation {
            privacy::validate_recipient_sets(&recipients, &affected)?;
        }

        let payload = self.enclave.encrypt_payload_from_raw(
            &stored.to_raw_transaction(),
            &recipients,
            request.privacy_mode,
            &affected,
            &request.exec_hash,
        )?;
        let hash = MessageHash::from_cipher_text(&payload.cipher_text);
        self.database
            .save(EncryptedTransaction::new(hash.clone(), codec::encode(&payload)))?;
        debug!(target: LOG_TARGET, "Stored signed transaction {}", hash);

        self.publish(&payload, &recipients)?;
        Ok(SendResponse {
            transaction_hash: hash.to_base64(),
        })
    }

    /// Validates and persists a payload pushed by a remote peer.
    ///
    /// The paths that return the hash without persisting are deliberate: the response to a peer
    /// probing for affected transactions it should not know about must be indistinguishable from
    /// an accepted payload.
    pub fn store_payload(&self, encoded: &[u8]) -> Result<MessageHash, TransactionServiceError> {
        let payload = codec::decode(encoded)?;
        let hash = MessageHash::from_cipher_text(&payload.cipher_text);

        let requested = payload.affected_hashes();
        let affected = self.resolve_affected(&requested)?;

        if privacy::validate_affected_modes(payload.privacy_mode, &affected).is_err() {
            debug!(
                target: LOG_TARGET,
                "Privacy mode of {} disagrees with its affected contract transactions; not storing", hash
            );
            return Ok(hash);
        }

        if payload.privacy_mode == PrivacyMode::PrivateStateValidation {
            if affected.len() != requested.len() {
                warn!(
                    target: LOG_TARGET,
                    "Payload {} references affected contract transactions not present locally; not storing", hash
                );
                return Ok(hash);
            }
            // With no affected transactions there is no participant set to test the sender
            // against; the check only applies once something is referenced.
            if !affected.is_empty() && !privacy::sender_participates(&payload.sender_key, &affected) {
                debug!(
                    target: LOG_TARGET,
                    "Sender of {} is not a participant of its affected contract transactions; not storing", hash
                );
                return Ok(hash);
            }
            privacy::validate_recipient_sets(&payload.recipient_keys, &affected)?;
        }

        let invalid = self.enclave.find_invalid_security_hashes(&payload, &affected)?;
        let sanitized = if invalid.is_empty() {
            payload.clone()
        } else {
            if payload.privacy_mode == PrivacyMode::PrivateStateValidation {
                return Err(TransactionServiceError::PrivacyViolation(format!(
                    "Invalid security hashes identified for payload {}",
                    hash
                )));
            }
            warn!(
                target: LOG_TARGET,
                "Dropping {} affected contract transactions with invalid security hashes from {}",
                invalid.len(),
                hash
            );
            payload.without_affected(&invalid)
        };

        if self.enclave.public_keys()?.contains(&payload.sender_key) {
            debug!(target: LOG_TARGET, "Transaction {} originates from this node; merging recipients", hash);
            self.resend_manager.accept_own_message(&codec::encode(&sanitized))?;
        } else {
            self.database
                .save(EncryptedTransaction::new(hash.clone(), codec::encode(&sanitized)))?;
        }
        Ok(hash)
    }

    /// Decrypts a stored transaction. Raw transactions carry no shared privacy metadata, so the
    /// raw path always reports the standard mode with no affected transactions.
    pub fn receive(&self, request: ReceiveRequest) -> Result<ReceiveResponse, TransactionServiceError> {
        if request.raw {
            let stored = self
                .raw_database
                .retrieve_by_hash(&request.hash)?
                .ok_or_else(|| TransactionServiceError::TransactionNotFound(request.hash.to_base64()))?;
            let message = self.enclave.unencrypt_raw_payload(&stored.to_raw_transaction())?;
            return Ok(ReceiveResponse {
                payload: message,
                privacy_flag: PrivacyMode::StandardPrivate.flag(),
                affected_contract_transactions: Vec::new(),
                exec_hash: String::new(),
            });
        }

        let payload = self.fetch_payload(&request.hash)?;
        let recipient = match request.recipient {
            Some(key) => key,
            None => self.search_recipient_key(&payload)?,
        };
        let message = self.enclave.unencrypt_transaction(&payload, &recipient)?;
        Ok(ReceiveResponse {
            payload: message,
            privacy_flag: payload.privacy_mode.flag(),
            affected_contract_transactions: payload.affected_hashes().iter().map(|h| h.to_base64()).collect(),
            exec_hash: String::from_utf8_lossy(&payload.exec_hash).into_owned(),
        })
    }

    /// Re-delivers stored transactions to a peer. A bulk resend pages through the whole store and
    /// prefers liveness over completeness: a record that cannot be decoded, projected or
    /// delivered is logged and skipped.
    pub fn resend(&self, request: ResendRequest) -> Result<ResendResponse, TransactionServiceError> {
        match request {
            ResendRequest::All { public_key } => {
                self.resend_all(&public_key)?;
                Ok(ResendResponse::default())
            },
            ResendRequest::Individual {
                public_key,
                transaction_hash,
            } => {
                let stored = self
                    .database
                    .retrieve_by_hash(&transaction_hash)?
                    .ok_or_else(|| TransactionServiceError::TransactionNotFound(transaction_hash.to_base64()))?;
                let payload = codec::decode(&stored.payload)?;
                let outgoing = self
                    .project_for_requester(&public_key, &payload)?
                    .ok_or(veil_common_types::PayloadError::RecipientNotFound(public_key))?;
                Ok(ResendResponse {
                    payload: Some(codec::encode(&outgoing)),
                })
            },
        }
    }

    /// Encrypts and stores the pre-distribution form of a transaction for a later signed send.
    pub fn store_raw(&self, payload: Vec<u8>, sender: Option<PublicKey>) -> Result<MessageHash, TransactionServiceError> {
        let sender = match sender {
            Some(key) => key,
            None => self.enclave.default_public_key()?,
        };
        let raw = self.enclave.encrypt_raw_payload(&payload, &sender)?;
        let hash = MessageHash::from_cipher_text(&raw.encrypted_payload);
        self.raw_database
            .save(EncryptedRawTransaction::from_raw_transaction(hash.clone(), raw))?;
        debug!(target: LOG_TARGET, "Stored raw transaction {}", hash);
        Ok(hash)
    }

    /// Removes the encrypted transaction. Deleting an absent record is a no-op.
    pub fn delete(&self, hash: &MessageHash) -> Result<(), TransactionServiceError> {
        self.database.delete(hash)?;
        Ok(())
    }

    /// True when the stored transaction was sent by one of this node's keys.
    pub fn is_sender(&self, hash: &MessageHash) -> Result<bool, TransactionServiceError> {
        let payload = self.fetch_payload(hash)?;
        Ok(self.enclave.public_keys()?.contains(&payload.sender_key))
    }

    /// The recipient keys of the stored transaction, sender included when present.
    pub fn get_participants(&self, hash: &MessageHash) -> Result<Vec<PublicKey>, TransactionServiceError> {
        Ok(self.fetch_payload(hash)?.recipient_keys)
    }

    /// Recipients, sender, then forwarding keys; first-seen order, deduplicated.
    fn build_recipient_list(
        &self,
        sender: PublicKey,
        recipients: &[PublicKey],
    ) -> Result<Vec<PublicKey>, TransactionServiceError> {
        let forwarding = self.enclave.forwarding_keys()?;
        Ok(recipients
            .iter()
            .copied()
            .chain(std::iter::once(sender))
            .chain(forwarding)
            .unique()
            .collect())
    }

    fn publish(&self, payload: &EncodedPayload, recipients: &[PublicKey]) -> Result<(), TransactionServiceError> {
        let managed = self.enclave.public_keys()?;
        for recipient in recipients {
            if managed.contains(recipient) {
                continue;
            }
            let projection = payload.for_recipient(recipient)?;
            if let Err(err) = self.publisher.publish_payload(&projection, recipient) {
                warn!(target: LOG_TARGET, "Failed to publish payload to {}: {}", recipient, err);
            }
        }
        Ok(())
    }

    fn resend_all(&self, public_key: &PublicKey) -> Result<(), TransactionServiceError> {
        if self.enclave.public_keys()?.contains(public_key) {
            debug!(target: LOG_TARGET, "Not re-publishing to locally managed key {}", public_key);
            return Ok(());
        }
        let fetch_size = self.config.resend_fetch_size as u64;
        let mut offset = 0u64;
        while offset < self.database.transaction_count()? {
            let page = self.database.retrieve_transactions(offset, fetch_size)?;
            if page.is_empty() {
                break;
            }
            for transaction in &page {
                if let Err(err) = self.resend_transaction(public_key, transaction) {
                    warn!(
                        target: LOG_TARGET,
                        "Skipping transaction {} during resend to {}: {}", transaction.hash, public_key, err
                    );
                }
            }
            offset += fetch_size;
        }
        Ok(())
    }

    fn resend_transaction(
        &self,
        public_key: &PublicKey,
        transaction: &EncryptedTransaction,
    ) -> Result<(), TransactionServiceError> {
        let payload = codec::decode(&transaction.payload)?;
        let outgoing = match self.project_for_requester(public_key, &payload)? {
            Some(outgoing) => outgoing,
            None => return Ok(()),
        };
        if let Err(err) = self.publisher.publish_payload(&outgoing, public_key) {
            warn!(
                target: LOG_TARGET,
                "Failed to re-publish transaction {} to {}: {}", transaction.hash, public_key, err
            );
        }
        Ok(())
    }

    /// The payload to hand back to `public_key`, or `None` when the transaction does not involve
    /// that key. A transaction we sent on the requester's behalf goes back whole; one where the
    /// requester is a recipient goes back as its projection; a sender-side record that lost its
    /// recipient labels is re-labelled via the key search first.
    fn project_for_requester(
        &self,
        public_key: &PublicKey,
        payload: &EncodedPayload,
    ) -> Result<Option<EncodedPayload>, TransactionServiceError> {
        if payload.sender_key == *public_key {
            if payload.recipient_keys.is_empty() {
                let recipient = self.search_recipient_key(payload)?;
                Ok(Some(payload.with_recipient(recipient)))
            } else {
                Ok(Some(payload.clone()))
            }
        } else if payload.recipient_keys.contains(public_key) {
            Ok(Some(payload.for_recipient(public_key)?))
        } else {
            Ok(None)
        }
    }

    /// Tries every local key against the payload; any enclave failure means "not this key". The
    /// first key that decrypts wins.
    fn search_recipient_key(&self, payload: &EncodedPayload) -> Result<PublicKey, TransactionServiceError> {
        for key in self.enclave.public_keys()? {
            if self.enclave.unencrypt_transaction(payload, &key).is_ok() {
                return Ok(key);
            }
        }
        Err(TransactionServiceError::RecipientKeyNotFound)
    }

    /// Resolves base64 affected hashes for an outbound transaction. Every requested hash must
    /// resolve; the first that does not names the violation, in request order.
    fn build_affected(&self, hashes: &[String]) -> Result<Vec<AffectedTransaction>, TransactionServiceError> {
        let mut requested = Vec::with_capacity(hashes.len());
        for encoded in hashes {
            requested.push(MessageHash::from_base64(encoded)?);
        }
        let found = self.database.find_by_hashes(&requested)?;
        for hash in &requested {
            if !found.iter().any(|transaction| &transaction.hash == hash) {
                return Err(TransactionServiceError::PrivacyViolation(format!(
                    "Unable to find affectedContractTransaction {}",
                    hash
                )));
            }
        }
        Self::decode_affected(found)
    }

    /// Resolves affected hashes for an inbound payload against the local store. Unknown hashes
    /// are dropped silently; the caller decides what absence means.
    fn resolve_affected(&self, requested: &[MessageHash]) -> Result<Vec<AffectedTransaction>, TransactionServiceError> {
        if requested.is_empty() {
            return Ok(Vec::new());
        }
        Self::decode_affected(self.database.find_by_hashes(requested)?)
    }

    fn decode_affected(
        transactions: Vec<EncryptedTransaction>,
    ) -> Result<Vec<AffectedTransaction>, TransactionServiceError> {
        transactions
            .into_iter()
            .map(|transaction| {
                Ok(AffectedTransaction {
                    payload: codec::decode(&transaction.payload)?,
                    hash: transaction.hash,
                })
            })
            .collect()
    }

    fn fetch_payload(&self, hash: &MessageHash) -> Result<EncodedPayload, TransactionServiceError> {
        let stored = self
            .database
            .retrieve_by_hash(hash)?
            .ok_or_else(|| TransactionServiceError::TransactionNotFound(hash.to_base64()))?;
        Ok(codec::decode(&stored.payload)?)
    }
}
