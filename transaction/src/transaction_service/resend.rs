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

use std::fmt;

use log::*;
use veil_common_types::{codec, MessageHash, PublicKey};

use crate::transaction_service::{
    error::TransactionServiceError,
    storage::{
        database::{TransactionBackend, TransactionDatabase},
        models::EncryptedTransaction,
    },
};

const LOG_TARGET: &str = "transaction_service::resend";

/// A peer's request to be handed transactions it is entitled to, after it lost or never received
/// them.
#[derive(Clone, Debug)]
pub enum ResendRequest {
    /// Re-publish every stored transaction involving `public_key` to that peer.
    All { public_key: PublicKey },
    /// Return the projection of one transaction for `public_key` to the caller, without
    /// publishing anything.
    Individual {
        public_key: PublicKey,
        transaction_hash: MessageHash,
    },
}

impl fmt::Display for ResendRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResendRequest::All { public_key } => write!(f, "All({})", public_key),
            ResendRequest::Individual {
                public_key,
                transaction_hash,
            } => write!(f, "Individual({}, {})", public_key, transaction_hash),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResendResponse {
    /// The encoded projected payload, present for individual requests only.
    pub payload: Option<Vec<u8>>,
}

/// Folds copies of our own transactions, received back from peers during catch-up, into the
/// store. A node that lost its database re-learns the recipients of its transactions one peer at
/// a time; each accepted copy contributes the recipient boxes that peer was given.
#[derive(Clone)]
pub struct ResendManager<TBackend> {
    database: TransactionDatabase<TBackend>,
}

impl<TBackend> ResendManager<TBackend>
where TBackend: TransactionBackend + 'static
{
    pub fn new(database: TransactionDatabase<TBackend>) -> Self {
        Self { database }
    }

    /// Accepts a payload this node originally sent. Recipient key/box pairs the stored record
    /// lacks are appended to it; re-delivery of known pairs leaves the record untouched, so the
    /// operation is idempotent.
    pub fn accept_own_message(&self, encoded: &[u8]) -> Result<MessageHash, TransactionServiceError> {
        let incoming = codec::decode(encoded)?;
        let hash = MessageHash::from_cipher_text(&incoming.cipher_text);

        match self.database.retrieve_by_hash(&hash)? {
            Some(existing) => {
                let mut stored = codec::decode(&existing.payload)?;
                if stored.recipient_keys.len() != stored.recipient_boxes.len() {
                    // An unlabelled record offers no positions to merge into; leave it alone.
                    debug!(
                        target: LOG_TARGET,
                        "Stored copy of {} carries unlabelled recipient boxes; skipping merge", hash
                    );
                    return Ok(hash);
                }
                let mut changed = false;
                for (key, recipient_box) in incoming.recipient_keys.iter().zip(incoming.recipient_boxes.iter()) {
                    if !stored.recipient_keys.contains(key) {
                        stored.recipient_keys.push(*key);
                        stored.recipient_boxes.push(recipient_box.clone());
                        changed = true;
                    }
                }
                if changed {
                    debug!(target: LOG_TARGET, "Merged recipients into stored transaction {}", hash);
                    self.database
                        .save(EncryptedTransaction::new(hash.clone(), codec::encode(&stored)))?;
                }
            },
            None => {
                debug!(target: LOG_TARGET, "Recovered own transaction {} from a peer", hash);
                self.database
                    .save(EncryptedTransaction::new(hash.clone(), encoded.to_vec()))?;
            },
        }
        Ok(hash)
    }
}
