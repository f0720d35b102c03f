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

use veil_common_types::{MessageHash, Nonce, PublicKey, RawTransaction};

/// A persisted encrypted transaction. The hash is the content address of the encoded payload's
/// ciphertext; records are immutable after save except for deletion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedTransaction {
    pub hash: MessageHash,
    pub payload: Vec<u8>,
}

impl EncryptedTransaction {
    pub fn new(hash: MessageHash, payload: Vec<u8>) -> Self {
        Self { hash, payload }
    }
}

/// The sender's pre-distribution form of a transaction, created by a raw store and consumed by a
/// signed send. The record stays in place after the send; it is simply never re-sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedRawTransaction {
    pub hash: MessageHash,
    pub encrypted_payload: Vec<u8>,
    pub encrypted_key: Vec<u8>,
    pub nonce: Nonce,
    pub sender: PublicKey,
}

impl EncryptedRawTransaction {
    pub fn from_raw_transaction(hash: MessageHash, raw: RawTransaction) -> Self {
        Self {
            hash,
            encrypted_payload: raw.encrypted_payload,
            encrypted_key: raw.encrypted_key,
            nonce: raw.nonce,
            sender: raw.from,
        }
    }

    pub fn to_raw_transaction(&self) -> RawTransaction {
        RawTransaction {
            encrypted_payload: self.encrypted_payload.clone(),
            encrypted_key: self.encrypted_key.clone(),
            nonce: self.nonce.clone(),
            from: self.sender,
        }
    }
}
