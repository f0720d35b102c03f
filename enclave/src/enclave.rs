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

use veil_common_types::{AffectedTransaction, EncodedPayload, MessageHash, PrivacyMode, PublicKey, RawTransaction};

use crate::error::EnclaveError;

/// This trait defines the contract of the component holding the node's private key material. All
/// encryption, decryption and security hash computation happens behind it; the transaction
/// service never sees a secret.
///
/// Implementations are expected to be thread-safe and stateless with respect to transaction
/// identity.
pub trait Enclave: Send + Sync {
    /// The key used as sender when a request does not name one.
    fn default_public_key(&self) -> Result<PublicKey, EnclaveError>;

    /// Every key this node holds private material for.
    fn public_keys(&self) -> Result<Vec<PublicKey>, EnclaveError>;

    /// Keys implicitly added as recipients of every outbound transaction.
    fn forwarding_keys(&self) -> Result<Vec<PublicKey>, EnclaveError>;

    /// Encrypts `message` under a fresh master key and boxes that key for every recipient. The
    /// affected transactions are bound into the payload via their security hashes.
    fn encrypt_payload(
        &self,
        message: &[u8],
        sender: &PublicKey,
        recipients: &[PublicKey],
        privacy_mode: PrivacyMode,
        affected: &[AffectedTransaction],
        exec_hash: &[u8],
    ) -> Result<EncodedPayload, EnclaveError>;

    /// As [Enclave::encrypt_payload], but reusing the master key and ciphertext of a previously
    /// stored raw transaction, so the resulting payload keeps the raw transaction's hash.
    fn encrypt_payload_from_raw(
        &self,
        raw: &RawTransaction,
        recipients: &[PublicKey],
        privacy_mode: PrivacyMode,
        affected: &[AffectedTransaction],
        exec_hash: &[u8],
    ) -> Result<EncodedPayload, EnclaveError>;

    /// Encrypts `message` under a fresh master key boxed only for the sender, producing the
    /// pre-distribution form used by signed sends.
    fn encrypt_raw_payload(&self, message: &[u8], sender: &PublicKey) -> Result<RawTransaction, EnclaveError>;

    /// Opens the recipient's box and decrypts the ciphertext. Fails when `recipient`'s box is not
    /// on the payload or the box does not authenticate.
    fn unencrypt_transaction(&self, payload: &EncodedPayload, recipient: &PublicKey)
        -> Result<Vec<u8>, EnclaveError>;

    fn unencrypt_raw_payload(&self, raw: &RawTransaction) -> Result<Vec<u8>, EnclaveError>;

    /// Recomputes the security hash of every affected transaction against `payload` and returns
    /// the subset of the payload's affected hashes whose stored value disagrees.
    fn find_invalid_security_hashes(
        &self,
        payload: &EncodedPayload,
        affected: &[AffectedTransaction],
    ) -> Result<Vec<MessageHash>, EnclaveError>;
}
