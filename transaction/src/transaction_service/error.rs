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
use veil_common_types::{codec::CodecError, types::CommonTypeError, MessageHash, PayloadError, PublicKey};
use veil_enclave::EnclaveError;

#[derive(Debug, Error)]
pub enum TransactionServiceError {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Privacy violation: {0}")]
    PrivacyViolation(String),
    #[error("No local key can decrypt the payload")]
    RecipientKeyNotFound,
    #[error("Enclave operation failed: {0}")]
    EnclaveError(#[from] EnclaveError),
    #[error("Transaction storage error: {0}")]
    StorageError(#[from] TransactionStorageError),
    #[error("Failed to decode payload: {0}")]
    CodecError(#[from] CodecError),
    #[error("Payload projection failed: {0}")]
    PayloadError(#[from] PayloadError),
    #[error("Invalid request argument: {0}")]
    InvalidRequest(#[from] CommonTypeError),
}

#[derive(Debug, Error)]
pub enum TransactionStorageError {
    #[error("Value not found: {0}")]
    ValueNotFound(MessageHash),
    #[error("Database error: {0}")]
    DieselError(#[from] diesel::result::Error),
    #[error("Database connection error: {0}")]
    DieselConnectionError(#[from] diesel::result::ConnectionError),
    #[error("Database migration failed: {0}")]
    DatabaseMigrationError(String),
    #[error("Database lock was poisoned")]
    PoisonedAccess,
    #[error("Unexpected result from database backend: {0}")]
    UnexpectedResult(String),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to deliver payload to {recipient}: {reason}")]
    DeliveryFailed { recipient: PublicKey, reason: String },
}
