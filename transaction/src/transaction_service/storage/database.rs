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

use std::sync::Arc;

use veil_common_types::MessageHash;

use crate::transaction_service::{
    error::TransactionStorageError,
    storage::models::{EncryptedRawTransaction, EncryptedTransaction},
};

/// This trait defines the functionality a database backend must provide to persist encrypted
/// transactions. Each method is a single atomic operation with respect to concurrent readers.
pub trait TransactionBackend: Send + Sync + Clone {
    /// Insert the record, overwriting any record with the same hash.
    fn save(&self, transaction: EncryptedTransaction) -> Result<(), TransactionStorageError>;
    /// Remove the record with the provided hash. Removing an absent record is not an error.
    fn delete(&self, hash: &MessageHash) -> Result<(), TransactionStorageError>;
    /// Fetch the record with the provided hash.
    fn retrieve_by_hash(&self, hash: &MessageHash) -> Result<Option<EncryptedTransaction>, TransactionStorageError>;
    /// Fetch the subset of the requested hashes that exist, in the backend's iteration order.
    fn find_by_hashes(&self, hashes: &[MessageHash]) -> Result<Vec<EncryptedTransaction>, TransactionStorageError>;
    /// Fetch one page of records. Iteration order is backend-defined but stable across pages.
    fn retrieve_transactions(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<EncryptedTransaction>, TransactionStorageError>;
    /// Number of stored records.
    fn transaction_count(&self) -> Result<u64, TransactionStorageError>;
}

/// This trait defines the functionality a database backend must provide to persist raw
/// (pre-distribution) transactions.
pub trait RawTransactionBackend: Send + Sync + Clone {
    fn save(&self, transaction: EncryptedRawTransaction) -> Result<(), TransactionStorageError>;
    fn retrieve_by_hash(
        &self,
        hash: &MessageHash,
    ) -> Result<Option<EncryptedRawTransaction>, TransactionStorageError>;
}

/// This structure holds an inner type that implements the `TransactionBackend` trait and exposes
/// the store to the service.
#[derive(Clone)]
pub struct TransactionDatabase<T> {
    db: Arc<T>,
}

impl<T> TransactionDatabase<T>
where T: TransactionBackend + 'static
{
    /// Creates a new [TransactionDatabase] linked to the provided backend.
    pub fn new(db: T) -> Self {
        Self { db: Arc::new(db) }
    }

    pub fn save(&self, transaction: EncryptedTransaction) -> Result<(), TransactionStorageError> {
        self.db.save(transaction)
    }

    pub fn delete(&self, hash: &MessageHash) -> Result<(), TransactionStorageError> {
        self.db.delete(hash)
    }

    pub fn retrieve_by_hash(&self, hash: &MessageHash) -> Result<Option<EncryptedTransaction>, TransactionStorageError> {
        self.db.retrieve_by_hash(hash)
    }

    pub fn find_by_hashes(&self, hashes: &[MessageHash]) -> Result<Vec<EncryptedTransaction>, TransactionStorageError> {
        self.db.find_by_hashes(hashes)
    }

    pub fn retrieve_transactions(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<EncryptedTransaction>, TransactionStorageError> {
        self.db.retrieve_transactions(offset, limit)
    }

    pub fn transaction_count(&self) -> Result<u64, TransactionStorageError> {
        self.db.transaction_count()
    }
}

/// This structure holds an inner type that implements the `RawTransactionBackend` trait.
#[derive(Clone)]
pub struct RawTransactionDatabase<T> {
    db: Arc<T>,
}

impl<T> RawTransactionDatabase<T>
where T: RawTransactionBackend + 'static
{
    pub fn new(db: T) -> Self {
        Self { db: Arc::new(db) }
    }

    pub fn save(&self, transaction: EncryptedRawTransaction) -> Result<(), TransactionStorageError> {
        self.db.save(transaction)
    }

    pub fn retrieve_by_hash(
        &self,
        hash: &MessageHash,
    ) -> Result<Option<EncryptedRawTransaction>, TransactionStorageError> {
        self.db.retrieve_by_hash(hash)
    }
}
