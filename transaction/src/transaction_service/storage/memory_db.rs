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

//! In-memory storage backends, iteration in insertion order. Suitable for tests and for
//! embedders that do not need persistence.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use veil_common_types::MessageHash;

use crate::transaction_service::{
    error::TransactionStorageError,
    storage::{
        database::{RawTransactionBackend, TransactionBackend},
        models::{EncryptedRawTransaction, EncryptedTransaction},
    },
};

#[derive(Clone, Default)]
pub struct TransactionMemoryDatabase {
    inner: Arc<RwLock<InnerDatabase>>,
}

#[derive(Default)]
struct InnerDatabase {
    order: Vec<MessageHash>,
    transactions: HashMap<MessageHash, EncryptedTransaction>,
}

impl TransactionMemoryDatabase {
    pub fn new() -> Self {
        Default::default()
    }
}

impl TransactionBackend for TransactionMemoryDatabase {
    fn save(&self, transaction: EncryptedTransaction) -> Result<(), TransactionStorageError> {
        let mut inner = self.inner.write().map_err(|_| TransactionStorageError::PoisonedAccess)?;
        if !inner.transactions.contains_key(&transaction.hash) {
            inner.order.push(transaction.hash.clone());
        }
        inner.transactions.insert(transaction.hash.clone(), transaction);
        Ok(())
    }

    fn delete(&self, hash: &MessageHash) -> Result<(), TransactionStorageError> {
        let mut inner = self.inner.write().map_err(|_| TransactionStorageError::PoisonedAccess)?;
        if inner.transactions.remove(hash).is_some() {
            inner.order.retain(|h| h != hash);
        }
        Ok(())
    }

    fn retrieve_by_hash(&self, hash: &MessageHash) -> Result<Option<EncryptedTransaction>, TransactionStorageError> {
        let inner = self.inner.read().map_err(|_| TransactionStorageError::PoisonedAccess)?;
        Ok(inner.transactions.get(hash).cloned())
    }

    fn find_by_hashes(&self, hashes: &[MessageHash]) -> Result<Vec<EncryptedTransaction>, TransactionStorageError> {
        let inner = self.inner.read().map_err(|_| TransactionStorageError::PoisonedAccess)?;
        Ok(inner
            .order
            .iter()
            .filter(|hash| hashes.contains(hash))
            .filter_map(|hash| inner.transactions.get(hash).cloned())
            .collect())
    }

    fn retrieve_transactions(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<EncryptedTransaction>, TransactionStorageError> {
        let inner = self.inner.read().map_err(|_| TransactionStorageError::PoisonedAccess)?;
        Ok(inner
            .order
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .filter_map(|hash| inner.transactions.get(hash).cloned())
            .collect())
    }

    fn transaction_count(&self) -> Result<u64, TransactionStorageError> {
        let inner = self.inner.read().map_err(|_| TransactionStorageError::PoisonedAccess)?;
        Ok(inner.order.len() as u64)
    }
}

#[derive(Clone, Default)]
pub struct RawTransactionMemoryDatabase {
    inner: Arc<RwLock<HashMap<MessageHash, EncryptedRawTransaction>>>,
}

impl RawTransactionMemoryDatabase {
    pub fn new() -> Self {
        Default::default()
    }
}

impl RawTransactionBackend for RawTransactionMemoryDatabase {
    fn save(&self, transaction: EncryptedRawTransaction) -> Result<(), TransactionStorageError> {
        let mut inner = self.inner.write().map_err(|_| TransactionStorageError::PoisonedAccess)?;
        inner.insert(transaction.hash.clone(), transaction);
        Ok(())
    }

    fn retrieve_by_hash(
        &self,
        hash: &MessageHash,
    ) -> Result<Option<EncryptedRawTransaction>, TransactionStorageError> {
        let inner = self.inner.read().map_err(|_| TransactionStorageError::PoisonedAccess)?;
        Ok(inner.get(hash).cloned())
    }
}
