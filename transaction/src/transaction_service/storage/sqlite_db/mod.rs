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

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use diesel::{prelude::*, SqliteConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use veil_common_types::{MessageHash, Nonce, PublicKey};

use crate::{
    schema::{encrypted_raw_transactions, encrypted_transactions},
    transaction_service::{
        error::TransactionStorageError,
        storage::{
            database::{RawTransactionBackend, TransactionBackend},
            models::{EncryptedRawTransaction, EncryptedTransaction},
        },
    },
};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

/// Creates the sqlite database at `db_path` if needed, runs any pending migrations and returns
/// the shared connection.
pub fn run_migration_and_create_sqlite_connection<P: AsRef<Path>>(
    db_path: P,
) -> Result<Arc<Mutex<SqliteConnection>>, TransactionStorageError> {
    let path_str = db_path
        .as_ref()
        .to_str()
        .ok_or_else(|| TransactionStorageError::DatabaseMigrationError("Database path is not valid unicode".to_string()))?;
    let mut connection = SqliteConnection::establish(path_str)?;
    connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| TransactionStorageError::DatabaseMigrationError(format!("Database migration failed: {}", err)))?;
    Ok(Arc::new(Mutex::new(connection)))
}

/// Sqlite backend for both the encrypted and the raw transaction stores, sharing one connection.
#[derive(Clone)]
pub struct TransactionServiceSqliteDatabase {
    connection: Arc<Mutex<SqliteConnection>>,
}

impl TransactionServiceSqliteDatabase {
    pub fn new(connection: Arc<Mutex<SqliteConnection>>) -> Self {
        Self { connection }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteConnection>, TransactionStorageError> {
        self.connection.lock().map_err(|_| TransactionStorageError::PoisonedAccess)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Queryable, Insertable)]
#[diesel(table_name = encrypted_transactions)]
struct EncryptedTransactionSql {
    hash: Vec<u8>,
    payload: Vec<u8>,
}

impl From<EncryptedTransaction> for EncryptedTransactionSql {
    fn from(transaction: EncryptedTransaction) -> Self {
        Self {
            hash: transaction.hash.as_bytes().to_vec(),
            payload: transaction.payload,
        }
    }
}

impl From<EncryptedTransactionSql> for EncryptedTransaction {
    fn from(transaction: EncryptedTransactionSql) -> Self {
        EncryptedTransaction::new(MessageHash::from_bytes(&transaction.hash), transaction.payload)
    }
}

#[derive(Clone, Debug, Queryable, Insertable)]
#[diesel(table_name = encrypted_raw_transactions)]
struct EncryptedRawTransactionSql {
    hash: Vec<u8>,
    encrypted_payload: Vec<u8>,
    encrypted_key: Vec<u8>,
    nonce: Vec<u8>,
    sender: Vec<u8>,
}

impl From<EncryptedRawTransaction> for EncryptedRawTransactionSql {
    fn from(transaction: EncryptedRawTransaction) -> Self {
        Self {
            hash: transaction.hash.as_bytes().to_vec(),
            encrypted_payload: transaction.encrypted_payload,
            encrypted_key: transaction.encrypted_key,
            nonce: transaction.nonce.as_bytes().to_vec(),
            sender: transaction.sender.as_bytes().to_vec(),
        }
    }
}

impl TryFrom<EncryptedRawTransactionSql> for EncryptedRawTransaction {
    type Error = TransactionStorageError;

    fn try_from(transaction: EncryptedRawTransactionSql) -> Result<Self, Self::Error> {
        let sender = PublicKey::from_bytes(&transaction.sender)
            .map_err(|err| TransactionStorageError::UnexpectedResult(format!("Corrupt sender column: {}", err)))?;
        Ok(EncryptedRawTransaction {
            hash: MessageHash::from_bytes(&transaction.hash),
            encrypted_payload: transaction.encrypted_payload,
            encrypted_key: transaction.encrypted_key,
            nonce: Nonce::from_bytes(&transaction.nonce),
            sender,
        })
    }
}

impl TransactionBackend for TransactionServiceSqliteDatabase {
    fn save(&self, transaction: EncryptedTransaction) -> Result<(), TransactionStorageError> {
        let mut conn = self.lock()?;
        diesel::replace_into(encrypted_transactions::table)
            .values(EncryptedTransactionSql::from(transaction))
            .execute(&mut *conn)?;
        Ok(())
    }

    fn delete(&self, hash: &MessageHash) -> Result<(), TransactionStorageError> {
        let mut conn = self.lock()?;
        diesel::delete(encrypted_transactions::table.filter(encrypted_transactions::hash.eq(hash.as_bytes())))
            .execute(&mut *conn)?;
        Ok(())
    }

    fn retrieve_by_hash(&self, hash: &MessageHash) -> Result<Option<EncryptedTransaction>, TransactionStorageError> {
        let mut conn = self.lock()?;
        Ok(encrypted_transactions::table
            .filter(encrypted_transactions::hash.eq(hash.as_bytes()))
            .first::<EncryptedTransactionSql>(&mut *conn)
            .optional()?
            .map(Into::into))
    }

    fn find_by_hashes(&self, hashes: &[MessageHash]) -> Result<Vec<EncryptedTransaction>, TransactionStorageError> {
        let mut conn = self.lock()?;
        let requested: Vec<&[u8]> = hashes.iter().map(|hash| hash.as_bytes()).collect();
        Ok(encrypted_transactions::table
            .filter(encrypted_transactions::hash.eq_any(requested))
            .load::<EncryptedTransactionSql>(&mut *conn)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    #[allow(clippy::cast_possible_wrap)]
    fn retrieve_transactions(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<EncryptedTransaction>, TransactionStorageError> {
        let mut conn = self.lock()?;
        Ok(encrypted_transactions::table
            .order(encrypted_transactions::hash.asc())
            .offset(offset as i64)
            .limit(limit as i64)
            .load::<EncryptedTransactionSql>(&mut *conn)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    #[allow(clippy::cast_sign_loss)]
    fn transaction_count(&self) -> Result<u64, TransactionStorageError> {
        let mut conn = self.lock()?;
        let count: i64 = encrypted_transactions::table.count().get_result(&mut *conn)?;
        Ok(count as u64)
    }
}

impl RawTransactionBackend for TransactionServiceSqliteDatabase {
    fn save(&self, transaction: EncryptedRawTransaction) -> Result<(), TransactionStorageError> {
        let mut conn = self.lock()?;
        diesel::replace_into(encrypted_raw_transactions::table)
            .values(EncryptedRawTransactionSql::from(transaction))
            .execute(&mut *conn)?;
        Ok(())
    }

    fn retrieve_by_hash(
        &self,
        hash: &MessageHash,
    ) -> Result<Option<EncryptedRawTransaction>, TransactionStorageError> {
        let mut conn = self.lock()?;
        encrypted_raw_transactions::table
            .filter(encrypted_raw_transactions::hash.eq(hash.as_bytes()))
            .first::<EncryptedRawTransactionSql>(&mut *conn)
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }
}

#[cfg(test)]
mod test {
    use tempfile::tempdir;

    use super::*;

    fn setup() -> (tempfile::TempDir, TransactionServiceSqliteDatabase) {
        let dir = tempdir().unwrap();
        let connection = run_migration_and_create_sqlite_connection(dir.path().join("transactions.sqlite")).unwrap();
        (dir, TransactionServiceSqliteDatabase::new(connection))
    }

    fn transaction(label: &[u8]) -> EncryptedTransaction {
        EncryptedTransaction::new(MessageHash::from_bytes(label), label.to_vec())
    }

    #[test]
    fn save_retrieve_and_overwrite() {
        let (_dir, db) = setup();
        let hash = MessageHash::from_bytes(b"t1");
        TransactionBackend::save(&db, EncryptedTransaction::new(hash.clone(), b"one".to_vec())).unwrap();
        TransactionBackend::save(&db, EncryptedTransaction::new(hash.clone(), b"two".to_vec())).unwrap();

        let stored = TransactionBackend::retrieve_by_hash(&db, &hash).unwrap().unwrap();
        assert_eq!(stored.payload, b"two");
        assert_eq!(db.transaction_count().unwrap(), 1);
    }

    #[test]
    fn find_by_hashes_returns_only_present() {
        let (_dir, db) = setup();
        for label in [&b"t1"[..], &b"t2"[..]] {
            TransactionBackend::save(&db, transaction(label)).unwrap();
        }
        let found = db
            .find_by_hashes(&[MessageHash::from_bytes(b"t2"), MessageHash::from_bytes(b"missing")])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].hash, MessageHash::from_bytes(b"t2"));
    }

    #[test]
    fn paging_covers_the_whole_store() {
        let (_dir, db) = setup();
        for i in 0u8..5 {
            TransactionBackend::save(&db, transaction(&[i])).unwrap();
        }
        let mut seen = Vec::new();
        let mut offset = 0;
        while offset < db.transaction_count().unwrap() {
            let page = db.retrieve_transactions(offset, 2).unwrap();
            seen.extend(page.into_iter().map(|t| t.hash));
            offset += 2;
        }
        assert_eq!(seen.len(), 5);
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, db) = setup();
        let hash = MessageHash::from_bytes(b"t1");
        TransactionBackend::save(&db, transaction(b"t1")).unwrap();
        TransactionBackend::delete(&db, &hash).unwrap();
        TransactionBackend::delete(&db, &hash).unwrap();
        assert!(TransactionBackend::retrieve_by_hash(&db, &hash).unwrap().is_none());
    }

    #[test]
    fn raw_transactions_round_trip() {
        let (_dir, db) = setup();
        let record = EncryptedRawTransaction {
            hash: MessageHash::from_bytes(b"raw"),
            encrypted_payload: b"payload".to_vec(),
            encrypted_key: b"key".to_vec(),
            nonce: Nonce::from_bytes(b"nonce"),
            sender: PublicKey::from_bytes(&[7u8; 32]).unwrap(),
        };
        RawTransactionBackend::save(&db, record.clone()).unwrap();
        let stored = RawTransactionBackend::retrieve_by_hash(&db, &record.hash).unwrap().unwrap();
        assert_eq!(stored, record);
    }
}
