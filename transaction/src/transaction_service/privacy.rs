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

//! Privacy-mode invariants checked against the affected contract transactions before a new
//! transaction is accepted. These are pure functions over the current recipient list and the
//! affected set resolved from the store; offenders are reported in the store's return order so
//! failures are reproducible.

use std::collections::HashSet;

use veil_common_types::{AffectedTransaction, PrivacyMode, PublicKey};

use crate::transaction_service::error::TransactionServiceError;

/// Every affected transaction must have been encrypted under the same privacy mode as the new
/// transaction, whatever that mode is.
pub fn validate_affected_modes(
    privacy_mode: PrivacyMode,
    affected: &[AffectedTransaction],
) -> Result<(), TransactionServiceError> {
    for a in affected {
        if a.payload.privacy_mode != privacy_mode {
            return Err(TransactionServiceError::PrivacyViolation(format!(
                "Privacy metadata mismatched with affected contract transaction {}",
                a.hash
            )));
        }
    }
    Ok(())
}

/// Private state validation only: the recipients of the new transaction must equal the recipients
/// of every affected transaction, as sets; order and duplicates are ignored.
pub fn validate_recipient_sets(
    recipients: &[PublicKey],
    affected: &[AffectedTransaction],
) -> Result<(), TransactionServiceError> {
    let current: HashSet<&PublicKey> = recipients.iter().collect();
    for a in affected {
        let prior: HashSet<&PublicKey> = a.payload.recipient_keys.iter().collect();
        if current != prior {
            return Err(TransactionServiceError::PrivacyViolation(format!(
                "Recipients mismatched against affected contract transaction {}",
                a.hash
            )));
        }
    }
    Ok(())
}

/// True when `sender` appears in the recipient list of at least one affected transaction.
pub fn sender_participates(sender: &PublicKey, affected: &[AffectedTransaction]) -> bool {
    affected.iter().any(|a| a.payload.recipient_keys.contains(sender))
}
