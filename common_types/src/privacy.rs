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

use serde::{Deserialize, Serialize};

use crate::types::CommonTypeError;

/// The privacy policy a transaction was encrypted under. The mode is fixed at encryption time and
/// travels with the payload as a one-byte wire flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrivacyMode {
    /// Peer-to-peer encryption with no cross-transaction invariants.
    StandardPrivate,
    /// Private state validation: the recipient set must equal that of every affected contract
    /// transaction, and a non-empty execution hash is required.
    PrivateStateValidation,
}

impl PrivacyMode {
    pub fn flag(&self) -> u8 {
        match self {
            PrivacyMode::StandardPrivate => 0,
            PrivacyMode::PrivateStateValidation => 3,
        }
    }

    pub fn from_flag(flag: u8) -> Result<Self, CommonTypeError> {
        match flag {
            0 => Ok(PrivacyMode::StandardPrivate),
            3 => Ok(PrivacyMode::PrivateStateValidation),
            other => Err(CommonTypeError::InvalidPrivacyFlag(other)),
        }
    }
}

#[allow(clippy::derivable_impls)]
impl Default for PrivacyMode {
    fn default() -> Self {
        PrivacyMode::StandardPrivate
    }
}

impl fmt::Display for PrivacyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivacyMode::StandardPrivate => f.write_str("STANDARD_PRIVATE"),
            PrivacyMode::PrivateStateValidation => f.write_str("PRIVATE_STATE_VALIDATION"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flag_round_trip() {
        for mode in [PrivacyMode::StandardPrivate, PrivacyMode::PrivateStateValidation] {
            assert_eq!(PrivacyMode::from_flag(mode.flag()).unwrap(), mode);
        }
    }

    #[test]
    fn unknown_flag_is_rejected() {
        for flag in [1u8, 2, 4, 255] {
            assert!(PrivacyMode::from_flag(flag).is_err());
        }
    }
}
