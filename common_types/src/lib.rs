// Copyright 2023 The Veil Project
// SPDX-License-Identifier: BSD-3-Clause

pub mod codec;
pub mod payload;
pub mod privacy;
pub mod types;

pub use payload::{AffectedTransaction, EncodedPayload, PayloadError, RawTransaction};
pub use privacy::PrivacyMode;
pub use types::{CommonTypeError, MessageHash, Nonce, PublicKey, SecurityHash};
