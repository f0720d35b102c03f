// Copyright 2023 The Veil Project
// SPDX-License-Identifier: BSD-3-Clause

mod enclave;
mod error;
#[cfg(feature = "test-mocks")]
pub mod mock;

pub use enclave::Enclave;
pub use error::EnclaveError;
