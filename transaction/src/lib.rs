// Copyright 2023 The Veil Project
// SPDX-License-Identifier: BSD-3-Clause

// The manager takes its full collaborator set at construction; historically this warning has led
// to bundling dependencies into a resources struct, which is then overused and is the wrong
// abstraction
#![allow(clippy::too_many_arguments)]

pub mod schema;
pub mod test_utils;
pub mod transaction_service;

pub use transaction_service::service::TransactionManager;
