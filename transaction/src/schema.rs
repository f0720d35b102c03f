// Copyright 2023 The Veil Project
// SPDX-License-Identifier: BSD-3-Clause

diesel::table! {
    encrypted_transactions (hash) {
        hash -> Binary,
        payload -> Binary,
    }
}

diesel::table! {
    encrypted_raw_transactions (hash) {
        hash -> Binary,
        encrypted_payload -> Binary,
        encrypted_key -> Binary,
        nonce -> Binary,
        sender -> Binary,
    }
}
