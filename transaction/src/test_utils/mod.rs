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

//! Helpers for exercising the transaction service without a live transport.

use std::sync::{Arc, Mutex};

use veil_common_types::{EncodedPayload, PublicKey};

use crate::transaction_service::{error::PublishError, publisher::PayloadPublisher};

pub fn test_key(seed: u8) -> PublicKey {
    PublicKey::from_bytes(&[seed; 32]).expect("fixed length key")
}

/// Publisher that records every delivery and can be told to fail for chosen recipients.
#[derive(Clone, Default)]
pub struct MockPublisher {
    state: Arc<Mutex<MockPublisherState>>,
}

#[derive(Default)]
struct MockPublisherState {
    published: Vec<(PublicKey, EncodedPayload)>,
    failing: Vec<PublicKey>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Default::default()
    }

    /// Every delivery so far, in publish order.
    pub fn published(&self) -> Vec<(PublicKey, EncodedPayload)> {
        self.state.lock().expect("publisher state poisoned").published.clone()
    }

    pub fn published_to(&self, recipient: &PublicKey) -> Vec<EncodedPayload> {
        self.published()
            .into_iter()
            .filter(|(key, _)| key == recipient)
            .map(|(_, payload)| payload)
            .collect()
    }

    pub fn clear(&self) {
        self.state.lock().expect("publisher state poisoned").published.clear();
    }

    /// All later deliveries to `recipient` fail.
    pub fn fail_for(&self, recipient: PublicKey) {
        self.state.lock().expect("publisher state poisoned").failing.push(recipient);
    }
}

impl PayloadPublisher for MockPublisher {
    fn publish_payload(&self, payload: &EncodedPayload, recipient: &PublicKey) -> Result<(), PublishError> {
        let mut state = self.state.lock().expect("publisher state poisoned");
        if state.failing.contains(recipient) {
            return Err(PublishError::DeliveryFailed {
                recipient: *recipient,
                reason: "injected failure".to_string(),
            });
        }
        state.published.push((*recipient, payload.clone()));
        Ok(())
    }
}
