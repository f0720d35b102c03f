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

use veil_common_types::{codec, AffectedTransaction, EncodedPayload, MessageHash, PrivacyMode, PublicKey, SecurityHash};
use veil_enclave::{mock::MockEnclave, Enclave};
use veil_transaction::{
    test_utils::{test_key, MockPublisher},
    transaction_service::{
        config::TransactionServiceConfig,
        error::TransactionServiceError,
        resend::ResendRequest,
        service::{ReceiveRequest, SendRequest, SendSignedRequest, TransactionManager},
        storage::{
            database::{RawTransactionDatabase, TransactionBackend, TransactionDatabase},
            memory_db::{RawTransactionMemoryDatabase, TransactionMemoryDatabase},
        },
    },
};

type TestManager = TransactionManager<TransactionMemoryDatabase, RawTransactionMemoryDatabase, MockEnclave, MockPublisher>;

struct TestNode {
    manager: TestManager,
    backend: TransactionMemoryDatabase,
    publisher: MockPublisher,
}

fn setup(enclave: MockEnclave) -> TestNode {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = TransactionMemoryDatabase::new();
    let raw_backend = RawTransactionMemoryDatabase::new();
    let publisher = MockPublisher::new();
    let manager = TransactionManager::new(
        // A small page size so bulk resends actually page.
        TransactionServiceConfig { resend_fetch_size: 2 },
        TransactionDatabase::new(backend.clone()),
        RawTransactionDatabase::new(raw_backend.clone()),
        Arc::new(enclave),
        Arc::new(publisher.clone()),
    );
    TestNode {
        manager,
        backend,
        publisher,
    }
}

fn send_request(sender: PublicKey, recipients: Vec<PublicKey>, payload: &[u8]) -> SendRequest {
    SendRequest {
        payload: payload.to_vec(),
        sender: Some(sender),
        recipients,
        privacy_mode: PrivacyMode::StandardPrivate,
        exec_hash: Vec::new(),
        affected_contract_transactions: Vec::new(),
    }
}

fn psv_request(sender: PublicKey, recipients: Vec<PublicKey>, payload: &[u8], affected: Vec<String>) -> SendRequest {
    SendRequest {
        privacy_mode: PrivacyMode::PrivateStateValidation,
        exec_hash: b"exec".to_vec(),
        affected_contract_transactions: affected,
        ..send_request(sender, recipients, payload)
    }
}

fn stored_payload(node: &TestNode, hash: &MessageHash) -> EncodedPayload {
    let stored = node.backend.retrieve_by_hash(hash).unwrap().unwrap();
    codec::decode(&stored.payload).unwrap()
}

/// The stored record of `hash` on `node`, resolved as an affected transaction for building
/// payloads that reference it.
fn affected_from_store(node: &TestNode, hash: &MessageHash) -> AffectedTransaction {
    AffectedTransaction {
        hash: hash.clone(),
        payload: stored_payload(node, hash),
    }
}

#[test]
fn send_publishes_projection_to_remote_recipient() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));

    let response = node.manager.send(send_request(a, vec![b], b"hello")).unwrap();

    assert_eq!(node.backend.transaction_count().unwrap(), 1);
    let hash = MessageHash::from_base64(&response.transaction_hash).unwrap();
    let payload = stored_payload(&node, &hash);
    assert_eq!(hash, MessageHash::from_cipher_text(&payload.cipher_text));

    let published = node.publisher.published();
    assert_eq!(published.len(), 1);
    let (recipient, projection) = &published[0];
    assert_eq!(recipient, &b);
    assert_eq!(projection.recipient_keys, vec![b]);
    assert_eq!(projection.recipient_boxes.len(), 1);

    // The projection decrypts on the recipient's node to the original plaintext.
    let enclave_b = MockEnclave::with_single_key(b);
    assert_eq!(enclave_b.unencrypt_transaction(projection, &b).unwrap(), b"hello");
}

#[test]
fn forwarding_keys_are_implicit_recipients() {
    let (a, b, c) = (test_key(1), test_key(2), test_key(3));
    let node = setup(MockEnclave::new(a, vec![a], vec![c]));

    let response = node.manager.send(send_request(a, vec![b], b"x")).unwrap();

    let hash = MessageHash::from_base64(&response.transaction_hash).unwrap();
    let payload = stored_payload(&node, &hash);
    assert_eq!(payload.recipient_keys, vec![b, a, c]);

    let mut published: Vec<PublicKey> = node.publisher.published().into_iter().map(|(key, _)| key).collect();
    published.sort();
    let mut expected = vec![b, c];
    expected.sort();
    assert_eq!(published, expected);
}

#[test]
fn sender_duplicated_in_recipients_is_not_boxed_twice() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));

    let response = node.manager.send(send_request(a, vec![b, a, b], b"x")).unwrap();

    let hash = MessageHash::from_base64(&response.transaction_hash).unwrap();
    let payload = stored_payload(&node, &hash);
    assert_eq!(payload.recipient_keys, vec![b, a]);
    assert_eq!(payload.recipient_boxes.len(), 2);
}

#[test]
fn publish_failure_does_not_roll_back_persistence() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));
    node.publisher.fail_for(b);

    let response = node.manager.send(send_request(a, vec![b], b"hello")).unwrap();

    let hash = MessageHash::from_base64(&response.transaction_hash).unwrap();
    assert!(node.backend.retrieve_by_hash(&hash).unwrap().is_some());
    assert!(node.publisher.published().is_empty());
}

#[test]
fn psv_send_with_matching_recipients_succeeds() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));

    let t1 = node.manager.send(psv_request(a, vec![b], b"prior", Vec::new())).unwrap();
    node.publisher.clear();

    node.manager
        .send(psv_request(a, vec![b], b"next", vec![t1.transaction_hash.clone()]))
        .unwrap();

    assert_eq!(node.backend.transaction_count().unwrap(), 2);
    assert_eq!(node.publisher.published_to(&b).len(), 1);
}

#[test]
fn psv_send_with_mismatched_recipients_fails() {
    let (a, b, c) = (test_key(1), test_key(2), test_key(3));
    let node = setup(MockEnclave::with_single_key(a));

    let t1 = node.manager.send(psv_request(a, vec![b], b"prior", Vec::new())).unwrap();
    node.publisher.clear();

    let err = node
        .manager
        .send(psv_request(a, vec![b, c], b"next", vec![t1.transaction_hash.clone()]))
        .unwrap_err();

    match err {
        TransactionServiceError::PrivacyViolation(message) => {
            assert!(message.contains(&t1.transaction_hash), "{}", message)
        },
        other => panic!("expected privacy violation, got {}", other),
    }
    assert_eq!(node.backend.transaction_count().unwrap(), 1);
    assert!(node.publisher.published().is_empty());
}

#[test]
fn affected_mode_mismatch_on_send_fails() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));

    let t1 = node.manager.send(send_request(a, vec![b], b"standard prior")).unwrap();

    let err = node
        .manager
        .send(psv_request(a, vec![b], b"next", vec![t1.transaction_hash.clone()]))
        .unwrap_err();

    assert!(matches!(err, TransactionServiceError::PrivacyViolation(_)));
}

#[test]
fn unresolvable_affected_hash_on_send_fails() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));

    let unknown = MessageHash::from_cipher_text(b"never stored").to_base64();
    let err = node
        .manager
        .send(psv_request(a, vec![b], b"next", vec![unknown.clone()]))
        .unwrap_err();

    match err {
        TransactionServiceError::PrivacyViolation(message) => {
            assert!(message.contains("Unable to find affectedContractTransaction"), "{}", message);
            assert!(message.contains(&unknown), "{}", message);
        },
        other => panic!("expected privacy violation, got {}", other),
    }
}

#[test]
fn store_payload_persists_and_is_idempotent() {
    let (a, b) = (test_key(1), test_key(2));
    let node_a = setup(MockEnclave::with_single_key(a));
    node_a.manager.send(send_request(a, vec![b], b"hello")).unwrap();
    let projection = node_a.publisher.published_to(&b).remove(0);

    let node_b = setup(MockEnclave::with_single_key(b));
    let encoded = codec::encode(&projection);
    let first = node_b.manager.store_payload(&encoded).unwrap();
    let second = node_b.manager.store_payload(&encoded).unwrap();

    assert_eq!(first, second);
    assert_eq!(node_b.backend.transaction_count().unwrap(), 1);
    assert_eq!(node_b.backend.retrieve_by_hash(&first).unwrap().unwrap().payload, encoded);

    let received = node_b
        .manager
        .receive(ReceiveRequest {
            hash: first,
            recipient: None,
            raw: false,
        })
        .unwrap();
    assert_eq!(received.payload, b"hello");
    assert_eq!(received.privacy_flag, PrivacyMode::StandardPrivate.flag());
}

#[test]
fn store_payload_of_own_transaction_does_not_persist_again() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));
    let response = node.manager.send(send_request(a, vec![b], b"hello")).unwrap();
    let hash = MessageHash::from_base64(&response.transaction_hash).unwrap();
    let before = node.backend.retrieve_by_hash(&hash).unwrap().unwrap();

    let projection = node.publisher.published_to(&b).remove(0);
    let returned = node.manager.store_payload(&codec::encode(&projection)).unwrap();

    assert_eq!(returned, hash);
    assert_eq!(node.backend.transaction_count().unwrap(), 1);
    assert_eq!(node.backend.retrieve_by_hash(&hash).unwrap().unwrap(), before);
}

#[test]
fn psv_probe_with_unknown_affected_is_silently_ignored() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));
    let t1 = node.manager.send(psv_request(a, vec![b], b"prior", Vec::new())).unwrap();
    let t1_hash = MessageHash::from_base64(&t1.transaction_hash).unwrap();
    let affected = vec![affected_from_store(&node, &t1_hash)];

    let enclave_b = MockEnclave::with_single_key(b);
    let mut probe = enclave_b
        .encrypt_payload(b"probe", &b, &[b, a], PrivacyMode::PrivateStateValidation, &affected, b"exec")
        .unwrap();
    probe
        .affected_contract_transactions
        .push((MessageHash::from_cipher_text(b"unknown"), SecurityHash::from_bytes(b"s")));

    let returned = node.manager.store_payload(&codec::encode(&probe)).unwrap();

    assert_eq!(returned, MessageHash::from_cipher_text(&probe.cipher_text));
    assert_eq!(node.backend.transaction_count().unwrap(), 1);
}

#[test]
fn psv_inbound_mode_mismatch_is_silently_ignored() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));
    let t1 = node.manager.send(send_request(a, vec![b], b"standard prior")).unwrap();
    let t1_hash = MessageHash::from_base64(&t1.transaction_hash).unwrap();
    let affected = vec![affected_from_store(&node, &t1_hash)];

    // The peer forges a private state validation payload over a standard-private prior transaction.
    let enclave_b = MockEnclave::with_single_key(b);
    let forged = enclave_b
        .encrypt_payload(b"forged", &b, &[b, a], PrivacyMode::PrivateStateValidation, &affected, b"exec")
        .unwrap();

    let returned = node.manager.store_payload(&codec::encode(&forged)).unwrap();

    assert_eq!(returned, MessageHash::from_cipher_text(&forged.cipher_text));
    assert_eq!(node.backend.transaction_count().unwrap(), 1);
}

#[test]
fn psv_inbound_sender_not_participating_is_silently_ignored() {
    let (a, b, c) = (test_key(1), test_key(2), test_key(5));
    let node = setup(MockEnclave::with_single_key(a));
    let t1 = node.manager.send(psv_request(a, vec![b], b"prior", Vec::new())).unwrap();
    let t1_hash = MessageHash::from_base64(&t1.transaction_hash).unwrap();
    let affected = vec![affected_from_store(&node, &t1_hash)];

    let enclave_c = MockEnclave::with_single_key(c);
    let payload = enclave_c
        .encrypt_payload(b"intruder", &c, &[b, a], PrivacyMode::PrivateStateValidation, &affected, b"exec")
        .unwrap();

    node.manager.store_payload(&codec::encode(&payload)).unwrap();
    assert_eq!(node.backend.transaction_count().unwrap(), 1);
}

#[test]
fn psv_inbound_recipient_mismatch_raises() {
    let (a, b, c) = (test_key(1), test_key(2), test_key(3));
    let node = setup(MockEnclave::with_single_key(a));
    let t1 = node.manager.send(psv_request(a, vec![b], b"prior", Vec::new())).unwrap();
    let t1_hash = MessageHash::from_base64(&t1.transaction_hash).unwrap();
    let affected = vec![affected_from_store(&node, &t1_hash)];

    let enclave_b = MockEnclave::with_single_key(b);
    let payload = enclave_b
        .encrypt_payload(b"next", &b, &[b, a, c], PrivacyMode::PrivateStateValidation, &affected, b"exec")
        .unwrap();

    let err = node.manager.store_payload(&codec::encode(&payload)).unwrap_err();
    assert!(matches!(err, TransactionServiceError::PrivacyViolation(_)));
    assert_eq!(node.backend.transaction_count().unwrap(), 1);
}

#[test]
fn psv_inbound_with_valid_references_is_stored() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));
    let t1 = node.manager.send(psv_request(a, vec![b], b"prior", Vec::new())).unwrap();
    let t1_hash = MessageHash::from_base64(&t1.transaction_hash).unwrap();
    let affected = vec![affected_from_store(&node, &t1_hash)];

    let enclave_b = MockEnclave::with_single_key(b);
    let payload = enclave_b
        .encrypt_payload(b"next", &b, &[b, a], PrivacyMode::PrivateStateValidation, &affected, b"exec")
        .unwrap();

    let hash = node.manager.store_payload(&codec::encode(&payload)).unwrap();
    assert_eq!(node.backend.transaction_count().unwrap(), 2);
    assert_eq!(stored_payload(&node, &hash).affected_hashes(), vec![t1_hash]);
}

#[test]
fn psv_inbound_with_no_affected_is_stored() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));

    // The first private state validation transaction in a network references nothing.
    let enclave_b = MockEnclave::with_single_key(b);
    let payload = enclave_b
        .encrypt_payload(b"first", &b, &[b, a], PrivacyMode::PrivateStateValidation, &[], b"exec")
        .unwrap();

    let hash = node.manager.store_payload(&codec::encode(&payload)).unwrap();

    assert_eq!(node.backend.transaction_count().unwrap(), 1);
    assert_eq!(hash, MessageHash::from_cipher_text(&payload.cipher_text));
    assert!(node.backend.retrieve_by_hash(&hash).unwrap().is_some());
}

#[test]
fn psv_inbound_invalid_security_hash_raises() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));
    let t1 = node.manager.send(psv_request(a, vec![b], b"prior", Vec::new())).unwrap();
    let t1_hash = MessageHash::from_base64(&t1.transaction_hash).unwrap();
    let affected = vec![affected_from_store(&node, &t1_hash)];

    let enclave_b = MockEnclave::with_single_key(b);
    let mut payload = enclave_b
        .encrypt_payload(b"next", &b, &[b, a], PrivacyMode::PrivateStateValidation, &affected, b"exec")
        .unwrap();
    payload.affected_contract_transactions[0].1 = SecurityHash::from_bytes(b"forged");

    let err = node.manager.store_payload(&codec::encode(&payload)).unwrap_err();
    assert!(matches!(err, TransactionServiceError::PrivacyViolation(_)));
    assert_eq!(node.backend.transaction_count().unwrap(), 1);
}

#[test]
fn standard_inbound_invalid_security_hash_is_sanitized() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));
    let t1 = node.manager.send(send_request(a, vec![b], b"prior")).unwrap();
    let t1_hash = MessageHash::from_base64(&t1.transaction_hash).unwrap();
    let affected = vec![affected_from_store(&node, &t1_hash)];

    let enclave_b = MockEnclave::with_single_key(b);
    let mut payload = enclave_b
        .encrypt_payload(b"next", &b, &[b, a], PrivacyMode::StandardPrivate, &affected, b"")
        .unwrap();
    payload.affected_contract_transactions[0].1 = SecurityHash::from_bytes(b"forged");

    let hash = node.manager.store_payload(&codec::encode(&payload)).unwrap();

    let stored = stored_payload(&node, &hash);
    assert!(stored.affected_contract_transactions.is_empty());
    assert_eq!(stored.cipher_text, payload.cipher_text);
}

#[test]
fn receive_without_recipient_searches_local_keys() {
    let (a, b) = (test_key(1), test_key(2));
    let node_a = setup(MockEnclave::with_single_key(a));
    node_a.manager.send(send_request(a, vec![b], b"hello")).unwrap();
    let projection = node_a.publisher.published_to(&b).remove(0);

    // A node holding an unrelated key cannot decrypt.
    let node_z = setup(MockEnclave::with_single_key(test_key(9)));
    let hash = node_z.manager.store_payload(&codec::encode(&projection)).unwrap();
    let err = node_z
        .manager
        .receive(ReceiveRequest {
            hash: hash.clone(),
            recipient: None,
            raw: false,
        })
        .unwrap_err();
    assert!(matches!(err, TransactionServiceError::RecipientKeyNotFound));

    // The addressed node finds its key by trial decryption.
    let node_b = setup(MockEnclave::with_single_key(b));
    let hash = node_b.manager.store_payload(&codec::encode(&projection)).unwrap();
    let received = node_b
        .manager
        .receive(ReceiveRequest {
            hash,
            recipient: None,
            raw: false,
        })
        .unwrap();
    assert_eq!(received.payload, b"hello");
}

#[test]
fn receive_unknown_hash_fails() {
    let node = setup(MockEnclave::with_single_key(test_key(1)));
    let err = node
        .manager
        .receive(ReceiveRequest {
            hash: MessageHash::from_cipher_text(b"missing"),
            recipient: None,
            raw: false,
        })
        .unwrap_err();
    assert!(matches!(err, TransactionServiceError::TransactionNotFound(_)));
}

#[test]
fn psv_metadata_is_surfaced_by_receive() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));
    let t1 = node.manager.send(psv_request(a, vec![b], b"prior", Vec::new())).unwrap();
    let next = node
        .manager
        .send(psv_request(a, vec![b], b"next", vec![t1.transaction_hash.clone()]))
        .unwrap();

    let received = node
        .manager
        .receive(ReceiveRequest {
            hash: MessageHash::from_base64(&next.transaction_hash).unwrap(),
            recipient: Some(a),
            raw: false,
        })
        .unwrap();

    assert_eq!(received.payload, b"next");
    assert_eq!(received.privacy_flag, PrivacyMode::PrivateStateValidation.flag());
    assert_eq!(received.affected_contract_transactions, vec![t1.transaction_hash]);
    assert_eq!(received.exec_hash, "exec");
}

#[test]
fn store_raw_then_send_signed_keeps_the_hash() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));

    let hash = node.manager.store_raw(b"signed payload".to_vec(), Some(a)).unwrap();

    let raw_received = node
        .manager
        .receive(ReceiveRequest {
            hash: hash.clone(),
            recipient: None,
            raw: true,
        })
        .unwrap();
    assert_eq!(raw_received.payload, b"signed payload");
    assert_eq!(raw_received.privacy_flag, PrivacyMode::StandardPrivate.flag());
    assert!(raw_received.affected_contract_transactions.is_empty());
    assert_eq!(raw_received.exec_hash, "");

    let response = node
        .manager
        .send_signed_transaction(SendSignedRequest {
            hash: hash.clone(),
            recipients: vec![b],
            privacy_mode: PrivacyMode::StandardPrivate,
            exec_hash: Vec::new(),
            affected_contract_transactions: Vec::new(),
        })
        .unwrap();
    assert_eq!(response.transaction_hash, hash.to_base64());

    let projection = node.publisher.published_to(&b).remove(0);
    let enclave_b = MockEnclave::with_single_key(b);
    assert_eq!(
        enclave_b.unencrypt_transaction(&projection, &b).unwrap(),
        b"signed payload"
    );
}

#[test]
fn send_signed_with_unknown_raw_hash_fails() {
    let node = setup(MockEnclave::with_single_key(test_key(1)));
    let err = node
        .manager
        .send_signed_transaction(SendSignedRequest {
            hash: MessageHash::from_cipher_text(b"missing"),
            recipients: vec![test_key(2)],
            privacy_mode: PrivacyMode::StandardPrivate,
            exec_hash: Vec::new(),
            affected_contract_transactions: Vec::new(),
        })
        .unwrap_err();
    assert!(matches!(err, TransactionServiceError::TransactionNotFound(_)));
}

#[test]
fn resend_all_republishes_projections() {
    let (a, b, c) = (test_key(1), test_key(2), test_key(3));
    let node = setup(MockEnclave::with_single_key(a));
    for i in 0..3u8 {
        node.manager.send(send_request(a, vec![b], &[b"to b"[..].to_vec(), vec![i]].concat())).unwrap();
    }
    for i in 0..2u8 {
        node.manager.send(send_request(a, vec![c], &[b"to c"[..].to_vec(), vec![i]].concat())).unwrap();
    }
    node.publisher.clear();

    node.manager.resend(ResendRequest::All { public_key: b }).unwrap();

    let published = node.publisher.published();
    assert_eq!(published.len(), 3);
    for (recipient, projection) in &published {
        assert_eq!(recipient, &b);
        assert_eq!(projection.recipient_keys, vec![b]);
        assert_eq!(projection.recipient_boxes.len(), 1);
    }

    // A resend to a locally managed key publishes nothing.
    node.publisher.clear();
    node.manager.resend(ResendRequest::All { public_key: a }).unwrap();
    assert!(node.publisher.published().is_empty());
}

#[test]
fn resend_all_survives_publish_failures() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));
    node.manager.send(send_request(a, vec![b], b"one")).unwrap();
    node.manager.send(send_request(a, vec![b], b"two")).unwrap();
    node.publisher.clear();
    node.publisher.fail_for(b);

    node.manager.resend(ResendRequest::All { public_key: b }).unwrap();
    assert!(node.publisher.published().is_empty());
}

#[test]
fn resend_all_relabels_unlabelled_sender_records() {
    let (a, b) = (test_key(1), test_key(2));
    let node_a = setup(MockEnclave::with_single_key(a));
    node_a.manager.send(send_request(a, vec![b], b"hello")).unwrap();
    let mut projection = node_a.publisher.published_to(&b).remove(0);

    // The recipient node stored the payload without its key labels.
    projection.recipient_keys.clear();
    let node_b = setup(MockEnclave::with_single_key(b));
    let hash = node_b.manager.store_payload(&codec::encode(&projection)).unwrap();
    node_b.publisher.clear();

    node_b.manager.resend(ResendRequest::All { public_key: a }).unwrap();

    let restored = node_b.publisher.published_to(&a).remove(0);
    assert_eq!(restored.recipient_keys, vec![b]);
    assert_eq!(MessageHash::from_cipher_text(&restored.cipher_text), hash);
}

#[test]
fn resend_all_skips_records_no_local_key_can_relabel() {
    let (a, b, z) = (test_key(1), test_key(2), test_key(9));
    let node_a = setup(MockEnclave::with_single_key(a));
    node_a.manager.send(send_request(a, vec![b], b"hello")).unwrap();
    let mut projection = node_a.publisher.published_to(&b).remove(0);
    projection.recipient_keys.clear();

    // A node holding only an unrelated key cannot discover its recipient label.
    let node_z = setup(MockEnclave::with_single_key(z));
    node_z.manager.store_payload(&codec::encode(&projection)).unwrap();
    node_z.publisher.clear();

    node_z.manager.resend(ResendRequest::All { public_key: a }).unwrap();
    assert!(node_z.publisher.published().is_empty());
}

#[test]
fn resend_individual_returns_projection_without_publishing() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));
    let response = node.manager.send(send_request(a, vec![b], b"hello")).unwrap();
    let hash = MessageHash::from_base64(&response.transaction_hash).unwrap();
    node.publisher.clear();

    let resend = node
        .manager
        .resend(ResendRequest::Individual {
            public_key: b,
            transaction_hash: hash.clone(),
        })
        .unwrap();

    let projection = codec::decode(&resend.payload.unwrap()).unwrap();
    assert_eq!(projection.recipient_keys, vec![b]);
    assert!(node.publisher.published().is_empty());

    let err = node
        .manager
        .resend(ResendRequest::Individual {
            public_key: b,
            transaction_hash: MessageHash::from_cipher_text(b"missing"),
        })
        .unwrap_err();
    assert!(matches!(err, TransactionServiceError::TransactionNotFound(_)));
}

#[test]
fn resend_individual_to_the_sender_returns_the_full_payload() {
    let (a, b) = (test_key(1), test_key(2));
    let node_a = setup(MockEnclave::with_single_key(a));
    node_a.manager.send(send_request(a, vec![b], b"hello")).unwrap();
    let projection = node_a.publisher.published_to(&b).remove(0);

    let node_b = setup(MockEnclave::with_single_key(b));
    let hash = node_b.manager.store_payload(&codec::encode(&projection)).unwrap();

    let resend = node_b
        .manager
        .resend(ResendRequest::Individual {
            public_key: a,
            transaction_hash: hash,
        })
        .unwrap();

    let payload = codec::decode(&resend.payload.unwrap()).unwrap();
    assert_eq!(payload, projection);
}

#[test]
fn is_sender_and_participants() {
    let (a, b) = (test_key(1), test_key(2));
    let node_a = setup(MockEnclave::with_single_key(a));
    let response = node_a.manager.send(send_request(a, vec![b], b"hello")).unwrap();
    let hash = MessageHash::from_base64(&response.transaction_hash).unwrap();

    assert!(node_a.manager.is_sender(&hash).unwrap());
    assert_eq!(node_a.manager.get_participants(&hash).unwrap(), vec![b, a]);

    let projection = node_a.publisher.published_to(&b).remove(0);
    let node_b = setup(MockEnclave::with_single_key(b));
    let hash_b = node_b.manager.store_payload(&codec::encode(&projection)).unwrap();
    assert!(!node_b.manager.is_sender(&hash_b).unwrap());
    assert_eq!(node_b.manager.get_participants(&hash_b).unwrap(), vec![b]);
}

#[test]
fn delete_removes_the_record_and_is_idempotent() {
    let (a, b) = (test_key(1), test_key(2));
    let node = setup(MockEnclave::with_single_key(a));
    let response = node.manager.send(send_request(a, vec![b], b"hello")).unwrap();
    let hash = MessageHash::from_base64(&response.transaction_hash).unwrap();

    node.manager.delete(&hash).unwrap();
    assert!(node.backend.retrieve_by_hash(&hash).unwrap().is_none());
    node.manager.delete(&hash).unwrap();
}
