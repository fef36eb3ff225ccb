//! End-to-end recovery tests against real in-process storage nodes (spec
//! §4.6): exercises the HTTP copy/verify paths that unit tests stub out.

mod fake_node;

use dstore_engine::config::EngineConfig;
use dstore_engine::queue::RecoveryQueue;
use dstore_engine::recovery::run_attempt;
use dstore_engine::stats::EngineStats;
use dstore_engine::queue::{AttemptOutcome, RecoveryStrategy};
use dstore_metadata::{InMemoryMetadataStore, MetadataStore};
use dstore_nodeclient::NodeClient;
use dstore_types::{FileId, NodeId, ReplicaStatus};
use fake_node::FakeNode;
use std::time::Duration;

#[tokio::test]
async fn widen_copies_blob_onto_a_real_second_node() {
    let ms = InMemoryMetadataStore::new();
    let file_id = FileId::new();
    ms.create_file(file_id, "a.txt", 5, 2).unwrap();

    let source = FakeNode::with_blob(file_id, b"hello world".to_vec());
    let (source_addr, _source_handle) = source.spawn().await;
    ms.add_replica(file_id, NodeId::from("src"), &source_addr, ReplicaStatus::Active)
        .unwrap();
    ms.register_node(NodeId::from("src"), &source_addr).unwrap();

    let target = FakeNode::empty();
    let (target_addr, _target_handle) = target.clone().spawn().await;
    ms.register_node(NodeId::from("dst"), &target_addr).unwrap();

    let nodeclient = NodeClient::new();
    let stats = EngineStats::new();
    let queue = RecoveryQueue::new(3, 100, Duration::from_secs(300));
    queue.enqueue(file_id, "a.txt".into(), 10, RecoveryStrategy::Widen);
    let mut claimed = queue.claim_batch(10, i32::MIN, &stats);
    let mut record = claimed.pop().unwrap();

    let outcome = run_attempt(&mut record, &ms, &nodeclient, &EngineConfig::default()).await;
    assert!(matches!(outcome, AttemptOutcome::Success(_)));
    assert_eq!(target.blob(file_id), Some(b"hello world".to_vec()));

    let replicas = ms.get_replicas(file_id).unwrap();
    assert!(replicas
        .iter()
        .any(|r| r.node_id == NodeId::from("dst") && r.status == ReplicaStatus::Active));
}

#[tokio::test]
async fn rebuild_corrupted_recopies_over_the_bad_replica() {
    let ms = InMemoryMetadataStore::new();
    let file_id = FileId::new();
    ms.create_file(file_id, "a.txt", 5, 2).unwrap();

    let source = FakeNode::with_blob(file_id, b"good bytes".to_vec());
    let (source_addr, _source_handle) = source.spawn().await;
    ms.add_replica(file_id, NodeId::from("src"), &source_addr, ReplicaStatus::Active)
        .unwrap();

    let corrupted = FakeNode::with_blob(file_id, b"garbled".to_vec());
    let (corrupted_addr, _corrupted_handle) = corrupted.clone().spawn().await;
    ms.add_replica(file_id, NodeId::from("bad"), &corrupted_addr, ReplicaStatus::Corrupted)
        .unwrap();

    let nodeclient = NodeClient::new();
    let stats = EngineStats::new();
    let queue = RecoveryQueue::new(3, 100, Duration::from_secs(300));
    queue.enqueue(file_id, "a.txt".into(), 15, RecoveryStrategy::RebuildCorrupted);
    let mut claimed = queue.claim_batch(10, i32::MIN, &stats);
    let mut record = claimed.pop().unwrap();

    let outcome = run_attempt(&mut record, &ms, &nodeclient, &EngineConfig::default()).await;
    assert!(matches!(outcome, AttemptOutcome::Success(_)));
    assert_eq!(corrupted.blob(file_id), Some(b"good bytes".to_vec()));

    let replicas = ms.get_replicas(file_id).unwrap();
    assert!(replicas
        .iter()
        .any(|r| r.node_id == NodeId::from("bad") && r.status == ReplicaStatus::Active));
}
