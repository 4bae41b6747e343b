//! End-to-end tests for the ledger facade.

use std::sync::Arc;

use certledger::core::{Certificate, ContractRegistry, FieldType, NoContracts, ResolverError};
use certledger::store::{MemoryEngine, SqliteEngine, StoreError};
use certledger::{
    AttestError, BlockId, Ledger, LedgerConfig, LedgerError, SubmissionStatus, TransactionId,
};
use certledger_testkit::{
    multi_party_fixtures, registry, TestFixture, PAYLOAD_FIELD, TEST_TRANSACTION_TYPE,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn memory_ledger(fixture: &TestFixture, config: LedgerConfig) -> Ledger<MemoryEngine> {
    Ledger::new(fixture.memory_store(), fixture.resolver(), NoContracts, config)
}

#[tokio::test]
async fn test_single_transaction() {
    init_tracing();
    let fixture = TestFixture::new();
    let ledger = memory_ledger(&fixture, LedgerConfig::default());
    let (artifact, id, cert) = fixture.make_genesis(b"first");

    assert_eq!(ledger.submit(cert).await.unwrap(), id);
    assert_eq!(ledger.status(id).await.unwrap(), Some(SubmissionStatus::Pending));
    assert_eq!(ledger.pending_len().unwrap(), 1);

    let block = ledger.append_block().await.unwrap();
    assert_eq!(block.height, 1);
    assert_eq!(block.previous_block_id, BlockId::ROOT);
    assert_eq!(ledger.pending_len().unwrap(), 0);
    assert_eq!(
        ledger.status(id).await.unwrap(),
        Some(SubmissionStatus::Succeeded { block_id: block.id })
    );

    let recorded = ledger.get_artifact(artifact).await.unwrap().unwrap();
    assert_eq!(recorded.first_transaction_id, id);
    assert_eq!(recorded.last_transaction_id, id);
    assert_eq!(
        ledger.get_first_transaction_for_artifact(artifact).await.unwrap(),
        Some(id)
    );
    assert_eq!(ledger.get_transaction_block(id).await.unwrap(), Some(block.id));
}

#[tokio::test]
async fn test_artifact_chain_across_blocks() {
    init_tracing();
    let fixture = TestFixture::new();
    let ledger = memory_ledger(&fixture, LedgerConfig::default());

    let (artifact, t1, c1) = fixture.make_genesis(b"mint");
    ledger.submit(c1).await.unwrap();
    ledger.append_block().await.unwrap();

    let (t2, c2) = fixture.make_transaction(artifact, t1, b"transfer");
    ledger.submit(c2).await.unwrap();
    ledger.append_block().await.unwrap();

    assert_eq!(
        ledger.get_first_transaction_for_artifact(artifact).await.unwrap(),
        Some(t1)
    );
    assert_eq!(ledger.get_next_transaction(t1).await.unwrap(), Some(t2));
    assert_eq!(ledger.get_next_transaction(t2).await.unwrap(), None);
}

#[tokio::test]
async fn test_pending_chain_uses_overlay() {
    let fixture = TestFixture::new();
    let ledger = memory_ledger(&fixture, LedgerConfig::default());

    let (artifact, t1, c1) = fixture.make_genesis(b"mint");
    let (t2, c2) = fixture.make_transaction(artifact, t1, b"transfer");
    ledger.submit(c1).await.unwrap();
    ledger.submit(c2).await.unwrap();

    let block = ledger.append_block().await.unwrap();
    assert_eq!(ledger.get_next_transaction(t1).await.unwrap(), Some(t2));
    assert_eq!(ledger.get_transaction_block(t2).await.unwrap(), Some(block.id));
}

#[tokio::test]
async fn test_double_spend_rejected_at_submit() {
    let fixture = TestFixture::new();
    let ledger = memory_ledger(&fixture, LedgerConfig::default());

    let (artifact, t1, c1) = fixture.make_genesis(b"mint");
    ledger.submit(c1).await.unwrap();
    ledger.append_block().await.unwrap();

    let (t2, c2) = fixture.make_transaction(artifact, t1, b"to alice");
    ledger.submit(c2).await.unwrap();

    let (_, c3) = fixture.make_transaction(artifact, t1, b"to bob");
    match ledger.submit(c3).await {
        Err(LedgerError::Attest(AttestError::ArtifactStateConflict {
            expected, declared, ..
        })) => {
            assert_eq!(expected, t2);
            assert_eq!(declared, t1);
        }
        other => panic!("expected artifact conflict, got {:?}", other),
    }
    assert_eq!(ledger.pending_len().unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_submissions() {
    let fixture = TestFixture::new();
    let ledger = memory_ledger(
        &fixture,
        LedgerConfig {
            validate_on_submit: false,
            ..LedgerConfig::default()
        },
    );

    let (_, id, cert) = fixture.make_genesis(b"once");
    ledger.submit(cert.clone()).await.unwrap();
    assert!(matches!(
        ledger.submit(cert.clone()).await,
        Err(LedgerError::DuplicatePending(dup)) if dup == id
    ));

    ledger.append_block().await.unwrap();
    assert!(matches!(
        ledger.submit(cert).await,
        Err(LedgerError::AlreadyRecorded(dup)) if dup == id
    ));
}

#[tokio::test]
async fn test_queue_bound() {
    let fixture = TestFixture::new();
    let ledger = memory_ledger(
        &fixture,
        LedgerConfig {
            max_pending: 2,
            ..LedgerConfig::default()
        },
    );

    for _ in 0..2 {
        let (_, _, cert) = fixture.make_genesis(b"fill");
        ledger.submit(cert).await.unwrap();
    }
    let (_, _, cert) = fixture.make_genesis(b"overflow");
    assert!(matches!(
        ledger.submit(cert).await,
        Err(LedgerError::QueueFull(2))
    ));
}

#[tokio::test]
async fn test_unknown_signer_rejected_unless_validation_disabled() {
    let block_signer = TestFixture::new();
    let stranger = TestFixture::new();
    let (_, _, cert) = stranger.make_genesis(b"who am i");

    let strict = memory_ledger(&block_signer, LedgerConfig::default());
    assert!(matches!(
        strict.submit(cert.clone()).await,
        Err(LedgerError::Attest(AttestError::Resolver(
            ResolverError::UnknownEntity { .. }
        )))
    ));

    let lenient = memory_ledger(
        &block_signer,
        LedgerConfig {
            validate_on_submit: false,
            ..LedgerConfig::default()
        },
    );
    lenient.submit(cert).await.unwrap();
    assert_eq!(lenient.append_block().await.unwrap().height, 1);
}

#[tokio::test]
async fn test_failed_append_keeps_queue() {
    init_tracing();
    let fixture = TestFixture::new();
    let ledger = memory_ledger(
        &fixture,
        LedgerConfig {
            validate_on_submit: false,
            ..LedgerConfig::default()
        },
    );

    // Extends a transaction the ledger has never seen.
    let (_, _, genesis) = fixture.make_genesis(b"ok");
    let (orphan, cert) = fixture.make_transaction(
        certledger::ArtifactId::generate(),
        TransactionId::generate(),
        b"orphan",
    );
    ledger.submit(genesis).await.unwrap();
    ledger.submit(cert).await.unwrap();

    let err = ledger.append_block().await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Store(StoreError::MissingPreviousTransaction { .. })
    ));
    assert_eq!(ledger.pending_len().unwrap(), 2);
    assert_eq!(ledger.status(orphan).await.unwrap(), Some(SubmissionStatus::Pending));
    assert!(ledger.latest_block().await.unwrap().is_none());

    let discarded = ledger.discard_pending().await.unwrap();
    assert_eq!(discarded.len(), 2);
    assert_eq!(ledger.status(orphan).await.unwrap(), Some(SubmissionStatus::Discarded));

    let block = ledger.append_block().await.unwrap();
    assert_eq!(block.height, 1);
    assert!(block
        .certificate
        .fields_of(FieldType::WRAPPED_TRANSACTION)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_discarded_statuses_are_bounded() {
    let fixture = TestFixture::new();
    let ledger = memory_ledger(
        &fixture,
        LedgerConfig {
            max_discarded: 2,
            ..LedgerConfig::default()
        },
    );

    let mut submitted = Vec::new();
    for _ in 0..3 {
        let (_, id, cert) = fixture.make_genesis(b"dropped");
        ledger.submit(cert.clone()).await.unwrap();
        submitted.push((id, cert));
    }
    ledger.discard_pending().await.unwrap();

    let (oldest, oldest_cert) = submitted[0].clone();
    assert_eq!(ledger.status(oldest).await.unwrap(), None);
    for (id, _) in &submitted[1..] {
        assert_eq!(
            ledger.status(*id).await.unwrap(),
            Some(SubmissionStatus::Discarded)
        );
    }

    // Resubmitting a discarded id makes it pending again.
    let (second, second_cert) = submitted[1].clone();
    ledger.submit(second_cert).await.unwrap();
    assert_eq!(ledger.status(second).await.unwrap(), Some(SubmissionStatus::Pending));
    ledger.submit(oldest_cert).await.unwrap();

    let block = ledger.append_block().await.unwrap();
    assert_eq!(
        ledger.status(second).await.unwrap(),
        Some(SubmissionStatus::Succeeded { block_id: block.id })
    );
    assert_eq!(
        ledger.status(submitted[2].0).await.unwrap(),
        Some(SubmissionStatus::Discarded)
    );
}

#[tokio::test]
async fn test_unsigned_trailer_dropped_on_record() {
    let fixture = TestFixture::new();
    let ledger = memory_ledger(&fixture, LedgerConfig::default());
    let (_, id, cert) = fixture.make_genesis(b"signed");
    let signed_len = cert.raw_size();

    let mut raw = cert.raw_bytes().to_vec();
    certledger::core::field::encode_field(&mut raw, FieldType(0x0777), b"UNSIGNED").unwrap();
    ledger.submit(Certificate::from_bytes(raw)).await.unwrap();
    ledger.append_block().await.unwrap();

    let stored = ledger.get_transaction(id).await.unwrap().unwrap();
    assert_eq!(stored.certificate.raw_size(), signed_len);
    assert!(stored
        .certificate
        .field(FieldType(0x0777))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_contracts_checked_on_submit() {
    let fixture = TestFixture::new();
    let mut contracts = ContractRegistry::new();
    contracts.register(TEST_TRANSACTION_TYPE, |c: &Certificate| {
        match c.field(PAYLOAD_FIELD) {
            Ok(Some(field)) if !field.value.is_empty() => Ok(()),
            _ => Err("empty payload".to_string()),
        }
    });
    let ledger = Ledger::new(
        fixture.memory_store(),
        fixture.resolver(),
        contracts,
        LedgerConfig {
            validate_contracts: true,
            ..LedgerConfig::default()
        },
    );

    let (_, _, empty) = fixture.make_genesis(b"");
    assert!(matches!(
        ledger.submit(empty).await,
        Err(LedgerError::Attest(AttestError::ContractVerificationFailure(_)))
    ));

    let (_, _, paid) = fixture.make_genesis(b"100");
    ledger.submit(paid).await.unwrap();
}

#[tokio::test]
async fn test_standalone_attest() {
    let fixture = TestFixture::new();
    let ledger = memory_ledger(&fixture, LedgerConfig::default());
    let (_, _, cert) = fixture.make_genesis(b"check me");
    let raw_size = cert.raw_size();

    let (attested, attestation) = ledger.attest(cert, false).await.unwrap();
    assert_eq!(attestation.signer, fixture.entity_id);
    assert_eq!(attested.visible_size(), raw_size);
    assert_eq!(ledger.pending_len().unwrap(), 0);

    let (_, _, cert) = fixture.make_genesis(b"no contract");
    assert!(matches!(
        ledger.attest(cert, true).await,
        Err(LedgerError::Attest(AttestError::MissingContract { .. }))
    ));
}

#[tokio::test]
async fn test_multi_party_submissions() {
    let parties = multi_party_fixtures(3);
    let block_signer = TestFixture::new();
    let ledger = Ledger::new(
        block_signer.memory_store(),
        registry(&parties),
        NoContracts,
        LedgerConfig::default(),
    );

    let mut ids = Vec::new();
    for party in &parties {
        let (_, id, cert) = party.make_genesis(b"hello");
        ledger.submit(cert).await.unwrap();
        ids.push(id);
    }

    let block = ledger.append_block().await.unwrap();
    for id in ids {
        assert_eq!(
            ledger.status(id).await.unwrap(),
            Some(SubmissionStatus::Succeeded { block_id: block.id })
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_are_serialized() {
    let fixture = Arc::new(TestFixture::new());
    let ledger = Arc::new(memory_ledger(&fixture, LedgerConfig::default()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = Arc::clone(&ledger);
        let fixture = Arc::clone(&fixture);
        handles.push(tokio::spawn(async move {
            let (_, _, cert) = fixture.make_genesis(b"race");
            ledger.submit(cert).await.unwrap();
            ledger.append_block().await.unwrap()
        }));
    }

    let mut heights = Vec::new();
    for handle in handles {
        heights.push(handle.await.unwrap().height);
    }
    heights.sort_unstable();
    assert_eq!(heights, (1..=8).collect::<Vec<u64>>());
    assert_eq!(ledger.latest_block().await.unwrap().unwrap().height, 8);
}

#[tokio::test]
async fn test_sqlite_height_walk() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let fixture = TestFixture::new();
    let ledger = Ledger::new(
        fixture.sqlite_store(dir.path().join("ledger.db")),
        fixture.resolver(),
        NoContracts,
        LedgerConfig::default(),
    );

    let root = ledger.ensure_root().await.unwrap();
    assert_eq!(root.id, BlockId::ROOT);

    const N: u64 = 4;
    for _ in 0..N {
        let (_, _, cert) = fixture.make_genesis(b"block");
        ledger.submit(cert).await.unwrap();
        ledger.append_block().await.unwrap();
    }

    assert_eq!(
        ledger.get_block_id_by_height(0).await.unwrap(),
        Some(BlockId::ROOT)
    );
    let latest = ledger.latest_block().await.unwrap().unwrap();
    assert_eq!(latest.height, N);
    assert_eq!(
        ledger.get_block_id_by_height(N).await.unwrap(),
        Some(latest.id)
    );
    assert_eq!(ledger.get_block_by_height(N).await.unwrap(), Some(latest));
    assert!(ledger.get_block_by_height(N + 1).await.unwrap().is_none());

    let mut cursor = BlockId::ROOT;
    let mut expected_height = 0;
    loop {
        let block = ledger.get_block(cursor).await.unwrap().unwrap();
        assert_eq!(block.height, expected_height);
        match ledger.get_next_block(cursor).await.unwrap() {
            Some(next) => {
                cursor = next;
                expected_height += 1;
            }
            None => break,
        }
    }
    assert_eq!(expected_height, N);
}

#[tokio::test]
async fn test_sqlite_ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let fixture = TestFixture::new();
    let (artifact, t1, c1) = fixture.make_genesis(b"mint");

    {
        let ledger = Ledger::new(
            fixture.sqlite_store(&path),
            fixture.resolver(),
            NoContracts,
            LedgerConfig::default(),
        );
        ledger.submit(c1).await.unwrap();
        ledger.append_block().await.unwrap();
    }

    let engine = SqliteEngine::open(&path).unwrap();
    let store = certledger::store::LedgerStore::new(
        engine,
        fixture.crypto.clone(),
        fixture.block_signer(),
    );
    let ledger = Ledger::new(
        store,
        fixture.resolver(),
        NoContracts,
        LedgerConfig::default(),
    );

    // Linkage is checked against the persisted artifact state.
    let (_, stale) = fixture.make_transaction(artifact, TransactionId::NIL, b"again");
    assert!(matches!(
        ledger.submit(stale).await,
        Err(LedgerError::Attest(AttestError::ArtifactStateConflict { .. }))
    ));
    let (_, next) = fixture.make_transaction(artifact, t1, b"next");
    ledger.submit(next).await.unwrap();
    assert_eq!(ledger.append_block().await.unwrap().height, 2);
}
