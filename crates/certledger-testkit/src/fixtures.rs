//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::Path;

use bytes::Bytes;
use rand::RngCore;

use certledger_core::{
    ArtifactId, Certificate, CertificateType, CryptoContext, EntityId, EntityKeys, FieldType,
    Keypair, StaticEntityResolver, TransactionBuilder, TransactionId,
};
use certledger_store::{BlockSigner, LedgerStore, MemoryEngine, SqliteEngine};

/// Certificate type used by fixture transactions.
pub const TEST_TRANSACTION_TYPE: CertificateType = CertificateType(0x0100);

/// Application field carrying fixture payloads.
pub const PAYLOAD_FIELD: FieldType = FieldType(0x0400);

/// A test fixture: one signing entity.
pub struct TestFixture {
    pub entity_id: EntityId,
    pub keypair: Keypair,
    pub crypto: CryptoContext,
}

impl TestFixture {
    /// Create a new test fixture with a random identity.
    pub fn new() -> Self {
        Self {
            entity_id: EntityId::generate(),
            keypair: Keypair::generate(),
            crypto: CryptoContext::default(),
        }
    }

    /// Create with a deterministic identity from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        let crypto = CryptoContext::default();
        let digest = crypto.digest(&seed);
        let mut id = [0u8; 16];
        id.copy_from_slice(&digest.as_bytes()[..16]);
        Self {
            entity_id: EntityId::from_bytes(id),
            keypair: Keypair::from_seed(&seed),
            crypto,
        }
    }

    /// The keys a resolver should return for this entity.
    pub fn keys(&self) -> EntityKeys {
        EntityKeys::new(Bytes::new(), self.keypair.public_key().to_vec())
    }

    /// Register this entity with a resolver, active from height 0.
    pub fn register(&self, resolver: &StaticEntityResolver) {
        resolver.register(self.entity_id, self.keys());
    }

    /// A resolver that knows only this entity.
    pub fn resolver(&self) -> StaticEntityResolver {
        let resolver = StaticEntityResolver::new();
        self.register(&resolver);
        resolver
    }

    /// A block signer using this fixture's identity.
    pub fn block_signer(&self) -> BlockSigner {
        BlockSigner::new(self.entity_id, self.keypair.clone())
    }

    /// A ledger store over a fresh in-memory engine.
    pub fn memory_store(&self) -> LedgerStore<MemoryEngine> {
        LedgerStore::new(MemoryEngine::new(), self.crypto.clone(), self.block_signer())
    }

    /// A ledger store over a SQLite database at `path`.
    pub fn sqlite_store(&self, path: impl AsRef<Path>) -> LedgerStore<SqliteEngine> {
        let engine = SqliteEngine::open(path).expect("open sqlite engine");
        LedgerStore::new(engine, self.crypto.clone(), self.block_signer())
    }

    /// Sign a transaction builder as this entity.
    pub fn sign(&self, builder: TransactionBuilder) -> Certificate {
        builder
            .sign(&self.crypto, &self.entity_id, &self.keypair.private_key())
            .expect("sign transaction")
    }

    /// Create a transaction on `artifact` extending `previous` (NIL for a new artifact).
    pub fn make_transaction(
        &self,
        artifact: ArtifactId,
        previous: TransactionId,
        payload: &[u8],
    ) -> (TransactionId, Certificate) {
        let builder = TransactionBuilder::new(TEST_TRANSACTION_TYPE, artifact)
            .previous(previous)
            .field(PAYLOAD_FIELD, payload.to_vec());
        let id = builder.id();
        (id, self.sign(builder))
    }

    /// Create the first transaction of a fresh artifact.
    pub fn make_genesis(&self, payload: &[u8]) -> (ArtifactId, TransactionId, Certificate) {
        let artifact = ArtifactId::generate();
        let (id, certificate) = self.make_transaction(artifact, TransactionId::NIL, payload);
        (artifact, id, certificate)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple test fixtures for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::with_seed(seed)
        })
        .collect()
}

/// A resolver that knows every given fixture.
pub fn registry(fixtures: &[TestFixture]) -> StaticEntityResolver {
    let resolver = StaticEntityResolver::new();
    for fixture in fixtures {
        fixture.register(&resolver);
    }
    resolver
}

/// Random payload bytes.
pub fn random_payload(len: usize) -> Vec<u8> {
    let mut payload = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut payload);
    payload
}
