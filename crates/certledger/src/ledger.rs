//! The Ledger: submission queue and serialized block assembly.
//!
//! Submissions are attested against the committed ledger overlaid with
//! everything already pending, so two pending transactions can never spend
//! the same artifact state. Blocks are appended by one writer at a time.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use certledger_core::{
    ArtifactId, ArtifactStateResolver, AttestOptions, Attestation, Attestor, BlockId, Certificate,
    ContractResolver, EntityResolver, LedgerTransaction, ResolverError, Resolvers, TransactionId,
};
use certledger_store::{Artifact, Block, KvEngine, LedgerStore, StoreError, Transaction};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};

/// Where a submitted transaction stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Waiting for the next block.
    Pending,
    /// Recorded in a committed block.
    Succeeded { block_id: BlockId },
    /// Dropped from the queue without being recorded.
    Discarded,
}

struct PendingEntry {
    transaction: LedgerTransaction,
}

#[derive(Default)]
struct PendingState {
    queue: VecDeque<PendingEntry>,
    /// Latest pending transaction per artifact.
    latest: HashMap<ArtifactId, TransactionId>,
    /// Pending and discarded submissions. Succeeded ones are answered by the store.
    statuses: HashMap<TransactionId, SubmissionStatus>,
    /// Discarded ids, oldest first, bounded by `max_discarded`.
    discarded: VecDeque<TransactionId>,
}

impl PendingState {
    fn forget_discarded(&mut self, id: &TransactionId) {
        self.discarded.retain(|d| d != id);
    }

    fn evict_discarded(&mut self, limit: usize) {
        while self.discarded.len() > limit {
            if let Some(id) = self.discarded.pop_front() {
                if self.statuses.get(&id) == Some(&SubmissionStatus::Discarded) {
                    self.statuses.remove(&id);
                }
            }
        }
    }
}

/// Artifact state as it will be once everything pending is committed.
struct PendingOverlay<'a, E> {
    store: &'a LedgerStore<E>,
    latest: &'a HashMap<ArtifactId, TransactionId>,
}

impl<E: KvEngine> ArtifactStateResolver for PendingOverlay<'_, E> {
    fn resolve_artifact_state(
        &self,
        artifact: &ArtifactId,
    ) -> std::result::Result<Option<TransactionId>, ResolverError> {
        match self.latest.get(artifact) {
            Some(latest) => Ok(Some(*latest)),
            None => self.store.resolve_artifact_state(artifact),
        }
    }
}

struct Inner<E> {
    store: LedgerStore<E>,
    entities: Box<dyn EntityResolver + Send + Sync>,
    contracts: Box<dyn ContractResolver + Send + Sync>,
    config: LedgerConfig,
    pending: Mutex<PendingState>,
}

impl<E: KvEngine> Inner<E> {
    fn lock_pending(&self) -> Result<MutexGuard<'_, PendingState>> {
        self.pending
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("pending queue: {}", e)).into())
    }

    fn head_height(&self) -> Result<u64> {
        Ok(self.store.latest_block()?.map_or(0, |b| b.height))
    }

    fn attest_with(
        &self,
        certificate: &mut Certificate,
        artifacts: &dyn ArtifactStateResolver,
        validate_contract: bool,
    ) -> Result<Attestation> {
        let options = AttestOptions {
            height: self.head_height()?,
            validate_contract,
        };
        let attestor = Attestor::new(
            self.store.crypto(),
            Resolvers {
                entities: self.entities.as_ref(),
                artifacts,
                contracts: self.contracts.as_ref(),
            },
        );
        Ok(attestor.attest(certificate, options)?)
    }

    fn submit(&self, mut certificate: Certificate) -> Result<TransactionId> {
        let mut pending = self.lock_pending()?;

        if pending.queue.len() >= self.config.max_pending {
            return Err(LedgerError::QueueFull(pending.queue.len()));
        }

        let parsed = LedgerTransaction::parse(certificate.clone())?;
        let id = parsed.transaction_id;
        if pending.statuses.get(&id) == Some(&SubmissionStatus::Pending) {
            return Err(LedgerError::DuplicatePending(id));
        }
        if self.store.get_transaction(&id)?.is_some() {
            return Err(LedgerError::AlreadyRecorded(id));
        }

        let transaction = if self.config.validate_on_submit {
            let overlay = PendingOverlay {
                store: &self.store,
                latest: &pending.latest,
            };
            self.attest_with(&mut certificate, &overlay, self.config.validate_contracts)?;
            // Re-read the fields from the attested, narrowed certificate.
            LedgerTransaction::parse(certificate)?
        } else {
            parsed
        };

        pending.latest.insert(transaction.artifact_id, id);
        pending.forget_discarded(&id);
        pending.statuses.insert(id, SubmissionStatus::Pending);
        pending.queue.push_back(PendingEntry { transaction });

        tracing::debug!(transaction = %id, pending = pending.queue.len(), "accepted submission");
        Ok(id)
    }

    fn append(&self) -> Result<Block> {
        let batch: Vec<Certificate> = {
            let pending = self.lock_pending()?;
            pending
                .queue
                .iter()
                .map(|entry| entry.transaction.certificate.clone())
                .collect()
        };

        let block = self.store.append_block(&batch)?;

        let mut pending = self.lock_pending()?;
        for entry in pending.queue.drain(..batch.len()).collect::<Vec<_>>() {
            let tx = entry.transaction;
            pending.statuses.remove(&tx.transaction_id);
            if pending.latest.get(&tx.artifact_id) == Some(&tx.transaction_id) {
                pending.latest.remove(&tx.artifact_id);
            }
        }
        Ok(block)
    }

    fn discard(&self) -> Result<Vec<Certificate>> {
        let mut pending = self.lock_pending()?;
        let entries: Vec<PendingEntry> = pending.queue.drain(..).collect();
        pending.latest.clear();
        for entry in &entries {
            let id = entry.transaction.transaction_id;
            pending.statuses.insert(id, SubmissionStatus::Discarded);
            pending.discarded.push_back(id);
        }
        pending.evict_discarded(self.config.max_discarded);
        if !entries.is_empty() {
            tracing::warn!(count = entries.len(), "discarded pending transactions");
        }
        Ok(entries
            .into_iter()
            .map(|entry| entry.transaction.certificate)
            .collect())
    }

    fn status(&self, id: &TransactionId) -> Result<Option<SubmissionStatus>> {
        if let Some(status) = self.lock_pending()?.statuses.get(id) {
            return Ok(Some(*status));
        }
        Ok(self
            .store
            .get_transaction_block(id)?
            .map(|block_id| SubmissionStatus::Succeeded { block_id }))
    }
}

/// The main Ledger struct.
///
/// Provides an async API for:
/// - Submitting transaction certificates
/// - Appending blocks of pending transactions
/// - Attesting certificates against the current ledger
/// - Querying blocks, transactions and artifacts
///
/// Store work runs on tokio's blocking pool.
pub struct Ledger<E> {
    inner: Arc<Inner<E>>,
    /// Serializes block appends and queue discards.
    writer: tokio::sync::Mutex<()>,
}

impl<E: KvEngine + 'static> Ledger<E> {
    /// Create a ledger over a store.
    pub fn new(
        store: LedgerStore<E>,
        entities: impl EntityResolver + Send + Sync + 'static,
        contracts: impl ContractResolver + Send + Sync + 'static,
        config: LedgerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                entities: Box::new(entities),
                contracts: Box::new(contracts),
                config,
                pending: Mutex::new(PendingState::default()),
            }),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &LedgerStore<E> {
        &self.inner.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.inner.config
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner<E>) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| LedgerError::Blocking(e.to_string()))?
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Submission
    // ─────────────────────────────────────────────────────────────────────────

    /// Queue a transaction certificate for the next block.
    ///
    /// With `validate_on_submit` the certificate is attested at the current
    /// head height, including artifact linkage against pending submissions.
    pub async fn submit(&self, certificate: Certificate) -> Result<TransactionId> {
        let result = self.blocking(move |inner| inner.submit(certificate)).await;
        if let Err(e) = &result {
            tracing::warn!("rejected submission: {}", e);
        }
        result
    }

    /// Commit every pending transaction in one new block.
    ///
    /// On failure nothing is recorded and the queue is left as it was.
    pub async fn append_block(&self) -> Result<Block> {
        let _writer = self.writer.lock().await;
        self.blocking(|inner| inner.append()).await
    }

    /// Drop every pending transaction, returning their certificates.
    pub async fn discard_pending(&self) -> Result<Vec<Certificate>> {
        let _writer = self.writer.lock().await;
        self.blocking(|inner| inner.discard()).await
    }

    /// Attest a certificate against the committed ledger without queuing it.
    ///
    /// Returns the certificate narrowed to its signed bytes.
    pub async fn attest(
        &self,
        certificate: Certificate,
        validate_contract: bool,
    ) -> Result<(Certificate, Attestation)> {
        self.blocking(move |inner| {
            let mut certificate = certificate;
            let attestation =
                inner.attest_with(&mut certificate, &inner.store, validate_contract)?;
            Ok((certificate, attestation))
        })
        .await
    }

    pub async fn status(&self, id: TransactionId) -> Result<Option<SubmissionStatus>> {
        self.blocking(move |inner| inner.status(&id)).await
    }

    /// Number of transactions waiting for the next block.
    pub fn pending_len(&self) -> Result<usize> {
        Ok(self.inner.lock_pending()?.queue.len())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Store Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn ensure_root(&self) -> Result<Block> {
        let _writer = self.writer.lock().await;
        self.blocking(|inner| Ok(inner.store.ensure_root()?)).await
    }

    pub async fn latest_block(&self) -> Result<Option<Block>> {
        self.blocking(|inner| Ok(inner.store.latest_block()?)).await
    }

    pub async fn get_block(&self, id: BlockId) -> Result<Option<Block>> {
        self.blocking(move |inner| Ok(inner.store.get_block(&id)?))
            .await
    }

    pub async fn get_block_id_by_height(&self, height: u64) -> Result<Option<BlockId>> {
        self.blocking(move |inner| Ok(inner.store.get_block_id_by_height(height)?))
            .await
    }

    pub async fn get_block_by_height(&self, height: u64) -> Result<Option<Block>> {
        self.blocking(move |inner| Ok(inner.store.get_block_by_height(height)?))
            .await
    }

    pub async fn get_next_block(&self, id: BlockId) -> Result<Option<BlockId>> {
        self.blocking(move |inner| Ok(inner.store.get_next_block(&id)?))
            .await
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.blocking(move |inner| Ok(inner.store.get_transaction(&id)?))
            .await
    }

    pub async fn get_transaction_block(&self, id: TransactionId) -> Result<Option<BlockId>> {
        self.blocking(move |inner| Ok(inner.store.get_transaction_block(&id)?))
            .await
    }

    pub async fn get_next_transaction(&self, id: TransactionId) -> Result<Option<TransactionId>> {
        self.blocking(move |inner| Ok(inner.store.get_next_transaction(&id)?))
            .await
    }

    pub async fn get_first_transaction_for_artifact(
        &self,
        id: ArtifactId,
    ) -> Result<Option<TransactionId>> {
        self.blocking(move |inner| Ok(inner.store.get_first_transaction_for_artifact(&id)?))
            .await
    }

    pub async fn get_artifact(&self, id: ArtifactId) -> Result<Option<Artifact>> {
        self.blocking(move |inner| Ok(inner.store.get_artifact(&id)?))
            .await
    }
}
