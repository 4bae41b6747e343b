//! The ledger store: block, transaction and artifact indexes over a
//! [`KvEngine`], plus block assembly.

use bytes::Bytes;

use certledger_core::field::encoded_len;
use certledger_core::{
    now_millis, ArtifactId, ArtifactStateResolver, BlockId, Certificate, CertificateBuilder,
    CertificateType, CoreError, CryptoContext, Digest, EntityId, FieldType, Keypair,
    LedgerTransaction, ResolverError, TransactionId, CERTIFICATE_VERSION, ID_LEN,
};

use crate::engine::{KvEngine, KvRead, KvWrite, Table};
use crate::error::{Result, StoreError};
use crate::records::{decode_block_id, height_key, Artifact, Block, Transaction, HEAD_KEY};

/// The identity that signs every block this store appends.
#[derive(Debug, Clone)]
pub struct BlockSigner {
    pub signer_id: EntityId,
    pub keypair: Keypair,
}

impl BlockSigner {
    pub fn new(signer_id: EntityId, keypair: Keypair) -> Self {
        Self { signer_id, keypair }
    }

    /// A signer with a fresh id and keypair.
    pub fn generate() -> Self {
        Self::new(EntityId::generate(), Keypair::generate())
    }
}

/// Ledger indexes over a transactional key-value engine.
///
/// Every operation runs in exactly one engine transaction.
pub struct LedgerStore<E> {
    engine: E,
    crypto: CryptoContext,
    signer: BlockSigner,
}

impl<E: KvEngine> LedgerStore<E> {
    pub fn new(engine: E, crypto: CryptoContext, signer: BlockSigner) -> Self {
        Self {
            engine,
            crypto,
            signer,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn crypto(&self) -> &CryptoContext {
        &self.crypto
    }

    pub fn signer_id(&self) -> EntityId {
        self.signer.signer_id
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Block Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_block(&self, id: &BlockId) -> Result<Option<Block>> {
        self.engine.read(|r| load_block(r, id))
    }

    pub fn get_block_id_by_height(&self, height: u64) -> Result<Option<BlockId>> {
        self.engine.read(|r| load_height(r, height))
    }

    /// The block at `height`, if any.
    pub fn get_block_by_height(&self, height: u64) -> Result<Option<Block>> {
        self.engine.read(|r| match load_height(r, height)? {
            Some(id) => load_block(r, &id),
            None => Ok(None),
        })
    }

    /// The successor of `id`, or `None` if `id` is the head.
    pub fn get_next_block(&self, id: &BlockId) -> Result<Option<BlockId>> {
        self.engine.read(|r| {
            let block = load_block(r, id)?.ok_or(StoreError::BlockNotFound(*id))?;
            Ok(block.next_block_id.non_nil())
        })
    }

    /// The most recently committed block.
    pub fn latest_block(&self) -> Result<Option<Block>> {
        self.engine.read(|r| load_head(r))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transaction Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        self.engine.read(|r| load_transaction(r, id))
    }

    /// The block that recorded a transaction.
    pub fn get_transaction_block(&self, id: &TransactionId) -> Result<Option<BlockId>> {
        Ok(self.get_transaction(id)?.map(|tx| tx.block_id))
    }

    /// The transaction that extends `id`, or `None` if nothing does yet.
    pub fn get_next_transaction(&self, id: &TransactionId) -> Result<Option<TransactionId>> {
        self.engine.read(|r| {
            let tx = load_transaction(r, id)?.ok_or(StoreError::TransactionNotFound(*id))?;
            Ok(tx.next_transaction_id.non_nil())
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Artifact Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>> {
        self.engine.read(|r| load_artifact(r, id))
    }

    pub fn get_first_transaction_for_artifact(&self, id: &ArtifactId) -> Result<Option<TransactionId>> {
        Ok(self.get_artifact(id)?.map(|a| a.first_transaction_id))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Return the root block, creating it if the ledger is empty.
    pub fn ensure_root(&self) -> Result<Block> {
        self.engine.write(|tx| match load_block(tx, &BlockId::ROOT)? {
            Some(root) => Ok(root),
            None => self.create_root(tx),
        })
    }

    /// Wrap `pending` transactions into a new signed block and commit it.
    ///
    /// Either everything is recorded or, on any error, nothing is.
    pub fn append_block(&self, pending: &[Certificate]) -> Result<Block> {
        let result = self.engine.write(|tx| self.append_in(tx, pending));
        match &result {
            Ok(block) => tracing::info!(
                block = %block.id,
                height = block.height,
                transactions = pending.len(),
                size = block.size(),
                "appended block"
            ),
            Err(e) => tracing::warn!(transactions = pending.len(), "append aborted: {}", e),
        }
        result
    }

    fn append_in(&self, tx: &mut dyn KvWrite, pending: &[Certificate]) -> Result<Block> {
        let mut previous = match load_head(tx)? {
            Some(head) => head,
            None => self.create_root(tx)?,
        };

        let block_id = BlockId::generate();
        let height = previous.height + 1;
        let certificate = self.block_certificate(
            block_id,
            previous.id,
            previous.certificate.digest(&self.crypto),
            height,
            pending,
        )?;

        for certificate in pending {
            let parsed = LedgerTransaction::parse(certificate.clone())?;
            self.record_transaction(tx, block_id, parsed)?;
        }

        let block = Block {
            id: block_id,
            previous_block_id: previous.id,
            next_block_id: BlockId::NIL,
            height,
            certificate,
        };
        let encoded = block.encode();
        tx.put(Table::Blocks, block.id.as_bytes(), &encoded)?;

        previous.next_block_id = block_id;
        tx.put(Table::Blocks, previous.id.as_bytes(), &previous.encode())?;

        tx.put(Table::Head, HEAD_KEY, &encoded)?;
        tx.put(Table::Heights, &height_key(height), block_id.as_bytes())?;

        Ok(block)
    }

    fn record_transaction(
        &self,
        tx: &mut dyn KvWrite,
        block_id: BlockId,
        parsed: LedgerTransaction,
    ) -> Result<()> {
        let id = parsed.transaction_id;
        let previous_id = parsed.previous_transaction_id;

        if tx.get(Table::Transactions, id.as_bytes())?.is_some() {
            return Err(StoreError::DuplicateTransaction(id));
        }

        let previous = match previous_id.non_nil() {
            Some(previous_id) => Some(load_transaction(tx, &previous_id)?.ok_or(
                StoreError::MissingPreviousTransaction {
                    transaction: id,
                    previous: previous_id,
                },
            )?),
            None => None,
        };

        let artifact = match load_artifact(tx, &parsed.artifact_id)? {
            Some(mut artifact) => {
                if artifact.last_transaction_id != previous_id {
                    return Err(StoreError::ArtifactConflict {
                        artifact: artifact.id,
                        expected: artifact.last_transaction_id,
                        declared: previous_id,
                    });
                }
                artifact.last_block_id = block_id;
                artifact.last_transaction_id = id;
                artifact
            }
            None if !previous_id.is_nil() => {
                return Err(StoreError::ArtifactConflict {
                    artifact: parsed.artifact_id,
                    expected: TransactionId::NIL,
                    declared: previous_id,
                })
            }
            None => Artifact::new(parsed.artifact_id, block_id, id),
        };

        let record = Transaction {
            id,
            block_id,
            previous_transaction_id: previous_id,
            next_transaction_id: TransactionId::NIL,
            certificate: parsed.certificate,
        };
        tx.put(Table::Transactions, id.as_bytes(), &record.encode())?;
        tx.put(Table::Artifacts, artifact.id.as_bytes(), &artifact.encode())?;

        if let Some(mut previous) = previous {
            previous.next_transaction_id = id;
            tx.put(Table::Transactions, previous.id.as_bytes(), &previous.encode())?;
        }

        tracing::debug!(
            transaction = %id,
            artifact = %artifact.id,
            previous = %previous_id,
            "recorded transaction"
        );
        Ok(())
    }

    fn create_root(&self, tx: &mut dyn KvWrite) -> Result<Block> {
        let certificate =
            self.block_certificate(BlockId::ROOT, BlockId::NIL, Digest::ZERO, 0, &[])?;
        let root = Block {
            id: BlockId::ROOT,
            previous_block_id: BlockId::NIL,
            next_block_id: BlockId::NIL,
            height: 0,
            certificate,
        };

        let encoded = root.encode();
        tx.put(Table::Blocks, root.id.as_bytes(), &encoded)?;
        tx.put(Table::Heights, &height_key(0), root.id.as_bytes())?;
        tx.put(Table::Head, HEAD_KEY, &encoded)?;

        tracing::info!(signer = %self.signer.signer_id, "created root block");
        Ok(root)
    }

    /// Build and sign a block certificate, checking its size against the
    /// size computed up front.
    fn block_certificate(
        &self,
        id: BlockId,
        previous_id: BlockId,
        previous_hash: Digest,
        height: u64,
        pending: &[Certificate],
    ) -> Result<Certificate> {
        let expected = encoded_len(2) // version
            + encoded_len(8) // timestamp
            + encoded_len(2) // suite
            + encoded_len(2) // type
            + encoded_len(ID_LEN) // block id
            + encoded_len(ID_LEN) // previous id
            + encoded_len(previous_hash.as_bytes().len())
            + encoded_len(8) // height
            + pending
                .iter()
                .map(|c| encoded_len(c.visible_size()))
                .sum::<usize>()
            + encoded_len(ID_LEN) // signer id
            + encoded_len(self.crypto.signature_len());

        let mut builder = CertificateBuilder::with_capacity(pending.len() + 10);
        builder
            .add_u16(FieldType::VERSION, CERTIFICATE_VERSION)
            .add_u64(FieldType::TIMESTAMP, now_millis())
            .add_u16(FieldType::CRYPTO_SUITE, self.crypto.suite_id())
            .add_certificate_type(CertificateType::BLOCK)
            .add_id(FieldType::BLOCK_ID, id)
            .add_id(FieldType::PREVIOUS_BLOCK_ID, previous_id)
            .add_field(
                FieldType::PREVIOUS_BLOCK_HASH,
                Bytes::copy_from_slice(previous_hash.as_bytes()),
            )
            .add_u64(FieldType::BLOCK_HEIGHT, height);
        for transaction in pending {
            builder.add_certificate(FieldType::WRAPPED_TRANSACTION, transaction);
        }

        let certificate = builder.sign(
            &self.crypto,
            self.signer.signer_id.as_bytes(),
            &self.signer.keypair.private_key(),
        )?;
        if certificate.raw_size() != expected {
            return Err(CoreError::SizeMismatch {
                expected,
                actual: certificate.raw_size(),
            }
            .into());
        }
        Ok(certificate)
    }
}

impl<E: KvEngine> ArtifactStateResolver for LedgerStore<E> {
    fn resolve_artifact_state(
        &self,
        artifact: &ArtifactId,
    ) -> std::result::Result<Option<TransactionId>, ResolverError> {
        self.get_artifact(artifact)
            .map(|a| a.map(|a| a.last_transaction_id))
            .map_err(|e| ResolverError::Backend(e.to_string()))
    }
}

fn load_block<R: KvRead + ?Sized>(r: &R, id: &BlockId) -> Result<Option<Block>> {
    r.get(Table::Blocks, id.as_bytes())?
        .map(Block::decode)
        .transpose()
}

fn load_head<R: KvRead + ?Sized>(r: &R) -> Result<Option<Block>> {
    r.get(Table::Head, HEAD_KEY)?.map(Block::decode).transpose()
}

fn load_height<R: KvRead + ?Sized>(r: &R, height: u64) -> Result<Option<BlockId>> {
    r.get(Table::Heights, &height_key(height))?
        .map(|bytes| decode_block_id(&bytes))
        .transpose()
}

fn load_transaction<R: KvRead + ?Sized>(r: &R, id: &TransactionId) -> Result<Option<Transaction>> {
    r.get(Table::Transactions, id.as_bytes())?
        .map(Transaction::decode)
        .transpose()
}

fn load_artifact<R: KvRead + ?Sized>(r: &R, id: &ArtifactId) -> Result<Option<Artifact>> {
    r.get(Table::Artifacts, id.as_bytes())?
        .map(Artifact::decode)
        .transpose()
}
