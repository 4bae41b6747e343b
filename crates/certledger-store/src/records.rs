//! Persisted record layouts.
//!
//! All integers are big-endian. Identifiers are 16 raw bytes with the zero
//! id standing for "none".
//!
//! ```text
//! Block:       block_id ‖ previous ‖ next ‖ height u64 ‖ size u64 ‖ raw
//! Transaction: tx_id ‖ block ‖ previous ‖ next ‖ size u64 ‖ raw
//! Artifact:    artifact ‖ first_block ‖ first_tx ‖ last_block ‖ last_tx
//! ```

use bytes::{BufMut, Bytes};

use certledger_core::{ArtifactId, BlockId, Certificate, TransactionId, ID_LEN};

use crate::error::{Result, StoreError};

/// Key of the ledger head record.
pub const HEAD_KEY: &[u8] = b"ledger-head";

const BLOCK_HEADER_LEN: usize = 3 * ID_LEN + 16;
const TRANSACTION_HEADER_LEN: usize = 4 * ID_LEN + 8;
const ARTIFACT_LEN: usize = 5 * ID_LEN;

/// A stored block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub previous_block_id: BlockId,
    /// NIL until a successor is appended.
    pub next_block_id: BlockId,
    pub height: u64,
    pub certificate: Certificate,
}

/// A stored transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub block_id: BlockId,
    pub previous_transaction_id: TransactionId,
    /// NIL until a later transaction extends this one.
    pub next_transaction_id: TransactionId,
    pub certificate: Certificate,
}

/// First and latest transaction recorded against an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Artifact {
    pub id: ArtifactId,
    pub first_block_id: BlockId,
    pub first_transaction_id: TransactionId,
    pub last_block_id: BlockId,
    pub last_transaction_id: TransactionId,
}

/// Cursor over a record value.
struct Reader<'a> {
    table: &'static str,
    bytes: &'a Bytes,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(table: &'static str, bytes: &'a Bytes, min_len: usize) -> Result<Self> {
        if bytes.len() < min_len {
            return Err(corrupt(
                table,
                format!("{} bytes, expected at least {}", bytes.len(), min_len),
            ));
        }
        Ok(Self {
            table,
            bytes,
            pos: 0,
        })
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn id<T: From<[u8; ID_LEN]>>(&mut self) -> T {
        T::from(self.take::<ID_LEN>())
    }

    fn u64(&mut self) -> u64 {
        u64::from_be_bytes(self.take::<8>())
    }

    /// The remaining bytes, which must match the recorded size.
    fn certificate(self, size: u64) -> Result<Certificate> {
        let remaining = self.bytes.len() - self.pos;
        if remaining as u64 != size {
            return Err(corrupt(
                self.table,
                format!("recorded size {} but {} bytes follow", size, remaining),
            ));
        }
        Ok(Certificate::from_bytes(self.bytes.slice(self.pos..)))
    }
}

fn corrupt(table: &'static str, reason: String) -> StoreError {
    StoreError::CorruptRecord { table, reason }
}

impl Block {
    pub fn encode(&self) -> Vec<u8> {
        let raw = self.certificate.visible_bytes();
        let mut buf = Vec::with_capacity(BLOCK_HEADER_LEN + raw.len());
        buf.put_slice(self.id.as_bytes());
        buf.put_slice(self.previous_block_id.as_bytes());
        buf.put_slice(self.next_block_id.as_bytes());
        buf.put_u64(self.height);
        buf.put_u64(raw.len() as u64);
        buf.put_slice(&raw);
        buf
    }

    pub fn decode(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        let mut r = Reader::new("block", &bytes, BLOCK_HEADER_LEN)?;
        let id = r.id();
        let previous_block_id = r.id();
        let next_block_id = r.id();
        let height = r.u64();
        let size = r.u64();
        let certificate = r.certificate(size)?;
        Ok(Self {
            id,
            previous_block_id,
            next_block_id,
            height,
            certificate,
        })
    }

    /// Size of the block certificate in bytes, as stored.
    pub fn size(&self) -> usize {
        self.certificate.visible_size()
    }

    pub fn is_root(&self) -> bool {
        self.id == BlockId::ROOT
    }
}

impl Transaction {
    pub fn encode(&self) -> Vec<u8> {
        // Only the visible bytes are kept; an unsigned trailer never reaches the store.
        let raw = self.certificate.visible_bytes();
        let mut buf = Vec::with_capacity(TRANSACTION_HEADER_LEN + raw.len());
        buf.put_slice(self.id.as_bytes());
        buf.put_slice(self.block_id.as_bytes());
        buf.put_slice(self.previous_transaction_id.as_bytes());
        buf.put_slice(self.next_transaction_id.as_bytes());
        buf.put_u64(raw.len() as u64);
        buf.put_slice(&raw);
        buf
    }

    pub fn decode(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        let mut r = Reader::new("transaction", &bytes, TRANSACTION_HEADER_LEN)?;
        let id = r.id();
        let block_id = r.id();
        let previous_transaction_id = r.id();
        let next_transaction_id = r.id();
        let size = r.u64();
        let certificate = r.certificate(size)?;
        Ok(Self {
            id,
            block_id,
            previous_transaction_id,
            next_transaction_id,
            certificate,
        })
    }

    pub fn size(&self) -> usize {
        self.certificate.visible_size()
    }
}

impl Artifact {
    /// A new artifact whose first and last transaction are the same.
    pub fn new(id: ArtifactId, block_id: BlockId, transaction_id: TransactionId) -> Self {
        Self {
            id,
            first_block_id: block_id,
            first_transaction_id: transaction_id,
            last_block_id: block_id,
            last_transaction_id: transaction_id,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ARTIFACT_LEN);
        buf.put_slice(self.id.as_bytes());
        buf.put_slice(self.first_block_id.as_bytes());
        buf.put_slice(self.first_transaction_id.as_bytes());
        buf.put_slice(self.last_block_id.as_bytes());
        buf.put_slice(self.last_transaction_id.as_bytes());
        buf
    }

    pub fn decode(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() != ARTIFACT_LEN {
            return Err(corrupt(
                "artifact",
                format!("{} bytes, expected {}", bytes.len(), ARTIFACT_LEN),
            ));
        }
        let mut r = Reader::new("artifact", &bytes, ARTIFACT_LEN)?;
        Ok(Self {
            id: r.id(),
            first_block_id: r.id(),
            first_transaction_id: r.id(),
            last_block_id: r.id(),
            last_transaction_id: r.id(),
        })
    }
}

/// Height index key.
pub fn height_key(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}

/// Decode a height index value.
pub fn decode_block_id(bytes: &[u8]) -> Result<BlockId> {
    BlockId::try_from(bytes).map_err(|_| corrupt("height", format!("{} byte block id", bytes.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_layout() {
        let block = Block {
            id: BlockId::from_bytes([1; 16]),
            previous_block_id: BlockId::ROOT,
            next_block_id: BlockId::NIL,
            height: 7,
            certificate: Certificate::from_bytes(vec![0xaa; 5]),
        };
        let encoded = block.encode();

        assert_eq!(encoded.len(), BLOCK_HEADER_LEN + 5);
        assert_eq!(&encoded[..16], &[1; 16]);
        assert_eq!(&encoded[48..56], &7u64.to_be_bytes());
        assert_eq!(&encoded[56..64], &5u64.to_be_bytes());
        assert_eq!(Block::decode(encoded).unwrap(), block);
    }

    #[test]
    fn test_transaction_layout() {
        let tx = Transaction {
            id: TransactionId::from_bytes([2; 16]),
            block_id: BlockId::from_bytes([3; 16]),
            previous_transaction_id: TransactionId::NIL,
            next_transaction_id: TransactionId::from_bytes([4; 16]),
            certificate: Certificate::from_bytes(vec![0xbb; 3]),
        };
        let encoded = tx.encode();

        assert_eq!(encoded.len(), TRANSACTION_HEADER_LEN + 3);
        assert_eq!(&encoded[32..48], &[0; 16]);
        assert_eq!(Transaction::decode(encoded).unwrap(), tx);
    }

    #[test]
    fn test_artifact_layout() {
        let artifact = Artifact::new(
            ArtifactId::from_bytes([5; 16]),
            BlockId::from_bytes([6; 16]),
            TransactionId::from_bytes([7; 16]),
        );
        let encoded = artifact.encode();
        assert_eq!(encoded.len(), 80);
        assert_eq!(Artifact::decode(encoded).unwrap(), artifact);
    }

    #[test]
    fn test_corrupt_records_rejected() {
        assert!(matches!(
            Block::decode(vec![0u8; 10]),
            Err(StoreError::CorruptRecord { table: "block", .. })
        ));

        // Recorded size disagrees with the trailing bytes.
        let mut encoded = Transaction {
            id: TransactionId::from_bytes([2; 16]),
            block_id: BlockId::ROOT,
            previous_transaction_id: TransactionId::NIL,
            next_transaction_id: TransactionId::NIL,
            certificate: Certificate::from_bytes(vec![1, 2, 3]),
        }
        .encode();
        encoded.push(4);
        assert!(matches!(
            Transaction::decode(encoded),
            Err(StoreError::CorruptRecord { table: "transaction", .. })
        ));

        assert!(Artifact::decode(vec![0u8; 81]).is_err());
        assert!(decode_block_id(&[1, 2, 3]).is_err());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;
        use proptest::prelude::prop;

        proptest! {
            #[test]
            fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..200)) {
                let _ = Block::decode(bytes.clone());
                let _ = Transaction::decode(bytes.clone());
                let _ = Artifact::decode(bytes);
            }

            #[test]
            fn block_size_tracks_certificate(cert in prop::collection::vec(any::<u8>(), 0..256), height in any::<u64>()) {
                let block = Block {
                    id: BlockId::generate(),
                    previous_block_id: BlockId::ROOT,
                    next_block_id: BlockId::NIL,
                    height,
                    certificate: Certificate::from_bytes(cert.clone()),
                };
                let encoded = block.encode();
                prop_assert_eq!(encoded.len(), BLOCK_HEADER_LEN + cert.len());
                prop_assert_eq!(Block::decode(encoded).unwrap(), block);
            }
        }
    }
}
