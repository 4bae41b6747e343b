//! Strong identifier types for the ledger.
//!
//! All identifiers are 16-byte UUIDs wrapped in newtypes so a block id can
//! never be passed where a transaction id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;
use crate::field::FieldType;

/// Size of every identifier on the wire and in storage.
pub const ID_LEN: usize = 16;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// The zero id, used as the "none" sentinel.
            pub const NIL: Self = Self(Uuid::nil());

            /// Generate a fresh random id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            /// Get the raw bytes.
            pub fn as_bytes(&self) -> &[u8; ID_LEN] {
                self.0.as_bytes()
            }

            /// Parse from a field value, which must be exactly 16 bytes.
            pub fn from_field(field: FieldType, value: &[u8]) -> Result<Self, CoreError> {
                let bytes: [u8; ID_LEN] =
                    value.try_into().map_err(|_| CoreError::InvalidFieldLength {
                        field,
                        expected: ID_LEN,
                        actual: value.len(),
                    })?;
                Ok(Self::from_bytes(bytes))
            }

            /// Whether this is the zero sentinel.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// `None` for the zero sentinel.
            pub fn non_nil(self) -> Option<Self> {
                if self.is_nil() {
                    None
                } else {
                    Some(self)
                }
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.as_bytes())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }

        impl From<[u8; ID_LEN]> for $name {
            fn from(bytes: [u8; ID_LEN]) -> Self {
                Self::from_bytes(bytes)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = std::array::TryFromSliceError;

            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; ID_LEN] = slice.try_into()?;
                Ok(Self::from_bytes(arr))
            }
        }
    };
}

define_id!(
    /// Identifier of a block.
    BlockId
);

define_id!(
    /// Identifier of a ledger transaction. Globally unique.
    TransactionId
);

define_id!(
    /// Identifier of an artifact whose state evolves through transactions.
    ArtifactId
);

define_id!(
    /// Identifier of a signing entity.
    EntityId
);

impl BlockId {
    /// The well-known id of the root (height 0) block.
    pub const ROOT: Self = Self::from_bytes([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nil_sentinel() {
        assert!(TransactionId::NIL.is_nil());
        assert_eq!(TransactionId::NIL.non_nil(), None);

        let id = TransactionId::generate();
        assert!(!id.is_nil());
        assert_eq!(id.non_nil(), Some(id));
    }

    #[test]
    fn test_root_block_is_not_nil() {
        assert!(!BlockId::ROOT.is_nil());
        assert_eq!(BlockId::ROOT.as_bytes()[15], 1);
    }

    #[test]
    fn test_from_field_rejects_wrong_length() {
        let err = ArtifactId::from_field(FieldType::ARTIFACT_ID, &[0u8; 15]).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidFieldLength {
                field: FieldType::ARTIFACT_ID,
                expected: 16,
                actual: 15
            }
        );

        let ok = ArtifactId::from_field(FieldType::ARTIFACT_ID, &[0xab; 16]).unwrap();
        assert_eq!(ok.as_bytes(), &[0xab; 16]);
    }

    #[test]
    fn test_hex_and_display() {
        let id = EntityId::from_bytes([0xcd; 16]);
        assert_eq!(id.to_hex(), "cd".repeat(16));
        assert_eq!(format!("{}", id), "cdcdcdcd-cdcd-cdcd-cdcd-cdcdcdcdcdcd");
        assert!(format!("{:?}", id).starts_with("EntityId("));
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = BlockId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let back: BlockId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
