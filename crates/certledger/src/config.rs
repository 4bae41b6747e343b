//! Ledger configuration.

/// Configuration for the [`Ledger`](crate::Ledger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Whether to attest certificates on submit.
    pub validate_on_submit: bool,
    /// Whether submit-time attestation also runs the type's contract.
    pub validate_contracts: bool,
    /// Maximum number of transactions waiting for the next block.
    pub max_pending: usize,
    /// How many discarded submissions keep a `Discarded` status. Older ones
    /// are forgotten and report no status.
    pub max_discarded: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            validate_on_submit: true,
            validate_contracts: false,
            max_pending: 1024,
            max_discarded: 1024,
        }
    }
}
