//! Error types for the coin view.

use bitcoin::{OutPoint, Txid};

/// Contract violations detected by the coin view.
///
/// The view expects callers to hand in transactions that were already validated against the
/// current UTXO set and applied in ledger order. Each variant therefore points at a bug in the
/// caller rather than at a transient fault, and none of them is retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The output was spent before.
    #[error("Output already spent: {0}")]
    AlreadySpent(OutPoint),

    /// The output index is beyond the outputs of the referenced transaction.
    #[error("Output index out of range: {0}")]
    OutputOutOfRange(OutPoint),

    /// The prevout refers to a transaction with no entry in the view.
    #[error("Missing coin for prevout: {0}")]
    MissingCoin(OutPoint),

    /// An entry with this txid exists already and is not a known duplicate.
    #[error("Duplicate txid: {0}")]
    DuplicateKey(Txid),

    /// No entry for the requested txid.
    #[error("Txid not found: {0}")]
    NotFound(Txid),
}
