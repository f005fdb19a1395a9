//! In-memory UTXO set tracking spendable outputs per transaction.
//!
//! Transactions are applied to a [`CoinView`] in chain order. Each transaction with at least one
//! spendable output gets a [`Coin`] recording which of its outputs have been spent; inputs of
//! later transactions consume those outputs, and a transaction is dropped from the view once all
//! its outputs are gone.
//!
//! ## Persistence
//!
//! The spent flags of a coin are stored bit-packed (see [`encode_bool_vec`]), and the whole
//! view can be written to and restored from a byte stream using the consensus encoding of the
//! `bitcoin` crate.
//!
//! ## Errors
//!
//! The view double-checks what an upstream validator already guarantees. Any [`Error`] it
//! returns reports a caller bug, such as an out of order insertion or a double spend, rather
//! than a recoverable condition.

mod bool_vec;
mod coin;
mod error;
mod options;
mod view;

pub use bool_vec::{decode_bool_vec, encode_bool_vec};
pub use coin::{Coin, is_provably_unspendable};
pub use error::Error;
pub use options::CoinViewOptions;
pub use view::{CoinView, CoinViewVersion, DUPLICATE_COINBASE_TXIDS, is_duplicate_coinbase};

/// Result type for coin view operations.
pub type Result<T> = std::result::Result<T, Error>;
