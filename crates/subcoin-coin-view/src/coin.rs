//! Per-transaction spend tracking.

use crate::bool_vec::{decode_bool_vec, encode_bool_vec};
use crate::Error;
use bitcoin::consensus::{Decodable, Encodable, encode};
use bitcoin::io::{self, Read, Write};
use bitcoin::{OutPoint, Transaction, TxOut, Txid};
use std::sync::Arc;

/// Scripts larger than this can never be executed.
const MAX_SCRIPT_SIZE: usize = 10_000;

/// Returns `true` if the output can never be spent.
///
/// Mirrors `CScript::IsUnspendable` in Bitcoin Core: the script starts with `OP_RETURN` or
/// exceeds the maximum script size.
pub fn is_provably_unspendable(txout: &TxOut) -> bool {
    txout.script_pubkey.is_op_return() || txout.script_pubkey.len() > MAX_SCRIPT_SIZE
}

/// Spent state of the outputs of a single transaction.
///
/// The transaction body is shared: the coin holds one handle to it, any number of other
/// holders may keep theirs, and the body is released with the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    tx: Arc<Transaction>,
    /// One flag per output, `true` once spent or if the output is provably unspendable.
    spent: Vec<bool>,
    /// Number of `false` entries in `spent`.
    spendable: u32,
}

impl Coin {
    /// Creates the coin of a freshly applied transaction.
    ///
    /// Provably unspendable outputs start out spent and never count as spendable.
    pub fn new(tx: Arc<Transaction>) -> Self {
        let spent = tx.output.iter().map(is_provably_unspendable).collect::<Vec<_>>();
        let spendable = spent.iter().filter(|spent| !**spent).count() as u32;
        Self {
            tx,
            spent,
            spendable,
        }
    }

    /// Marks output `vout` as spent.
    ///
    /// Returns `true` if no spendable output remains afterwards, in which case the coin should
    /// be dropped. A failed call leaves the coin unchanged.
    pub fn spend(&mut self, vout: u32) -> crate::Result<bool> {
        self.check_unspent(vout)?;
        self.spent[vout as usize] = true;
        self.spendable -= 1;
        Ok(self.spendable == 0)
    }

    /// Checks that `vout` exists and has not been spent.
    pub(crate) fn check_unspent(&self, vout: u32) -> crate::Result<()> {
        match self.spent.get(vout as usize) {
            Some(false) => Ok(()),
            Some(true) => {
                let outpoint = OutPoint::new(self.txid(), vout);
                tracing::error!("Output {outpoint} is already spent");
                Err(Error::AlreadySpent(outpoint))
            }
            None => {
                let outpoint = OutPoint::new(self.txid(), vout);
                tracing::error!(
                    "Output {outpoint} out of range, transaction has {} outputs",
                    self.spent.len()
                );
                Err(Error::OutputOutOfRange(outpoint))
            }
        }
    }

    /// Returns the transaction body.
    pub fn tx(&self) -> &Arc<Transaction> {
        &self.tx
    }

    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }

    /// Number of outputs still spendable.
    pub fn spendable(&self) -> u32 {
        self.spendable
    }

    pub fn is_exhausted(&self) -> bool {
        self.spendable == 0
    }

    /// Returns whether output `vout` is spent, `None` if it does not exist.
    pub fn is_spent(&self, vout: u32) -> Option<bool> {
        self.spent.get(vout as usize).copied()
    }

    /// Spent flags of all outputs, index-aligned with the transaction outputs.
    pub fn spent(&self) -> &[bool] {
        &self.spent
    }
}

impl Encodable for Coin {
    fn consensus_encode<W: Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut len = self.tx.consensus_encode(writer)?;
        len += encode_bool_vec(writer, &self.spent)?;
        Ok(len)
    }
}

impl Decodable for Coin {
    /// Restores a coin from its persisted form.
    ///
    /// The spendable count is taken from the stored flags as-is, the unspendable classification
    /// is not derived again.
    fn consensus_decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, encode::Error> {
        let tx = Transaction::consensus_decode(reader)?;
        let (spent, unspent) = decode_bool_vec(reader)?;

        if spent.len() != tx.output.len() {
            return Err(encode::Error::ParseFailed(
                "spent flags do not match the transaction outputs",
            ));
        }

        let spendable = u32::try_from(unspent)
            .map_err(|_| encode::Error::ParseFailed("spendable count overflows u32"))?;

        Ok(Self {
            tx: Arc::new(tx),
            spent,
            spendable,
        })
    }
}
