//! The in-memory UTXO set.


use crate::coin::Coin;
use crate::options::CoinViewOptions;
use crate::Error;
use bitcoin::consensus::encode::{self, VarInt};
use bitcoin::consensus::{Decodable, Encodable};
use bitcoin::io::{self, Read, Write};
use bitcoin::{Block, OutPoint, Transaction, Txid};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, LazyLock};

/// Coinbase txids that occur twice in the Bitcoin main chain (BIP30).
///
/// The second occurrence overwrites the first one in the view.
pub static DUPLICATE_COINBASE_TXIDS: LazyLock<[Txid; 2]> = LazyLock::new(|| {
    [
        // Block 91842, duplicate of the coinbase in block 91812.
        "d5d27987d2a3dfc724e359870c6644b40e497bdc0589a033220fe15429d88599",
        // Block 91880, duplicate of the coinbase in block 91722.
        "e3bf3d07d4b0375638d5f1db5255fe07ba2c4cb067cd81b84ee974b6585fb468",
    ]
    .map(|txid| txid.parse().expect("Duplicate coinbase txid must be valid hex"))
});

/// Returns `true` if `txid` is one of the [`DUPLICATE_COINBASE_TXIDS`].
pub fn is_duplicate_coinbase(txid: &Txid) -> bool {
    DUPLICATE_COINBASE_TXIDS.contains(txid)
}

/// Logs an event for the txid configured in [`CoinViewOptions::traced_txid`].
macro_rules! trace_txid {
    ($options:expr, $txid:expr, $($arg:tt)+) => {
        if $options.is_traced($txid) {
            tracing::debug!(target: "coin_view::trace", txid = %$txid, $($arg)+);
        }
    };
}

/// Format version written in front of a serialized [`CoinView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoinViewVersion(pub i32);

impl CoinViewVersion {
    /// The version any (de)serialization leaves behind.
    pub const CURRENT: Self = Self(2);
}

impl Default for CoinViewVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Set of transactions with at least one unspent output, keyed by txid.
///
/// Transactions must be inserted in the order they are applied on chain: the prevouts of a
/// transaction have to be present and unspent when it is inserted. Fully spent transactions are
/// pruned as soon as their last output is consumed.
///
/// The view does no locking of its own. Concurrent readers and a writer need external
/// synchronization, e.g. a `RwLock` around the whole view.
#[derive(Debug, Clone, Default)]
pub struct CoinView {
    coins: BTreeMap<Txid, Coin>,
    options: CoinViewOptions,
}

impl CoinView {
    /// Constructs an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs an empty view with the given options.
    pub fn with_options(options: CoinViewOptions) -> Self {
        Self {
            coins: BTreeMap::new(),
            options,
        }
    }

    pub fn options(&self) -> &CoinViewOptions {
        &self.options
    }

    /// Applies a transaction to the view.
    ///
    /// Spends the prevouts of a non-coinbase transaction, dropping every entry that runs out of
    /// spendable outputs, then adds the transaction itself unless none of its outputs is
    /// spendable.
    ///
    /// All checks run before the view is touched, on error the view is left as it was. An error
    /// means the caller applied an invalid transaction or broke the insertion order.
    pub fn insert(&mut self, tx: Arc<Transaction>) -> crate::Result<()> {
        self.insert_with_txid(tx.compute_txid(), tx)
    }

    /// Inserts `tx` keyed by `txid`, which [`CoinView::insert`] computes from `tx`.
    fn insert_with_txid(&mut self, txid: Txid, tx: Arc<Transaction>) -> crate::Result<()> {
        let is_coinbase = tx.is_coinbase();

        trace_txid!(self.options, &txid, "Inserting into coin view");

        if !is_coinbase {
            self.check_inputs(&tx)?;
        }

        let coin = Coin::new(tx);

        if !coin.is_exhausted() {
            self.check_duplicate(&txid)?;
        }

        if !is_coinbase {
            for input in &coin.tx().input {
                self.spend(input.previous_output)?;
            }
        }

        if coin.is_exhausted() {
            trace_txid!(
                self.options,
                &txid,
                "Not including in coin view, no spendable outputs"
            );
            tracing::trace!("Skipping {txid}, all outputs are provably unspendable");
            return Ok(());
        }

        trace_txid!(
            self.options,
            &txid,
            "Created coin with {} spendable outputs",
            coin.spendable()
        );

        if self.coins.insert(txid, coin).is_some() {
            tracing::warn!("Overwrote duplicate coinbase {txid} (BIP30)");
        }

        Ok(())
    }

    /// Applies all transactions of `block` in order.
    ///
    /// Stops at the first failing transaction, earlier ones stay applied.
    pub fn apply_block(&mut self, block: &Block) -> crate::Result<()> {
        for tx in &block.txdata {
            self.insert(Arc::new(tx.clone()))?;
        }

        tracing::debug!(
            "Applied block {} ({} txs), {} transactions in coin view",
            block.block_hash(),
            block.txdata.len(),
            self.coins.len()
        );

        Ok(())
    }

    /// Verifies every prevout of `tx` is present and unspent.
    fn check_inputs(&self, tx: &Transaction) -> crate::Result<()> {
        let mut seen = HashSet::with_capacity(tx.input.len());

        for input in &tx.input {
            let prevout = input.previous_output;

            let Some(coin) = self.coins.get(&prevout.txid) else {
                tracing::error!("Missing coin for prevout {prevout}");
                return Err(Error::MissingCoin(prevout));
            };

            coin.check_unspent(prevout.vout)?;

            if !seen.insert(prevout) {
                tracing::error!("Output {prevout} is spent twice by the same transaction");
                return Err(Error::AlreadySpent(prevout));
            }
        }

        Ok(())
    }

    /// Rejects a second entry for `txid` unless it is a BIP30 duplicate coinbase.
    fn check_duplicate(&self, txid: &Txid) -> crate::Result<()> {
        if self.coins.contains_key(txid) && !is_duplicate_coinbase(txid) {
            tracing::error!("Transaction {txid} is already in the coin view");
            return Err(Error::DuplicateKey(*txid));
        }

        Ok(())
    }

    fn spend(&mut self, prevout: OutPoint) -> crate::Result<()> {
        let coin = self
            .coins
            .get_mut(&prevout.txid)
            .ok_or(Error::MissingCoin(prevout))?;

        let exhausted = coin.spend(prevout.vout)?;

        trace_txid!(
            self.options,
            &prevout.txid,
            "Spent output #{} ({} spendable remain)",
            prevout.vout,
            coin.spendable()
        );

        if exhausted {
            self.coins.remove(&prevout.txid);
            trace_txid!(self.options, &prevout.txid, "Removing exhausted transaction");
            tracing::trace!("Pruned exhausted transaction {}", prevout.txid);
        }

        Ok(())
    }

    /// Returns the transaction body stored under `txid`.
    pub fn get(&self, txid: &Txid) -> crate::Result<&Transaction> {
        self.lookup(txid).map(|coin| &**coin.tx())
    }

    /// Returns a shared handle to the transaction stored under `txid`.
    pub fn get_shared(&self, txid: &Txid) -> crate::Result<Arc<Transaction>> {
        self.lookup(txid).map(|coin| Arc::clone(coin.tx()))
    }

    fn lookup(&self, txid: &Txid) -> crate::Result<&Coin> {
        trace_txid!(self.options, txid, "Get from coin view");

        self.coins.get(txid).ok_or_else(|| {
            tracing::error!("Missing txid {txid}");
            Error::NotFound(*txid)
        })
    }

    /// Returns the spend state of `txid`, if present.
    pub fn coin(&self, txid: &Txid) -> Option<&Coin> {
        self.coins.get(txid)
    }

    pub fn contains(&self, txid: &Txid) -> bool {
        self.coins.contains_key(txid)
    }

    /// Number of transactions in the view.
    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    /// Iterates over the entries in ascending txid order.
    pub fn iter(&self) -> impl Iterator<Item = (&Txid, &Coin)> {
        self.coins.iter()
    }

    pub fn txids(&self) -> impl Iterator<Item = &Txid> {
        self.coins.keys()
    }

    /// Returns the txids only in `self` and the txids only in `other`.
    pub fn key_set_diff(&self, other: &Self) -> (Vec<Txid>, Vec<Txid>) {
        let only_in_self = self
            .coins
            .keys()
            .filter(|txid| !other.coins.contains_key(*txid))
            .copied()
            .collect();
        let only_in_other = other
            .coins
            .keys()
            .filter(|txid| !self.coins.contains_key(*txid))
            .copied()
            .collect();
        (only_in_self, only_in_other)
    }

    /// Returns `true` if both views hold the same set of txids.
    ///
    /// Spend states are not compared. Every txid missing on either side is logged, which makes
    /// this suitable for consistency assertions between two replays.
    pub fn equals(&self, other: &Self) -> bool {
        let (only_in_self, only_in_other) = self.key_set_diff(other);

        for txid in &only_in_self {
            tracing::warn!("Other is missing txid {txid}");
        }

        for txid in &only_in_other {
            tracing::warn!("Self is missing txid {txid}");
        }

        only_in_self.is_empty() && only_in_other.is_empty()
    }

    /// Writes the view, returning the number of bytes written.
    ///
    /// Format: `version` as little-endian `i32`, compact-size entry count, then each txid
    /// followed by its coin, in ascending txid order.
    ///
    /// NOTE: `version` is set to [`CoinViewVersion::CURRENT`] afterwards, whatever was written.
    pub fn serialize<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        version: &mut CoinViewVersion,
    ) -> Result<usize, io::Error> {
        let mut len = version.0.consensus_encode(writer)?;
        len += VarInt(self.coins.len() as u64).consensus_encode(writer)?;

        for (txid, coin) in &self.coins {
            len += txid.consensus_encode(writer)?;
            len += coin.consensus_encode(writer)?;
        }

        *version = CoinViewVersion::CURRENT;

        Ok(len)
    }

    /// Reads a view written by [`CoinView::serialize`].
    ///
    /// The version found in the stream is stored into `version` and then, as with
    /// [`CoinView::serialize`], replaced by [`CoinViewVersion::CURRENT`]. It has no influence on
    /// decoding.
    pub fn deserialize<R: Read + ?Sized>(
        reader: &mut R,
        version: &mut CoinViewVersion,
        options: CoinViewOptions,
    ) -> Result<Self, encode::Error> {
        version.0 = i32::consensus_decode(reader)?;

        tracing::debug!("Reading coin view with format version {}", version.0);

        let VarInt(count) = VarInt::consensus_decode(reader)?;

        let mut coins = BTreeMap::new();
        for _ in 0..count {
            let txid = Txid::consensus_decode(reader)?;
            let coin = Coin::consensus_decode(reader)?;
            if coin.is_exhausted() {
                return Err(encode::Error::ParseFailed("exhausted coin in coin view"));
            }
            coins.insert(txid, coin);
        }

        *version = CoinViewVersion::CURRENT;

        tracing::debug!("Loaded {} transactions into coin view", coins.len());

        Ok(Self { coins, options })
    }

    /// Replaces the content of this view with the one read from `reader`, keeping the options.
    ///
    /// On error the view is left unchanged.
    pub fn load<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        version: &mut CoinViewVersion,
    ) -> Result<(), encode::Error> {
        let loaded = Self::deserialize(reader, version, self.options.clone())?;
        self.coins = loaded.coins;
        Ok(())
    }
}

impl PartialEq for CoinView {
    /// Key-set comparison, see [`CoinView::equals`].
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for CoinView {}
