use bitcoin::Txid;

/// Configuration options for [`CoinView`](crate::CoinView).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoinViewOptions {
    /// Transaction whose lifecycle in the view is logged in detail at `debug` level under the
    /// `coin_view::trace` target.
    ///
    /// Useful for chasing a single txid through a long replay without enabling `trace` for
    /// every transaction.
    pub traced_txid: Option<Txid>,
}

impl CoinViewOptions {
    /// Create new options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the txid to trace.
    pub fn with_traced_txid(mut self, txid: Txid) -> Self {
        self.traced_txid = Some(txid);
        self
    }

    pub(crate) fn is_traced(&self, txid: &Txid) -> bool {
        self.traced_txid.as_ref() == Some(txid)
    }
}
