//! End-to-end tests applying short transaction chains to a [`CoinView`].

use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use std::sync::Arc;
use subcoin_coin_view::{CoinView, CoinViewOptions, CoinViewVersion, Error};

fn txout(spendable: bool) -> TxOut {
    let script = if spendable {
        vec![0x51]
    } else {
        vec![0x6a, 0x04, 0xde, 0xad, 0xbe, 0xef]
    };
    TxOut {
        value: Amount::from_sat(1_000),
        script_pubkey: ScriptBuf::from_bytes(script),
    }
}

fn txin(previous_output: OutPoint) -> TxIn {
    TxIn {
        previous_output,
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::new(),
    }
}

fn transaction(input: Vec<TxIn>, output: Vec<TxOut>) -> Arc<Transaction> {
    Arc::new(Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input,
        output,
    })
}

#[test]
fn coinbase_spent_through_two_transactions() {
    let mut view = CoinView::new();

    let mut coinbase_in = txin(OutPoint::null());
    coinbase_in.script_sig = ScriptBuf::from_bytes(vec![0x01, 0x2a]);
    let tc = transaction(vec![coinbase_in], vec![txout(true), txout(true)]);
    let tc_id = tc.compute_txid();

    view.insert(tc.clone()).unwrap();
    assert_eq!(view.txids().copied().collect::<Vec<_>>(), [tc_id]);
    assert_eq!(view.coin(&tc_id).unwrap().spendable(), 2);

    let t1 = transaction(vec![txin(OutPoint::new(tc_id, 0))], vec![txout(true)]);
    let t1_id = t1.compute_txid();

    view.insert(t1.clone()).unwrap();
    assert_eq!(view.len(), 2);
    assert_eq!(view.coin(&tc_id).unwrap().spendable(), 1);
    assert_eq!(view.coin(&t1_id).unwrap().spendable(), 1);

    let t2 = transaction(
        vec![txin(OutPoint::new(tc_id, 1)), txin(OutPoint::new(t1_id, 0))],
        vec![txout(false)],
    );

    view.insert(t2.clone()).unwrap();
    assert!(view.is_empty());
    assert_eq!(view.get(&tc_id), Err(Error::NotFound(tc_id)));
    assert_eq!(view.get(&t1_id), Err(Error::NotFound(t1_id)));
    assert!(!view.contains(&t2.compute_txid()));
}

#[test]
fn out_of_order_insert_is_reported() {
    let mut view = CoinView::new();

    let mut coinbase_in = txin(OutPoint::null());
    coinbase_in.script_sig = ScriptBuf::from_bytes(vec![0x01, 0x01]);
    let tc = transaction(vec![coinbase_in], vec![txout(true)]);
    let child = transaction(vec![txin(OutPoint::new(tc.compute_txid(), 0))], vec![txout(true)]);

    assert_eq!(
        view.insert(child.clone()),
        Err(Error::MissingCoin(OutPoint::new(tc.compute_txid(), 0)))
    );
    assert!(view.is_empty());

    view.insert(tc).unwrap();
    view.insert(child.clone()).unwrap();
    assert!(view.contains(&child.compute_txid()));
}

#[test]
fn replay_resumes_from_snapshot() {
    let mut coinbase_in = txin(OutPoint::null());
    coinbase_in.script_sig = ScriptBuf::from_bytes(vec![0x01, 0x07]);
    let tc = transaction(vec![coinbase_in], vec![txout(true), txout(false), txout(true)]);
    let t1 = transaction(
        vec![txin(OutPoint::new(tc.compute_txid(), 0))],
        vec![txout(true), txout(true)],
    );
    let t2 = transaction(
        vec![
            txin(OutPoint::new(tc.compute_txid(), 2)),
            txin(OutPoint::new(t1.compute_txid(), 1)),
        ],
        vec![txout(true)],
    );

    let mut full = CoinView::new();
    for tx in [&tc, &t1, &t2] {
        full.insert(Arc::clone(tx)).unwrap();
    }

    let mut partial = CoinView::new();
    partial.insert(tc.clone()).unwrap();
    partial.insert(t1.clone()).unwrap();

    let mut version = CoinViewVersion(1);
    let mut snapshot = Vec::new();
    partial.serialize(&mut snapshot, &mut version).unwrap();
    assert_eq!(version, CoinViewVersion::CURRENT);

    let mut resumed =
        CoinView::deserialize(&mut snapshot.as_slice(), &mut version, CoinViewOptions::new())
            .unwrap();
    assert_eq!(resumed, partial);

    resumed.insert(t2).unwrap();
    assert!(resumed.equals(&full));
    assert_eq!(resumed.len(), 2);
}
