use std::collections::HashMap;

use crate::codec::{Decode, Decoder, Encode, Encoder};
use crate::error::{Error, Result};
use crate::transaction::Transaction;
use crate::types::{Address, Balance, Sha256};

/// An ordered container of unique transactions.
///
/// `add` is idempotent under transaction equality. `remove` swaps the last
/// element into the vacated slot, so callers must not rely on element order
/// after arbitrary removals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionsSet {
    txs: Vec<Transaction>,
}

impl TransactionsSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tx: Transaction) {
        if !self.contains(&tx) {
            self.txs.push(tx);
        }
    }

    pub fn contains(&self, tx: &Transaction) -> bool {
        self.txs.iter().any(|t| t == tx)
    }

    /// Look a transaction up by its canonical hash.
    pub fn find_by_hash(&self, hash: &Sha256) -> Option<&Transaction> {
        self.txs.iter().find(|t| t.hash_of() == *hash)
    }

    pub fn remove(&mut self, tx: &Transaction) {
        if let Some(index) = self.txs.iter().position(|t| t == tx) {
            self.txs.swap_remove(index);
        }
    }

    /// Remove every transaction contained in `other`.
    pub fn remove_set(&mut self, other: &TransactionsSet) {
        for tx in other.iter() {
            self.remove(tx);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.txs.iter()
    }

    /// Keep only the `n` transactions with the largest fees, ties broken by
    /// insertion order. Fails if `n` exceeds the current size.
    pub fn select_best_by_fee(&mut self, n: usize) -> Result<()> {
        if n > self.txs.len() {
            return Err(Error::InvalidArgument(
                "cannot select more transactions than the set holds".into(),
            ));
        }
        self.txs.sort_by(|a, b| b.fee().cmp(&a.fee())); // stable: ties keep insertion order
        self.txs.truncate(n);
        Ok(())
    }
}

impl<'a> IntoIterator for &'a TransactionsSet {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.txs.iter()
    }
}

impl Encode for TransactionsSet {
    fn encode(&self, enc: &mut Encoder) {
        self.txs.encode(enc);
    }
}

impl Decode for TransactionsSet {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            txs: Vec::<Transaction>::decode(dec)?,
        })
    }
}

/// Aggregate, per sender, the total `amount + fee` the set would deduct.
/// Used to pre-check that no account overspends within a single block.
pub fn aggregate_cost(set: &TransactionsSet) -> HashMap<Address, Balance> {
    let mut cost = HashMap::new();
    for tx in set {
        let entry = cost.entry(*tx.from()).or_insert_with(Balance::zero);
        *entry = entry.saturating_add(tx.amount()).saturating_add(Balance::from(tx.fee()));
    }
    cost
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(from_byte: u8, amount: u64, fee: u64) -> Transaction {
        Transaction::new(
            Address::from_bytes([from_byte; 20]),
            Address::from_bytes([0xEE; 20]),
            Balance::from(amount),
            fee,
            1_583_789_700 + amount, // distinct timestamps keep transactions distinct
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn add_is_idempotent() {
        let mut set = TransactionsSet::new();
        let t = tx(1, 100, 1);
        set.add(t.clone());
        assert!(set.contains(&t));
        assert_eq!(set.len(), 1);
        set.add(t.clone());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn find_by_hash_matches_canonical_hash() {
        let mut set = TransactionsSet::new();
        let t = tx(1, 100, 1);
        let hash = t.hash_of();
        set.add(t);
        assert!(set.find_by_hash(&hash).is_some());
        assert!(set.find_by_hash(&Sha256::compute(b"other")).is_none());
    }

    #[test]
    fn remove_swaps_last_into_slot() {
        let mut set = TransactionsSet::new();
        let a = tx(1, 10, 1);
        let b = tx(2, 20, 1);
        let c = tx(3, 30, 1);
        set.add(a.clone());
        set.add(b.clone());
        set.add(c.clone());

        set.remove(&a);
        assert_eq!(set.len(), 2);
        assert!(!set.contains(&a));
        // c was swapped into a's slot
        assert_eq!(set.iter().next(), Some(&c));
    }

    #[test]
    fn select_best_by_fee_keeps_largest() {
        let mut set = TransactionsSet::new();
        set.add(tx(1, 10, 5));
        set.add(tx(2, 20, 50));
        set.add(tx(3, 30, 1));
        set.add(tx(4, 40, 50));

        set.select_best_by_fee(2).unwrap();
        assert_eq!(set.len(), 2);
        let fees: Vec<u64> = set.iter().map(|t| t.fee()).collect();
        assert_eq!(fees, vec![50, 50]);
        // Insertion order among equal fees: sender 2 before sender 4.
        let froms: Vec<u8> = set.iter().map(|t| t.from().as_bytes()[0]).collect();
        assert_eq!(froms, vec![2, 4]);
    }

    #[test]
    fn select_more_than_size_fails() {
        let mut set = TransactionsSet::new();
        set.add(tx(1, 10, 1));
        assert!(set.select_best_by_fee(2).is_err());
    }

    #[test]
    fn aggregate_cost_sums_per_sender() {
        let mut set = TransactionsSet::new();
        set.add(tx(1, 80, 1));
        set.add(tx(1, 81, 1));
        set.add(tx(2, 10, 3));

        let cost = aggregate_cost(&set);
        assert_eq!(cost[&Address::from_bytes([1; 20])], Balance::from(163u64));
        assert_eq!(cost[&Address::from_bytes([2; 20])], Balance::from(13u64));
    }
}
