//! Pending transaction pool
//!
//! Ordered, append-only until a seal drains the transactions it included.
//! Nothing is validated on the way in.

use crate::transaction::Transaction;

#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    /// Copy of the current contents, in submission order.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    /// Return the current contents and leave the pool empty.
    pub fn drain_snapshot(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.transactions)
    }

    /// Drop the first `count` transactions, the ones a committed block
    /// included.
    pub fn remove_sealed(&mut self, count: usize) {
        let count = count.min(self.transactions.len());
        self.transactions.drain(..count);
    }

    pub fn starts_with(&self, prefix: &[Transaction]) -> bool {
        self.transactions.starts_with(prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keeps_order_and_duplicates() {
        let mut pool = Mempool::new();
        let tx = Transaction::new("alice", "bob", 5.0);
        pool.add(tx.clone());
        pool.add(Transaction::new("bob", "carol", 1.0));
        pool.add(tx.clone());

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0], tx);
        assert_eq!(snapshot[2], tx);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_drain_snapshot_empties_pool() {
        let mut pool = Mempool::new();
        pool.add(Transaction::new("alice", "bob", 5.0));
        pool.add(Transaction::new("bob", "alice", 2.0));

        let drained = pool.drain_snapshot();
        assert_eq!(drained.len(), 2);
        assert!(pool.is_empty());
        assert!(pool.drain_snapshot().is_empty());
    }

    #[test]
    fn test_remove_sealed_keeps_later_entries() {
        let mut pool = Mempool::new();
        pool.add(Transaction::new("a", "b", 1.0));
        pool.add(Transaction::new("b", "c", 2.0));
        pool.add(Transaction::new("c", "d", 3.0));

        assert!(pool.starts_with(&[Transaction::new("a", "b", 1.0)]));
        pool.remove_sealed(2);
        assert_eq!(pool.snapshot(), vec![Transaction::new("c", "d", 3.0)]);

        pool.remove_sealed(10);
        assert!(pool.is_empty());
    }
}
