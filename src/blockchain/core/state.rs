use crate::mempool::Mempool;
use crate::transaction::Transaction;

use super::chain::Blockchain;

/// Balance every user identifier implicitly starts with.
pub const DEFAULT_INITIAL_ALLOWANCE: f64 = 100.0;

/// Derives balances by replaying the ledger and the pending pool.
///
/// Pending debits are reserved immediately; pending credits are deferred
/// until the transaction is sealed. No floor is enforced, so balances may go
/// negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceOracle {
    initial_allowance: f64,
}

impl Default for BalanceOracle {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_ALLOWANCE)
    }
}

impl BalanceOracle {
    pub fn new(initial_allowance: f64) -> Self {
        Self { initial_allowance }
    }

    pub fn initial_allowance(&self) -> f64 {
        self.initial_allowance
    }

    pub fn balance_of(&self, user: &str, chain: &Blockchain, pool: &Mempool) -> f64 {
        let settled = chain
            .blocks()
            .iter()
            .flat_map(|block| block.transactions.iter())
            .fold(self.initial_allowance, |balance, tx| settle(balance, tx, user));

        pool.iter()
            .filter(|tx| tx.sender == user)
            .fold(settled, |balance, tx| balance - tx.amount)
    }
}

fn settle(mut balance: f64, tx: &Transaction, user: &str) -> f64 {
    if tx.sender == user {
        balance -= tx.amount;
    }
    if tx.recipient == user {
        balance += tx.amount;
    }
    balance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seal(chain: &mut Blockchain, txs: &[(&str, &str, f64)]) {
        let mut pool = Mempool::new();
        for (sender, recipient, amount) in txs {
            pool.add(Transaction::new(*sender, *recipient, *amount));
        }
        chain.seal(&mut pool, "miner").unwrap();
    }

    #[test]
    fn test_untouched_user_has_initial_allowance() {
        let chain = Blockchain::new(1);
        let pool = Mempool::new();
        assert_eq!(BalanceOracle::default().balance_of("nobody", &chain, &pool), 100.0);
    }

    #[test]
    fn test_sealed_transfer_moves_funds_both_ways() {
        let mut chain = Blockchain::new(1);
        seal(&mut chain, &[("alice", "bob", 30.0)]);
        let pool = Mempool::new();
        let oracle = BalanceOracle::default();

        assert_eq!(oracle.balance_of("alice", &chain, &pool), 70.0);
        assert_eq!(oracle.balance_of("bob", &chain, &pool), 130.0);
    }

    #[test]
    fn test_pending_debit_applies_but_pending_credit_waits() {
        let chain = Blockchain::new(1);
        let mut pool = Mempool::new();
        pool.add(Transaction::new("alice", "carol", 20.0));
        let oracle = BalanceOracle::default();

        assert_eq!(oracle.balance_of("alice", &chain, &pool), 80.0);
        assert_eq!(oracle.balance_of("carol", &chain, &pool), 100.0);
    }

    #[test]
    fn test_balances_replay_across_blocks_and_may_go_negative() {
        let mut chain = Blockchain::new(1);
        seal(&mut chain, &[("alice", "bob", 60.0), ("bob", "carol", 10.0)]);
        seal(&mut chain, &[("alice", "dave", 70.0)]);
        let mut pool = Mempool::new();
        pool.add(Transaction::new("bob", "alice", 5.0));
        let oracle = BalanceOracle::default();

        assert_eq!(oracle.balance_of("alice", &chain, &pool), -30.0);
        assert_eq!(oracle.balance_of("bob", &chain, &pool), 145.0);
        assert_eq!(oracle.balance_of("carol", &chain, &pool), 110.0);
        assert_eq!(oracle.balance_of("dave", &chain, &pool), 170.0);
    }

    #[test]
    fn test_self_transfer_nets_zero_once_sealed() {
        let mut chain = Blockchain::new(1);
        let mut pool = Mempool::new();
        pool.add(Transaction::new("alice", "alice", 25.0));
        let oracle = BalanceOracle::default();

        assert_eq!(oracle.balance_of("alice", &chain, &pool), 75.0);
        chain.seal(&mut pool, "alice").unwrap();
        assert_eq!(oracle.balance_of("alice", &chain, &pool), 100.0);
    }

    #[test]
    fn test_custom_allowance() {
        let chain = Blockchain::new(1);
        let pool = Mempool::new();
        let oracle = BalanceOracle::new(250.0);
        assert_eq!(oracle.initial_allowance(), 250.0);
        assert_eq!(oracle.balance_of("anyone", &chain, &pool), 250.0);
    }
}
