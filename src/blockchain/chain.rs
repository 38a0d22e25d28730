use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use log::{info, warn};

use super::block::Block;
use super::consensus::{select_longest, CandidateChain, Resolution};
use super::pow::ProofOfWork;
use super::transaction::Transaction;
use super::validation::is_valid;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Chain has no blocks")]
    EmptyChain,

    #[error("Tip changed: expected {expected}, found {actual}")]
    StaleTip { expected: String, actual: String },

    #[error("System error: {0}")]
    SystemError(String),
}

/// Chain and pending pool, always mutated together under one lock
#[derive(Debug)]
struct LedgerState {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

impl LedgerState {
    fn tip(&self) -> Result<&Block, LedgerError> {
        self.chain.last().ok_or(LedgerError::EmptyChain)
    }

    /// Seals the pending pool into a new block and appends it
    fn append_block(&mut self, proof: u64, previous_hash: Option<String>) -> Result<Block, LedgerError> {
        let previous_hash = match previous_hash {
            Some(hash) => hash,
            None => self.tip()?.hash(),
        };

        let transactions = std::mem::take(&mut self.pending);
        let block = Block::new(self.chain.len() as u64 + 1, transactions, proof, previous_hash);

        self.chain.push(block.clone());
        Ok(block)
    }
}

/// Represents the ledger: the chain of blocks plus transactions waiting to be sealed
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Chain and pending transactions
    state: Arc<Mutex<LedgerState>>,

    /// Bumped whenever the tip changes, by an append or a replacement
    epoch: Arc<AtomicU64>,

    /// Puzzle used to validate chains
    pow: ProofOfWork,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Creates a new ledger with a genesis block at the default difficulty
    pub fn new() -> Self {
        Self::with_pow(ProofOfWork::default())
    }

    /// Creates a new ledger with a genesis block
    ///
    /// # Arguments
    ///
    /// * `pow` - The puzzle every block after genesis must solve
    pub fn with_pow(pow: ProofOfWork) -> Self {
        let state = LedgerState {
            chain: vec![Block::genesis()],
            pending: Vec::new(),
        };

        Ledger {
            state: Arc::new(Mutex::new(state)),
            epoch: Arc::new(AtomicU64::new(0)),
            pow,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
        self.state
            .lock()
            .map_err(|e| LedgerError::SystemError(format!("Ledger lock poisoned: {}", e)))
    }

    /// Gets the tip epoch
    ///
    /// Two reads returning the same value mean the tip did not change in
    /// between. Read it before [`Ledger::tip`] to detect a later change.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Marks a tip change; called with the state lock held
    fn advance_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Gets the proof of work puzzle
    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    /// Seals all pending transactions into a new block
    ///
    /// The proof is not checked here; callers are expected to have solved
    /// the puzzle against the tip.
    ///
    /// # Arguments
    ///
    /// * `proof` - The proof of work
    /// * `previous_hash` - The hash of the previous block, defaults to the tip's hash
    ///
    /// # Returns
    ///
    /// The newly appended block
    pub fn create_block(&self, proof: u64, previous_hash: Option<String>) -> Result<Block, LedgerError> {
        let block = {
            let mut state = self.lock()?;
            let block = state.append_block(proof, previous_hash)?;
            self.advance_epoch();
            block
        };
        info!("Sealed block {} with {} transactions", block.index, block.transactions.len());
        Ok(block)
    }

    /// Seals a block only if the tip is still the one the proof was solved against
    ///
    /// The reward is appended to the pending pool in the same critical section,
    /// so a competing chain can never receive a half-built block.
    pub fn seal_on(&self, expected_tip_hash: &str, proof: u64, reward: Transaction) -> Result<Block, LedgerError> {
        let mut state = self.lock()?;

        let tip_hash = state.tip()?.hash();
        if tip_hash != expected_tip_hash {
            return Err(LedgerError::StaleTip {
                expected: expected_tip_hash.to_string(),
                actual: tip_hash,
            });
        }

        state.pending.push(reward);
        let block = state.append_block(proof, Some(tip_hash))?;
        self.advance_epoch();
        info!("Sealed block {} with {} transactions", block.index, block.transactions.len());
        Ok(block)
    }

    /// Adds a new transaction to the pending pool
    ///
    /// # Arguments
    ///
    /// * `sender` - The sender's identifier
    /// * `recipient` - The recipient's identifier
    /// * `amount` - The amount to transfer
    ///
    /// # Returns
    ///
    /// The index of the block that will include this transaction
    pub fn submit_transaction(
        &self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: f64,
    ) -> Result<u64, LedgerError> {
        let mut state = self.lock()?;
        let next_index = state.tip()?.index + 1;

        state.pending.push(Transaction::new(sender, recipient, amount));
        Ok(next_index)
    }

    /// Gets the last block in the chain
    pub fn tip(&self) -> Result<Block, LedgerError> {
        self.lock()?.tip().cloned()
    }

    /// Gets a copy of the entire chain
    pub fn chain_snapshot(&self) -> Result<Vec<Block>, LedgerError> {
        Ok(self.lock()?.chain.clone())
    }

    /// Gets a copy of the pending transactions
    pub fn pending_transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.lock()?.pending.clone())
    }

    /// Gets the number of blocks in the chain
    pub fn len(&self) -> Result<usize, LedgerError> {
        Ok(self.lock()?.chain.len())
    }

    /// Checks whether the chain has no blocks, which only a broken genesis allows
    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.lock()?.chain.is_empty())
    }

    /// Validates an arbitrary chain against this ledger's puzzle
    pub fn is_valid_chain(&self, chain: &[Block]) -> bool {
        is_valid(chain, &self.pow)
    }

    /// Validates the local chain
    pub fn is_valid(&self) -> Result<bool, LedgerError> {
        let chain = self.chain_snapshot()?;
        Ok(self.is_valid_chain(&chain))
    }

    /// Replaces the local chain with the longest valid candidate, if any is longer
    ///
    /// Candidates are validated without holding the lock. The swap itself
    /// happens under the lock and is skipped if the local chain has grown
    /// past the winner in the meantime. Pending transactions are kept.
    pub fn resolve(&self, candidates: Vec<CandidateChain>) -> Result<Resolution, LedgerError> {
        let local_len = self.len()?;
        let winner = select_longest(local_len, candidates, &self.pow);

        let mut state = self.lock()?;
        let adopted = match winner {
            Some(chain) if chain.len() > state.chain.len() => {
                info!(
                    "Replacing local chain of length {} with candidate of length {}",
                    state.chain.len(),
                    chain.len()
                );
                state.chain = chain;
                self.advance_epoch();
                true
            }
            Some(chain) => {
                warn!(
                    "Discarding candidate of length {}: local chain grew to {}",
                    chain.len(),
                    state.chain.len()
                );
                false
            }
            None => false,
        };

        Ok(Resolution {
            adopted,
            chain: state.chain.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::block::GENESIS_PREVIOUS_HASH;
    use crate::blockchain::testing::build_chain;

    #[test]
    fn test_new_ledger() {
        let ledger = Ledger::new();
        let chain = ledger.chain_snapshot().unwrap();

        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].index, 1);
        assert_eq!(chain[0].previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(ledger.pending_transactions().unwrap().is_empty());
    }

    #[test]
    fn test_submit_transaction() {
        let ledger = Ledger::new();

        assert_eq!(ledger.submit_transaction("alice", "bob", 10.0).unwrap(), 2);
        assert_eq!(ledger.submit_transaction("alice", "bob", 10.0).unwrap(), 2);

        // Duplicates are kept
        let pending = ledger.pending_transactions().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0], pending[1]);
    }

    #[test]
    fn test_create_block_seals_pending_in_order() {
        let ledger = Ledger::new();
        ledger.submit_transaction("alice", "bob", 10.0).unwrap();
        ledger.submit_transaction("bob", "carol", 3.5).unwrap();
        let genesis = ledger.tip().unwrap();

        let block = ledger.create_block(12345, None).unwrap();

        assert_eq!(block.index, 2);
        assert_eq!(block.proof, 12345);
        assert_eq!(block.previous_hash, genesis.hash());
        assert_eq!(
            block.transactions,
            vec![
                Transaction::new("alice", "bob", 10.0),
                Transaction::new("bob", "carol", 3.5),
            ]
        );
        assert!(ledger.pending_transactions().unwrap().is_empty());
        assert_eq!(ledger.tip().unwrap(), block);
    }

    #[test]
    fn test_create_block_with_explicit_previous_hash() {
        let ledger = Ledger::new();
        let block = ledger.create_block(1, Some("custom".to_string())).unwrap();

        assert_eq!(block.previous_hash, "custom");
        assert_eq!(ledger.len().unwrap(), 2);
    }

    #[test]
    fn test_end_to_end_mining() {
        let ledger = Ledger::new();
        ledger.submit_transaction("A", "B", 10.0).unwrap();

        let genesis = ledger.tip().unwrap();
        let proof = ledger.pow().solve(genesis.proof);
        ledger.submit_transaction("0", "node", 1.0).unwrap();
        let block = ledger.create_block(proof, None).unwrap();

        let chain = ledger.chain_snapshot().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(block.transactions[0], Transaction::new("A", "B", 10.0));
        assert!(block.transactions[1].is_reward());
        assert!(ledger.is_valid_chain(&chain));
        assert!(ledger.is_valid().unwrap());
    }

    #[test]
    fn test_seal_on_rejects_stale_tip() {
        let ledger = Ledger::with_pow(ProofOfWork::new(2));
        ledger.submit_transaction("alice", "bob", 1.0).unwrap();

        let result = ledger.seal_on("not-the-tip", 0, Transaction::new_reward("node", 1.0));

        assert!(matches!(result, Err(LedgerError::StaleTip { .. })));
        assert_eq!(ledger.len().unwrap(), 1);
        assert_eq!(ledger.pending_transactions().unwrap().len(), 1);
    }

    #[test]
    fn test_seal_on_appends_reward_last() {
        let ledger = Ledger::with_pow(ProofOfWork::new(2));
        ledger.submit_transaction("alice", "bob", 1.0).unwrap();
        let tip = ledger.tip().unwrap();
        let proof = ledger.pow().solve(tip.proof);

        let block = ledger
            .seal_on(&tip.hash(), proof, Transaction::new_reward("node", 1.0))
            .unwrap();

        assert_eq!(block.transactions.len(), 2);
        assert!(block.transactions[1].is_reward());
        assert!(ledger.is_valid().unwrap());
    }

    #[test]
    fn test_resolve_adopts_longer_chain_and_keeps_pending() {
        let pow = ProofOfWork::new(2);
        let ledger = Ledger::with_pow(pow);
        ledger.submit_transaction("alice", "bob", 1.0).unwrap();
        let longer = build_chain(4, &pow);

        let resolution = ledger.resolve(vec![CandidateChain::new(longer.clone())]).unwrap();

        assert!(resolution.adopted);
        assert_eq!(resolution.chain, longer);
        assert_eq!(ledger.chain_snapshot().unwrap(), longer);
        assert_eq!(ledger.pending_transactions().unwrap().len(), 1);
        assert_eq!(ledger.submit_transaction("alice", "bob", 1.0).unwrap(), 5);
    }

    #[test]
    fn test_resolve_keeps_local_chain() {
        let pow = ProofOfWork::new(2);
        let ledger = Ledger::with_pow(pow);
        let local = ledger.chain_snapshot().unwrap();
        let mut forged = build_chain(3, &pow);
        forged[1].previous_hash = "forged".to_string();

        let resolution = ledger.resolve(vec![CandidateChain::new(forged)]).unwrap();

        assert!(!resolution.adopted);
        assert_eq!(resolution.chain, local);
        assert_eq!(ledger.chain_snapshot().unwrap(), local);
    }

    #[test]
    fn test_epoch_tracks_tip_changes() {
        let pow = ProofOfWork::new(2);
        let ledger = Ledger::with_pow(pow);
        let start = ledger.epoch();

        ledger.submit_transaction("alice", "bob", 1.0).unwrap();
        assert_eq!(ledger.epoch(), start);

        ledger.create_block(1, None).unwrap();
        assert_eq!(ledger.epoch(), start + 1);

        // A rejected candidate leaves the tip alone
        ledger.resolve(vec![CandidateChain::new(build_chain(2, &pow))]).unwrap();
        assert_eq!(ledger.epoch(), start + 1);

        ledger.resolve(vec![CandidateChain::new(build_chain(4, &pow))]).unwrap();
        assert_eq!(ledger.epoch(), start + 2);
    }

    #[test]
    fn test_fresh_ledger_is_not_empty() {
        let ledger = Ledger::new();
        assert!(!ledger.is_empty().unwrap());
    }

    #[test]
    fn test_clones_share_state() {
        let ledger = Ledger::new();
        let other = ledger.clone();

        other.submit_transaction("alice", "bob", 1.0).unwrap();

        assert_eq!(ledger.pending_transactions().unwrap().len(), 1);
    }
}
