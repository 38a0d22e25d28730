// Blockchain module
//
// This module contains the ledger engine:
// - Block structure and content hashing
// - Transaction structure
// - Proof of work puzzle
// - Chain validation and consensus resolution
// - The ledger itself and the mining flow built on it

pub mod block;
pub mod chain;
pub mod consensus;
pub mod miner;
pub mod pow;
pub mod transaction;
pub mod validation;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Ledger, LedgerError};
pub use consensus::{CandidateChain, Resolution};
pub use miner::{Miner, MinerError};
pub use pow::ProofOfWork;
pub use transaction::Transaction;

#[cfg(test)]
pub(crate) mod testing {
    use super::{Block, ProofOfWork, Transaction};

    /// Builds a valid chain of `len` blocks on top of a fresh genesis block
    pub fn build_chain(len: usize, pow: &ProofOfWork) -> Vec<Block> {
        let mut chain = vec![Block::genesis()];
        while chain.len() < len {
            let last = &chain[chain.len() - 1];
            let proof = pow.solve(last.proof);
            let transactions = vec![Transaction::new_reward("miner", 1.0)];
            let block = Block::new(last.index + 1, transactions, proof, last.hash());
            chain.push(block);
        }
        chain
    }
}
