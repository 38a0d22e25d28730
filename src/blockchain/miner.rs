use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

use super::block::Block;
use super::chain::{Ledger, LedgerError};
use super::transaction::Transaction;

/// Errors that can occur while mining
#[derive(Debug, Error)]
pub enum MinerError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Mining cancelled")]
    Cancelled,
}

/// Mines blocks onto a ledger, paying a reward to this node
#[derive(Debug, Clone)]
pub struct Miner {
    ledger: Ledger,

    /// Identifier credited with the mining reward
    node_id: String,

    /// Mining reward per block
    reward: f64,

    /// Raised to abandon an in-progress search
    stop: Arc<AtomicBool>,

    /// Searches restarted because the tip moved underneath them
    restarts: Arc<AtomicU64>,
}

impl Miner {
    /// Creates a new miner
    ///
    /// # Arguments
    ///
    /// * `ledger` - The ledger to mine onto
    /// * `node_id` - The identifier receiving rewards
    /// * `reward` - The amount paid per block
    pub fn new(ledger: Ledger, node_id: impl Into<String>, reward: f64) -> Self {
        Miner {
            ledger,
            node_id: node_id.into(),
            reward,
            stop: Arc::new(AtomicBool::new(false)),
            restarts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Gets the identifier credited with rewards
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Gets how many searches were restarted on a newer tip
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Abandons any search in progress, and all future ones until [`Miner::reset`]
    pub fn cancel(&self) {
        info!("Cancelling mining");
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Cancels mining once `signal` completes
    ///
    /// Lets a shutdown signal release a search blocking a worker thread
    /// before the server starts waiting for in-flight requests.
    pub async fn cancel_when<F>(&self, signal: F)
    where
        F: Future<Output = ()>,
    {
        signal.await;
        self.cancel();
    }

    /// Allows mining again after [`Miner::cancel`]
    pub fn reset(&self) {
        self.stop.store(false, Ordering::Relaxed);
    }

    /// Solves the puzzle for the current tip and seals a block
    ///
    /// Blocks the calling thread for the duration of the search. If the tip
    /// changes while searching or before the block is sealed, the search
    /// restarts on the new tip.
    ///
    /// # Returns
    ///
    /// The newly mined block
    pub fn mine(&self) -> Result<Block, MinerError> {
        loop {
            let epoch = self.ledger.epoch();
            let tip = self.ledger.tip()?;
            let tip_hash = tip.hash();

            let solved = self
                .ledger
                .pow()
                .solve_until(tip.proof, || self.is_cancelled() || self.ledger.epoch() != epoch);

            let proof = match solved {
                Some(proof) => proof,
                None if self.is_cancelled() => return Err(MinerError::Cancelled),
                None => {
                    self.record_restart(tip.index);
                    continue;
                }
            };

            let reward = Transaction::new_reward(self.node_id.clone(), self.reward);
            match self.ledger.seal_on(&tip_hash, proof, reward) {
                Ok(block) => {
                    info!("Mined block {} with proof {}", block.index, block.proof);
                    return Ok(block);
                }
                Err(LedgerError::StaleTip { .. }) => self.record_restart(tip.index),
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn record_restart(&self, abandoned_index: u64) {
        let restarts = self.restarts.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            "Tip moved past block {} during mining, restarting on the new tip (restart #{})",
            abandoned_index, restarts
        );
    }
}
