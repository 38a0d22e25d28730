use log::debug;

use super::block::Block;
use super::pow::ProofOfWork;

/// Validates a chain of blocks
///
/// Checks every adjacent pair of blocks for hash linkage and proof of work.
/// Chains with zero or one block are trivially valid, and the first block
/// is not compared against any canonical genesis.
///
/// # Returns
///
/// true if the chain is valid, false on the first violation
pub fn is_valid(chain: &[Block], pow: &ProofOfWork) -> bool {
    for pair in chain.windows(2) {
        let (previous_block, current_block) = (&pair[0], &pair[1]);

        // Check if the previous hash is correct
        if current_block.previous_hash != previous_block.hash() {
            debug!("Block {} does not link to its predecessor", current_block.index);
            return false;
        }

        // Check if the proof of work is correct
        if !pow.verify(previous_block.proof, current_block.proof) {
            debug!("Block {} carries an invalid proof", current_block.index);
            return false;
        }
    }

    true
}
