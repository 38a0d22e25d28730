use sha2::{Digest, Sha256};

/// Number of leading hex zeros a valid proof's digest must start with
pub const DEFAULT_DIFFICULTY: usize = 4;

/// How many candidates are tried between checks of the stop condition
const STOP_CHECK_INTERVAL: u64 = 1024;

/// Proof of work puzzle
///
/// A proof `p` is valid against the previous proof `last` when the
/// hex-encoded SHA-256 of the decimal text `"{last}{p}"` starts with
/// `difficulty` `'0'` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: usize,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        ProofOfWork::new(DEFAULT_DIFFICULTY)
    }
}

impl ProofOfWork {
    /// Creates a puzzle with a fixed difficulty
    pub fn new(difficulty: usize) -> Self {
        ProofOfWork { difficulty }
    }

    /// Gets the number of leading zeros required
    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Finds the smallest proof satisfying the puzzle for `last_proof`
    ///
    /// Blocks the calling thread until a proof is found.
    pub fn solve(&self, last_proof: u64) -> u64 {
        let mut proof = 0;
        while !self.verify(last_proof, proof) {
            proof += 1;
        }
        proof
    }

    /// Like [`ProofOfWork::solve`], but gives up once `should_stop` returns true
    ///
    /// `should_stop` is polled once per `STOP_CHECK_INTERVAL` candidates,
    /// starting before the first one.
    ///
    /// # Returns
    ///
    /// The smallest valid proof, or `None` if the search was abandoned
    pub fn solve_until<F>(&self, last_proof: u64, should_stop: F) -> Option<u64>
    where
        F: Fn() -> bool,
    {
        let mut proof = 0;
        loop {
            if proof % STOP_CHECK_INTERVAL == 0 && should_stop() {
                return None;
            }
            if self.verify(last_proof, proof) {
                return Some(proof);
            }
            proof += 1;
        }
    }

    /// Checks whether `proof` solves the puzzle for `last_proof`
    pub fn verify(&self, last_proof: u64, proof: u64) -> bool {
        let guess = format!("{last_proof}{proof}");
        let digest = hex::encode(Sha256::digest(guess.as_bytes()));

        digest.len() >= self.difficulty
            && digest.as_bytes()[..self.difficulty].iter().all(|&c| c == b'0')
    }
}
