use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::block::Block;
use super::pow::ProofOfWork;
use super::validation::is_valid;

/// Reasons a candidate chain is rejected before validation
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("Reported length {reported} does not match {actual} blocks")]
    LengthMismatch { reported: usize, actual: usize },

    #[error("Malformed candidate: {0}")]
    Malformed(String),
}

/// A chain snapshot reported by a peer, together with its claimed length
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CandidateChain {
    /// Length the peer reported
    pub length: usize,

    /// Blocks the peer sent
    pub chain: Vec<Block>,
}

impl CandidateChain {
    /// Wraps a chain, reporting its actual length
    pub fn new(chain: Vec<Block>) -> Self {
        CandidateChain {
            length: chain.len(),
            chain,
        }
    }

    /// Decodes a peer's `/chain` response
    ///
    /// Blocks missing required fields make the whole candidate malformed.
    #[cfg(test)]
    pub fn from_json(body: &str) -> Result<Self, CandidateError> {
        serde_json::from_str(body).map_err(|e| CandidateError::Malformed(e.to_string()))
    }

    /// Decodes a candidate that has already been parsed as JSON
    pub fn from_value(value: serde_json::Value) -> Result<Self, CandidateError> {
        serde_json::from_value(value).map_err(|e| CandidateError::Malformed(e.to_string()))
    }

    /// Checks that the reported length matches the blocks sent
    pub fn check_length(&self) -> Result<(), CandidateError> {
        if self.length != self.chain.len() {
            return Err(CandidateError::LengthMismatch {
                reported: self.length,
                actual: self.chain.len(),
            });
        }
        Ok(())
    }
}

/// Outcome of a consensus round
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Resolution {
    /// Whether a candidate replaced the local chain
    pub adopted: bool,

    /// The chain in effect after the round
    pub chain: Vec<Block>,
}

/// Picks the longest valid chain among the local chain and the candidates
///
/// A candidate only wins if it is strictly longer than the best chain seen
/// so far and passes [`is_valid`]. The local chain itself is not validated.
///
/// # Returns
///
/// The winning candidate, or `None` if the local chain stands
pub fn select_longest(
    local_len: usize,
    candidates: Vec<CandidateChain>,
    pow: &ProofOfWork,
) -> Option<Vec<Block>> {
    let mut best_len = local_len;
    let mut best = None;

    for candidate in candidates {
        if candidate.length <= best_len {
            continue;
        }

        if let Err(err) = candidate.check_length() {
            warn!("Rejected candidate chain: {}", err);
            continue;
        }

        if !is_valid(&candidate.chain, pow) {
            warn!("Rejected invalid candidate chain of length {}", candidate.length);
            continue;
        }

        best_len = candidate.length;
        best = Some(candidate.chain);
    }

    best
}

/// Resolves the local chain against peer candidates
pub fn resolve(local: &[Block], candidates: Vec<CandidateChain>, pow: &ProofOfWork) -> Resolution {
    match select_longest(local.len(), candidates, pow) {
        Some(chain) => {
            info!("Adopting candidate chain of length {}", chain.len());
            Resolution {
                adopted: true,
                chain,
            }
        }
        None => Resolution {
            adopted: false,
            chain: local.to_vec(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::testing::build_chain;

    #[test]
    fn test_adopts_longest_valid_candidate() {
        let pow = ProofOfWork::new(2);
        let local = build_chain(3, &pow);
        let shorter = build_chain(2, &pow);
        let longer = build_chain(5, &pow);

        let resolution = resolve(
            &local,
            vec![CandidateChain::new(shorter), CandidateChain::new(longer.clone())],
            &pow,
        );

        assert!(resolution.adopted);
        assert_eq!(resolution.chain, longer);
    }

    #[test]
    fn test_keeps_local_when_longer_candidate_is_invalid() {
        let pow = ProofOfWork::new(2);
        let local = build_chain(3, &pow);
        let mut longer = build_chain(5, &pow);
        longer[2].previous_hash = "forged".to_string();

        let resolution = resolve(&local, vec![CandidateChain::new(longer)], &pow);

        assert!(!resolution.adopted);
        assert_eq!(resolution.chain, local);
    }

    #[test]
    fn test_equal_length_never_replaces_even_invalid_local() {
        let pow = ProofOfWork::new(2);
        let mut local = build_chain(3, &pow);
        local[1].proof += 1;
        let candidate = build_chain(3, &pow);

        let resolution = resolve(&local, vec![CandidateChain::new(candidate)], &pow);

        assert!(!resolution.adopted);
        assert_eq!(resolution.chain, local);
    }

    #[test]
    fn test_tracks_running_maximum() {
        let pow = ProofOfWork::new(2);
        let local = build_chain(2, &pow);
        let four = build_chain(4, &pow);
        let five = build_chain(5, &pow);
        let mut six = build_chain(6, &pow);
        six[5].previous_hash = "forged".to_string();

        let resolution = resolve(
            &local,
            vec![
                CandidateChain::new(five.clone()),
                CandidateChain::new(six),
                CandidateChain::new(four),
            ],
            &pow,
        );

        assert!(resolution.adopted);
        assert_eq!(resolution.chain, five);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let pow = ProofOfWork::new(2);
        let local = build_chain(2, &pow);
        let candidate = CandidateChain {
            length: 9,
            chain: build_chain(3, &pow),
        };

        assert!(matches!(
            candidate.check_length(),
            Err(CandidateError::LengthMismatch { reported: 9, actual: 3 })
        ));

        let resolution = resolve(&local, vec![candidate], &pow);
        assert!(!resolution.adopted);
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let body = r#"{"length": 1, "chain": [{"index": 1, "timestamp": 0.0, "proof": 100}]}"#;

        assert!(matches!(
            CandidateChain::from_json(body),
            Err(CandidateError::Malformed(_))
        ));
    }

    #[test]
    fn test_from_value_rejects_wrong_types() {
        let value = serde_json::json!({ "length": "two", "chain": [] });

        assert!(matches!(
            CandidateChain::from_value(value),
            Err(CandidateError::Malformed(_))
        ));
    }

    #[test]
    fn test_from_json_accepts_chain_response() {
        let pow = ProofOfWork::new(2);
        let chain = build_chain(2, &pow);
        let body = serde_json::json!({ "length": 2, "chain": chain }).to_string();

        let candidate = CandidateChain::from_json(&body).unwrap();

        assert_eq!(candidate.length, 2);
        assert_eq!(candidate.chain, chain);
        assert!(candidate.check_length().is_ok());
    }

    #[test]
    fn test_decoding_keeps_hashes_of_fractional_amounts() {
        let pow = ProofOfWork::new(2);
        let ledger = crate::blockchain::Ledger::with_pow(pow);
        let miner = crate::blockchain::Miner::new(ledger.clone(), "node-a", 3005.3140076386558);
        miner.mine().unwrap();
        miner.mine().unwrap();

        let chain = ledger.chain_snapshot().unwrap();
        let body = serde_json::json!({ "length": chain.len(), "chain": chain }).to_string();
        let candidate = CandidateChain::from_json(&body).unwrap();

        for (sent, received) in chain.iter().zip(&candidate.chain) {
            assert_eq!(sent.hash(), received.hash());
        }
        assert!(is_valid(&candidate.chain, &pow));

        let other = crate::blockchain::Ledger::with_pow(pow);
        assert!(other.resolve(vec![candidate]).unwrap().adopted);
        assert_eq!(other.chain_snapshot().unwrap(), chain);
    }
}
