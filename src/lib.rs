//! A minimal single-node proof-of-work ledger.
//!
//! The [`blockchain`] module holds the ledger engine: blocks, the proof of
//! work puzzle, chain validation and longest-valid-chain consensus. The
//! [`api`] module exposes it over HTTP.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod peers;
