use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Sender used for mining rewards, which are minted rather than transferred
pub const REWARD_SENDER: &str = "0";

/// Represents a transfer record in the ledger
///
/// Transactions carry no signature and no balance checks: the ledger records
/// whatever it is given, in the order it was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's identifier
    pub sender: String,

    /// Recipient's identifier
    pub recipient: String,

    /// Amount being transferred
    pub amount: f64,
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// # Arguments
    ///
    /// * `sender` - The identifier of the sender
    /// * `recipient` - The identifier of the recipient
    /// * `amount` - The amount to transfer
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: f64) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Creates a mining reward paid to `recipient`
    pub fn new_reward(recipient: impl Into<String>, amount: f64) -> Self {
        Transaction::new(REWARD_SENDER, recipient, amount)
    }

    /// Checks if the transaction is a mining reward
    #[cfg(test)]
    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }
}
