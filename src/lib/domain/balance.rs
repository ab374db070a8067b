use serde::{
    Deserialize,
    Serialize,
};

/// A named account's integer balance.
///
/// Lists of records are order sensitive: the commitment hash folds them
/// in the order given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub name: String,
    pub amount: u128,
}

impl BalanceRecord {
    pub fn new(name: impl Into<String>, amount: u128) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

/// A transfer intent, built once per user action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferArgs {
    pub from: String,
    pub to: String,
    pub amount: u128,
}

/// A transfer recovered from a payload or a settled proof output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub from: String,
    pub to: String,
    pub amount: u128,
}

impl From<TransferArgs> for TransferEvent {
    fn from(args: TransferArgs) -> Self {
        Self {
            from: args.from,
            to: args.to,
            amount: args.amount,
        }
    }
}

/// Pixel or feature vector attached to the image program's payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBlobArgs {
    pub image: Vec<u64>,
}
