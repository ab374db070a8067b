//! Argument strings for the two VM programs.
//!
//! The runner reads whitespace separated felts, `[...]` delimiting an array
//! argument. Both programs take the combined payload as their last argument.

use super::{
    encode_byte_array,
    payload::serialize_balance,
};
use crate::domain::balance::BalanceRecord;

/// `<encode(identity)> <combined>`.
pub fn smile_program_args(identity: &str, combined: &str) -> String {
    format!("{} {combined}", encode_byte_array(identity))
}

/// `[<n> <serialize(balance)>...] <combined>`.
pub fn smile_token_program_args(balances: &[BalanceRecord], combined: &str) -> String {
    let mut tokens = vec![balances.len().to_string()];
    tokens.extend(balances.iter().flat_map(serialize_balance));
    format!("[{}] {combined}", tokens.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smile_args() {
        assert_eq!(
            smile_program_args("faucet", "[3 1 1 0 1 9]"),
            "0 112568767309172 6 [3 1 1 0 1 9]"
        );
    }

    #[test]
    fn test_smile_token_args() {
        let balances = vec![BalanceRecord::new("faucet", 1_000_000)];
        assert_eq!(
            smile_token_program_args(&balances, "[3 0 0 0]"),
            "[1 0 112568767309172 6 1000000] [3 0 0 0]"
        );
        assert_eq!(smile_token_program_args(&[], "[3 0 0 0]"), "[0] [3 0 0 0]");
    }
}
