//! Balance commitment: a left fold of the serialized balance list through a
//! two-input hash, used as the token contract's initial state digest.

use num_bigint::BigUint;
use starknet_crypto::{
    FieldElement,
    pedersen_hash,
};

use crate::{
    codec::{
        CodecError,
        payload::serialize_balance,
    },
    domain::balance::BalanceRecord,
};

/// Two-input mixing hash folded over the commitment tokens.
pub trait Hash2 {
    fn hash2(&self, acc: &FieldElement, x: &FieldElement) -> FieldElement;
}

/// Pedersen hash over the STARK curve.
#[derive(Debug, Clone, Copy, Default)]
pub struct StarkPedersen;

impl Hash2 for StarkPedersen {
    fn hash2(&self, acc: &FieldElement, x: &FieldElement) -> FieldElement {
        pedersen_hash(acc, x)
    }
}

/// `["0", count, serialize(record)..., n + 1]` where `n` is the number of
/// serialized record tokens.
pub fn commitment_tokens(records: &[BalanceRecord]) -> Vec<String> {
    let serialized: Vec<String> = records.iter().flat_map(serialize_balance).collect();
    let terminator = serialized.len() + 1;

    let mut tokens = Vec::with_capacity(serialized.len() + 3);
    tokens.push("0".to_string());
    tokens.push(records.len().to_string());
    tokens.extend(serialized);
    tokens.push(terminator.to_string());
    tokens
}

pub fn hash_balances_with<H: Hash2>(
    hasher: &H,
    records: &[BalanceRecord],
) -> Result<BigUint, CodecError> {
    let mut felts = commitment_tokens(records)
        .iter()
        .map(|token| felt_from_decimal(token))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    let Some(first) = felts.next() else {
        return Ok(BigUint::default());
    };
    let digest = felts.fold(first, |acc, x| hasher.hash2(&acc, &x));
    Ok(BigUint::from_bytes_be(&digest.to_bytes_be()))
}

pub fn hash_balances(records: &[BalanceRecord]) -> Result<BigUint, CodecError> {
    hash_balances_with(&StarkPedersen, records)
}

/// ASCII bytes of the decimal commitment, the form registered on chain.
pub fn state_digest(records: &[BalanceRecord]) -> Result<Vec<u8>, CodecError> {
    Ok(hash_balances(records)?.to_string().into_bytes())
}

fn felt_from_decimal(token: &str) -> Result<FieldElement, CodecError> {
    FieldElement::from_dec_str(token).map_err(|_| CodecError::InvalidNumber(token.to_string()))
}
