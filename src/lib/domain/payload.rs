use std::{
    fmt,
    str::FromStr,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::codec::{
    CodecError,
    combine_payloads,
};

/// The three contracts a single user action is proven against.
///
/// The discriminant is the payload index shared with the on-chain registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractName {
    EcdsaSecp256r1 = 0,
    Smile = 1,
    SmileToken = 2,
}

impl ContractName {
    /// All contracts in payload index order.
    pub const ALL: [ContractName; 3] = [
        ContractName::EcdsaSecp256r1,
        ContractName::Smile,
        ContractName::SmileToken,
    ];

    /// Proof transactions are always broadcast in this order.
    pub const SUBMISSION_ORDER: [ContractName; 3] = [
        ContractName::SmileToken,
        ContractName::Smile,
        ContractName::EcdsaSecp256r1,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContractName::EcdsaSecp256r1 => "ecdsa_secp256r1",
            ContractName::Smile => "smile",
            ContractName::SmileToken => "smile_token",
        }
    }
}

impl fmt::Display for ContractName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContractName::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown contract: {s}"))
    }
}

/// A contract-addressed chunk of application data attached to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub contract_name: ContractName,
    pub data: Vec<u8>,
}

/// The three payload strings of one user action.
///
/// Read-only once built; every proving service receives the same
/// [`PayloadSet::combined`] string and slices out its own part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSet {
    pub signature: String,
    pub image: String,
    pub transfer: String,
}

impl PayloadSet {
    pub fn get(&self, contract: ContractName) -> &str {
        match contract {
            ContractName::EcdsaSecp256r1 => &self.signature,
            ContractName::Smile => &self.image,
            ContractName::SmileToken => &self.transfer,
        }
    }

    pub fn combined(&self) -> String {
        combine_payloads(&self.signature, &self.image, &self.transfer)
    }

    /// Rebuild the set from the blobs of a payload transaction. Blobs are
    /// matched by contract name, in any order; each contract must appear
    /// exactly once.
    pub fn from_blobs(blobs: &[Blob]) -> Result<Self, CodecError> {
        let mut parts: [Option<String>; 3] = Default::default();
        for blob in blobs {
            let contract = blob.contract_name;
            let slot = &mut parts[contract.index() as usize];
            if slot.is_some() {
                return Err(CodecError::MalformedPayload(format!(
                    "duplicate blob for {contract}"
                )));
            }
            let text = std::str::from_utf8(&blob.data).map_err(|e| {
                CodecError::MalformedPayload(format!("{contract} blob is not utf-8: {e}"))
            })?;
            *slot = Some(text.to_string());
        }

        let missing = |contract: ContractName| {
            CodecError::MalformedPayload(format!("missing blob for {contract}"))
        };
        let [signature, image, transfer] = parts;
        Ok(Self {
            signature: signature.ok_or_else(|| missing(ContractName::EcdsaSecp256r1))?,
            image: image.ok_or_else(|| missing(ContractName::Smile))?,
            transfer: transfer.ok_or_else(|| missing(ContractName::SmileToken))?,
        })
    }

    /// Blobs for the payload transaction, in payload index order.
    pub fn blobs(&self) -> Vec<Blob> {
        ContractName::ALL
            .into_iter()
            .map(|contract_name| Blob {
                contract_name,
                data: self.get(contract_name).as_bytes().to_vec(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_match_registry() {
        assert_eq!(ContractName::EcdsaSecp256r1.index(), 0);
        assert_eq!(ContractName::Smile.index(), 1);
        assert_eq!(ContractName::SmileToken.index(), 2);
    }

    #[test]
    fn test_submission_order_is_descending_index() {
        let indices: Vec<u32> = ContractName::SUBMISSION_ORDER
            .iter()
            .map(|c| c.index())
            .collect();
        assert_eq!(indices, vec![2, 1, 0]);
    }

    #[test]
    fn test_contract_name_roundtrips_through_str() {
        for contract in ContractName::ALL {
            assert_eq!(contract.as_str().parse::<ContractName>().unwrap(), contract);
        }
        assert!("erc20".parse::<ContractName>().is_err());
    }

    #[test]
    fn test_contract_name_serde_uses_wire_names() {
        let json = serde_json::to_string(&ContractName::SmileToken).unwrap();
        assert_eq!(json, "\"smile_token\"");
    }

    #[test]
    fn test_blobs_are_in_index_order() {
        let set = PayloadSet {
            signature: "1 9".into(),
            image: "2 4 5".into(),
            transfer: "1 7".into(),
        };
        let blobs = set.blobs();
        assert_eq!(blobs[0].contract_name, ContractName::EcdsaSecp256r1);
        assert_eq!(blobs[0].data, b"1 9");
        assert_eq!(blobs[2].data, b"1 7");
        assert_eq!(set.combined(), "[3 1 9 2 4 5 1 7]");
    }

    #[test]
    fn test_from_blobs_matches_by_contract_name() {
        let set = PayloadSet {
            signature: "1 9".into(),
            image: "2 4 5".into(),
            transfer: "1 7".into(),
        };
        let mut blobs = set.blobs();
        blobs.reverse();
        assert_eq!(PayloadSet::from_blobs(&blobs).unwrap(), set);
    }

    #[test]
    fn test_from_blobs_rejects_missing_or_duplicate_contracts() {
        let blobs = PayloadSet {
            signature: "1 9".into(),
            image: "0".into(),
            transfer: "1 7".into(),
        }
        .blobs();

        let err = PayloadSet::from_blobs(&blobs[..2]).unwrap_err();
        assert_eq!(
            err,
            CodecError::MalformedPayload("missing blob for smile_token".into())
        );

        let mut duplicated = blobs.clone();
        duplicated.push(blobs[1].clone());
        let err = PayloadSet::from_blobs(&duplicated).unwrap_err();
        assert_eq!(err, CodecError::MalformedPayload("duplicate blob for smile".into()));
    }
}
