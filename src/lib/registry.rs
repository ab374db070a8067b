//! On-chain registration of the three contracts.

use tracing::info;

use crate::{
    codec::CodecError,
    crypto::commitment::state_digest,
    domain::{
        balance::BalanceRecord,
        payload::ContractName,
    },
    ports::{
        TxHash,
        ledger::{
            ContractRegistration,
            Ledger,
            LedgerError,
            Verifier,
        },
    },
};

const SMILE_TOKEN_PROGRAM_ID: [u8; 1] = [213];
const SMILE_PROGRAM_ID: [u8; 1] = [123];
const SMILE_STATE_DIGEST: &[u8] = b"666";
const SIGNATURE_STATE_DIGEST: [u8; 4] = [0; 4];

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("genesis commitment error: {0}")]
    Commitment(#[from] CodecError),
}

/// Registrations for every contract in payload index order.
pub fn registrations(
    genesis: &[BalanceRecord],
    ecdsa_vkey: &[u8],
) -> Result<Vec<ContractRegistration>, CodecError> {
    let token_digest = state_digest(genesis)?;
    let registrations = ContractName::ALL
        .into_iter()
        .map(|name| match name {
            ContractName::EcdsaSecp256r1 => ContractRegistration {
                verifier: Verifier::Noir,
                name,
                program_id: ecdsa_vkey.to_vec(),
                state_digest: SIGNATURE_STATE_DIGEST.to_vec(),
            },
            ContractName::Smile => ContractRegistration {
                verifier: Verifier::Cairo,
                name,
                program_id: SMILE_PROGRAM_ID.to_vec(),
                state_digest: SMILE_STATE_DIGEST.to_vec(),
            },
            ContractName::SmileToken => ContractRegistration {
                verifier: Verifier::Cairo,
                name,
                program_id: SMILE_TOKEN_PROGRAM_ID.to_vec(),
                state_digest: token_digest.clone(),
            },
        })
        .collect();
    Ok(registrations)
}

/// Register whichever contracts the ledger does not know yet. Returns the
/// registration transactions that were sent.
pub async fn ensure_contracts_registered<L: Ledger>(
    ledger: &L,
    genesis: &[BalanceRecord],
    ecdsa_vkey: &[u8],
) -> Result<Vec<(ContractName, TxHash)>, RegistryError> {
    let mut sent = Vec::new();
    for registration in registrations(genesis, ecdsa_vkey)? {
        if ledger.contract_exists(registration.name).await? {
            info!(contract = %registration.name, "contract already registered");
            continue;
        }
        let tx_hash = ledger.register_contract(&registration).await?;
        info!(
            contract = %registration.name,
            verifier = %registration.verifier,
            %tx_hash,
            "registered contract"
        );
        sent.push((registration.name, tx_hash));
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::mock_ledger::MockLedger,
        domain::store::{
            FAUCET,
            FAUCET_SUPPLY,
        },
    };

    fn genesis() -> Vec<BalanceRecord> {
        vec![BalanceRecord::new(FAUCET, FAUCET_SUPPLY)]
    }

    #[test]
    fn test_token_digest_is_decimal_commitment() {
        let regs = registrations(&genesis(), b"vk").unwrap();
        let token = &regs[ContractName::SmileToken.index() as usize];
        assert_eq!(token.verifier, Verifier::Cairo);
        assert_eq!(token.program_id, vec![213]);
        assert_eq!(
            token.state_digest,
            b"95927562366440383359018660894961339954542870317162229166382402099283962792".to_vec()
        );
    }

    #[test]
    fn test_signature_contract_uses_vkey() {
        let regs = registrations(&genesis(), &[1, 2, 3]).unwrap();
        let ecdsa = &regs[0];
        assert_eq!(ecdsa.name, ContractName::EcdsaSecp256r1);
        assert_eq!(ecdsa.verifier, Verifier::Noir);
        assert_eq!(ecdsa.program_id, vec![1, 2, 3]);
        assert_eq!(ecdsa.state_digest, vec![0, 0, 0, 0]);
        assert_eq!(regs[1].state_digest, b"666".to_vec());
        assert_eq!(regs[1].program_id, vec![123]);
    }

    #[tokio::test]
    async fn test_registers_missing_contracts_only() {
        let ledger = MockLedger::new();
        let first = ensure_contracts_registered(&ledger, &genesis(), b"vk")
            .await
            .unwrap();
        assert_eq!(first.len(), 3);

        let second = ensure_contracts_registered(&ledger, &genesis(), b"vk")
            .await
            .unwrap();
        assert!(second.is_empty());
        assert_eq!(ledger.registrations().await.len(), 3);
    }
}
