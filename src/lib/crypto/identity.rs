use sha2::{
    Digest,
    Sha256,
};

/// Suffix that routes an identity to the signature-verification contract.
pub const IDENTITY_SUFFIX: &str = ".ecdsa_secp256r1";

/// `hex(sha256(x ‖ y)[12..]) + ".ecdsa_secp256r1"`.
pub fn identity_from_public_key(x: &[u8; 32], y: &[u8; 32]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(x);
    hasher.update(y);
    let digest = hasher.finalize();
    format!("{}{IDENTITY_SUFFIX}", hex::encode(&digest[12..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_keeps_last_twenty_bytes() {
        let x = [1u8; 32];
        let y = [2u8; 32];
        let identity = identity_from_public_key(&x, &y);

        let mut both = x.to_vec();
        both.extend_from_slice(&y);
        let digest = Sha256::digest(&both);

        assert_eq!(identity, format!("{}.ecdsa_secp256r1", hex::encode(&digest[12..])));
        assert_eq!(identity.len(), 40 + IDENTITY_SUFFIX.len());
    }

    #[test]
    fn test_identity_depends_on_both_coordinates() {
        assert_ne!(
            identity_from_public_key(&[1; 32], &[2; 32]),
            identity_from_public_key(&[2; 32], &[1; 32])
        );
    }
}
