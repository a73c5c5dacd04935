//! program derived addresses used by the squads v4 program
use {
    super::v4::ID,
    crate::error::{Error, Result},
    solana_sdk::pubkey::Pubkey,
};

pub const SEED_PREFIX: &[u8] = b"multisig";
pub const SEED_PROGRAM_CONFIG: &[u8] = b"program_config";
pub const SEED_MULTISIG: &[u8] = b"multisig";
pub const SEED_VAULT: &[u8] = b"vault";
pub const SEED_TRANSACTION: &[u8] = b"transaction";
pub const SEED_PROPOSAL: &[u8] = b"proposal";

/// Searches for the canonical bump of `seeds` under `program_id`
pub fn derive(program_id: &Pubkey, seeds: &[&[u8]]) -> Result<(Pubkey, u8)> {
    Pubkey::try_find_program_address(seeds, program_id).ok_or(Error::AddressDerivation {
        program_id: *program_id,
    })
}

pub fn program_config_pda() -> Result<(Pubkey, u8)> {
    derive(&ID, &[SEED_PREFIX, SEED_PROGRAM_CONFIG])
}

/// The create key is a permanent seed, so each create key maps to exactly one multisig
pub fn multisig_pda(create_key: &Pubkey) -> Result<(Pubkey, u8)> {
    derive(&ID, &[SEED_PREFIX, SEED_MULTISIG, create_key.as_ref()])
}

pub fn vault_pda(multisig: &Pubkey, vault_index: u8) -> Result<(Pubkey, u8)> {
    derive(
        &ID,
        &[SEED_PREFIX, multisig.as_ref(), SEED_VAULT, &[vault_index]],
    )
}

pub fn transaction_pda(multisig: &Pubkey, transaction_index: u64) -> Result<(Pubkey, u8)> {
    derive(
        &ID,
        &[
            SEED_PREFIX,
            multisig.as_ref(),
            SEED_TRANSACTION,
            &transaction_index.to_le_bytes(),
        ],
    )
}

pub fn proposal_pda(multisig: &Pubkey, transaction_index: u64) -> Result<(Pubkey, u8)> {
    derive(
        &ID,
        &[
            SEED_PREFIX,
            multisig.as_ref(),
            SEED_TRANSACTION,
            &transaction_index.to_le_bytes(),
            SEED_PROPOSAL,
        ],
    )
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn test_derivation_is_deterministic() {
        let create_key = Pubkey::new_unique();
        let (multisig, bump) = multisig_pda(&create_key).unwrap();
        assert_eq!((multisig, bump), multisig_pda(&create_key).unwrap());
        assert!(!multisig.is_on_curve());

        let (vault, _) = vault_pda(&multisig, 0).unwrap();
        assert_eq!(vault, vault_pda(&multisig, 0).unwrap().0);
        assert_ne!(vault, vault_pda(&multisig, 1).unwrap().0);

        let (tx_1, _) = transaction_pda(&multisig, 1).unwrap();
        let (tx_2, _) = transaction_pda(&multisig, 2).unwrap();
        assert_ne!(tx_1, tx_2);
        assert_ne!(tx_1, proposal_pda(&multisig, 1).unwrap().0);

        assert_ne!(multisig, multisig_pda(&Pubkey::new_unique()).unwrap().0);
    }
    #[test]
    fn test_matches_manual_seed_layout() {
        let create_key = Pubkey::new_unique();
        assert_eq!(
            multisig_pda(&create_key).unwrap(),
            Pubkey::find_program_address(&[b"multisig", b"multisig", create_key.as_ref()], &ID)
        );
        assert_eq!(
            program_config_pda().unwrap(),
            Pubkey::find_program_address(&[b"multisig", b"program_config"], &ID)
        );
        let multisig = multisig_pda(&create_key).unwrap().0;
        assert_eq!(
            proposal_pda(&multisig, 7).unwrap(),
            Pubkey::find_program_address(
                &[
                    b"multisig",
                    multisig.as_ref(),
                    b"transaction",
                    &7u64.to_le_bytes(),
                    b"proposal"
                ],
                &ID
            )
        );
    }
    #[test]
    fn test_known_addresses() {
        assert_eq!(
            "BSTq9w3kZwNwpBXJEvTZz2G9ZTNyKBvoSeXMvwb4cNZr",
            program_config_pda().unwrap().0.to_string()
        );
        let multisig = multisig_pda(
            &"ByzxzJLuH9pfe6pnKBDFfFnEPxiPkvppPr4pjbwte9Sx"
                .parse()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(
            ("8A7PNX5skryd8NHxprzYiCPWWykJfy14ik3GWoEjE8SZ".to_string(), 254),
            (multisig.0.to_string(), multisig.1)
        );
        assert_eq!(
            "8xDsHSf44sHNn693bFahJTUU8w8XTgqZAW9fn56WQtJX",
            vault_pda(&multisig.0, 0).unwrap().0.to_string()
        );
        assert_eq!(
            "7p9jPbkez9SYASHpq1kXLQReYjB8WjuN1btFGu8DMbJG",
            transaction_pda(&multisig.0, 1).unwrap().0.to_string()
        );
        assert_eq!(
            "HhNgyCUHRe97EDfYNboRGaPSWkcDHMv3xcWvDYjqrjth",
            proposal_pda(&multisig.0, 1).unwrap().0.to_string()
        );
    }
}
