use {
    crate::error::{Error, Result},
    solana_sdk::{
        pubkey::Pubkey,
        signature::{Keypair, Signer},
    },
    std::fmt,
};

/// A signing keypair acting as creator, member or fee payer
///
/// `Debug` and `Display` only ever print the public key
pub struct Identity {
    keypair: Keypair,
}

impl Identity {
    /// decodes a base58 encoded 64 byte secret key
    pub fn from_base58(secret: &str) -> Result<Self> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|err| Error::Identity(format!("secret is not valid base58 {err}")))?;
        Self::from_bytes(&bytes)
    }
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let keypair = Keypair::from_bytes(bytes)
            .map_err(|err| Error::Identity(format!("secret is not a valid keypair {err}")))?;
        Ok(Self { keypair })
    }
    pub fn generate() -> Self {
        Self {
            keypair: Keypair::new(),
        }
    }
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl From<Keypair> for Identity {
    fn from(keypair: Keypair) -> Self {
        Self { keypair }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("pubkey", &self.keypair.pubkey())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keypair.pubkey())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn test_identity_from_base58() {
        let keypair = Keypair::new();
        let encoded = keypair.to_base58_string();
        let identity = Identity::from_base58(&encoded).unwrap();
        assert_eq!(identity.pubkey(), keypair.pubkey());
        assert!(!format!("{identity:?}").contains(&encoded));
        assert_eq!(identity.to_string(), keypair.pubkey().to_string());

        assert!(matches!(
            Identity::from_base58("not-base58-0OIl"),
            Err(Error::Identity(_))
        ));
        assert!(matches!(
            Identity::from_base58(&bs58::encode([1u8; 12]).into_string()),
            Err(Error::Identity(_))
        ));
    }
}
