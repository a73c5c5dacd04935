//! the compact message format `vault_transaction_create` expects as its
//! `transaction_message` argument
//!
//! it mirrors a v0 message without the blockhash, but vectors are length prefixed with a u8
//! (u16 for instruction data) instead of borsh's u32 or the shortvec used on the wire
use {
    super::v4::{
        MultisigCompiledInstruction, MultisigMessageAddressTableLookup, VaultTransactionMessage,
    },
    crate::error::Result,
    borsh::{BorshDeserialize, BorshSerialize},
    solana_sdk::{hash::Hash, instruction::Instruction, message::v0, pubkey::Pubkey},
    std::{
        io::{Error as IoError, ErrorKind, Read, Write},
        marker::PhantomData,
    },
};

/// Vector whose borsh length prefix has the width of `L`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SmallVec<L, T>(Vec<T>, PhantomData<L>);

impl<L, T> SmallVec<L, T> {
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<L, T> From<Vec<T>> for SmallVec<L, T> {
    fn from(value: Vec<T>) -> Self {
        Self(value, PhantomData)
    }
}

impl<L, T> std::ops::Deref for SmallVec<L, T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        &self.0
    }
}

macro_rules! impl_small_vec_borsh {
    ($len:ty) => {
        impl<T: BorshSerialize> BorshSerialize for SmallVec<$len, T> {
            fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
                let len = <$len>::try_from(self.0.len()).map_err(|_| {
                    IoError::new(
                        ErrorKind::InvalidInput,
                        format!("vector of {} items exceeds {}", self.0.len(), <$len>::MAX),
                    )
                })?;
                writer.write_all(&len.to_le_bytes())?;
                for item in &self.0 {
                    item.serialize(writer)?;
                }
                Ok(())
            }
        }

        impl<T: BorshDeserialize> BorshDeserialize for SmallVec<$len, T> {
            fn deserialize_reader<R: Read>(reader: &mut R) -> std::io::Result<Self> {
                let len = <$len>::deserialize_reader(reader)?;
                let mut items = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    items.push(T::deserialize_reader(reader)?);
                }
                Ok(Self(items, PhantomData))
            }
        }
    };
}

impl_small_vec_borsh!(u8);
impl_small_vec_borsh!(u16);

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransactionMessage {
    pub num_signers: u8,
    pub num_writable_signers: u8,
    pub num_writable_non_signers: u8,
    pub account_keys: SmallVec<u8, Pubkey>,
    pub instructions: SmallVec<u8, CompiledInstruction>,
    pub address_table_lookups: SmallVec<u8, MessageAddressTableLookup>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indexes: SmallVec<u8, u8>,
    pub data: SmallVec<u16, u8>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct MessageAddressTableLookup {
    pub account_key: Pubkey,
    pub writable_indexes: SmallVec<u8, u8>,
    pub readonly_indexes: SmallVec<u8, u8>,
}

impl TransactionMessage {
    /// Compiles `instructions` with `payer` (the vault) as fee payer and first signer
    ///
    /// the multisig program supplies the blockhash at execution time so none is embedded
    pub fn try_compile(payer: &Pubkey, instructions: &[Instruction]) -> Result<Self> {
        let compiled = v0::Message::try_compile(payer, instructions, &[], Hash::default())?;
        Ok(Self::from(compiled))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(borsh::to_vec(self)?)
    }

    /// The form the program stores inside the vault transaction account
    pub fn to_vault_transaction_message(&self) -> VaultTransactionMessage {
        VaultTransactionMessage {
            num_signers: self.num_signers,
            num_writable_signers: self.num_writable_signers,
            num_writable_non_signers: self.num_writable_non_signers,
            account_keys: self.account_keys.to_vec(),
            instructions: self
                .instructions
                .iter()
                .map(|ix| MultisigCompiledInstruction {
                    program_id_index: ix.program_id_index,
                    account_indexes: ix.account_indexes.to_vec(),
                    data: ix.data.to_vec(),
                })
                .collect(),
            address_table_lookups: self
                .address_table_lookups
                .iter()
                .map(|lookup| MultisigMessageAddressTableLookup {
                    account_key: lookup.account_key,
                    writable_indexes: lookup.writable_indexes.to_vec(),
                    readonly_indexes: lookup.readonly_indexes.to_vec(),
                })
                .collect(),
        }
    }
}

impl From<v0::Message> for TransactionMessage {
    fn from(message: v0::Message) -> Self {
        let header = message.header;
        let num_signers = header.num_required_signatures;
        Self {
            num_signers,
            num_writable_signers: num_signers - header.num_readonly_signed_accounts,
            num_writable_non_signers: (message.account_keys.len() as u8)
                .saturating_sub(num_signers)
                .saturating_sub(header.num_readonly_unsigned_accounts),
            account_keys: message.account_keys.into(),
            instructions: message
                .instructions
                .into_iter()
                .map(|ix| CompiledInstruction {
                    program_id_index: ix.program_id_index,
                    account_indexes: ix.accounts.into(),
                    data: ix.data.into(),
                })
                .collect::<Vec<_>>()
                .into(),
            address_table_lookups: message
                .address_table_lookups
                .into_iter()
                .map(|lookup| MessageAddressTableLookup {
                    account_key: lookup.account_key,
                    writable_indexes: lookup.writable_indexes.into(),
                    readonly_indexes: lookup.readonly_indexes.into(),
                })
                .collect::<Vec<_>>()
                .into(),
        }
    }
}

#[cfg(test)]
mod test {
    use {super::*, solana_sdk::system_instruction, solana_sdk::system_program};

    #[test]
    fn test_compile_vault_transfer() {
        let vault = Pubkey::new_unique();
        let recipient = Pubkey::new_unique();
        let message = TransactionMessage::try_compile(
            &vault,
            &[system_instruction::transfer(&vault, &recipient, 3_000_000)],
        )
        .unwrap();
        assert_eq!(message.num_signers, 1);
        assert_eq!(message.num_writable_signers, 1);
        assert_eq!(message.num_writable_non_signers, 1);
        assert_eq!(
            &message.account_keys[..],
            &[vault, recipient, system_program::id()]
        );
        assert_eq!(message.instructions.len(), 1);
        assert_eq!(message.instructions[0].program_id_index, 2);
        assert_eq!(&message.instructions[0].account_indexes[..], &[0, 1]);
        assert!(message.address_table_lookups.is_empty());

        let bytes = message.to_bytes().unwrap();
        // 3 header bytes, u8 key count, 3 keys, u8 ix count, program index, u8 account
        // count, 2 accounts, u16 data length, 12 byte transfer, u8 lookup count
        assert_eq!(bytes.len(), 3 + 1 + 96 + 1 + 1 + 1 + 2 + 2 + 12 + 1);
        assert_eq!(&bytes[0..4], &[1, 1, 1, 3]);
        assert_eq!(TransactionMessage::try_from_slice(&bytes).unwrap(), message);

        let stored = message.to_vault_transaction_message();
        assert_eq!(stored.account_keys, vec![vault, recipient, system_program::id()]);
        assert_eq!(stored.instructions[0].data.len(), 12);
    }

    #[test]
    fn test_small_vec_length_limit() {
        let too_long: SmallVec<u8, u8> = vec![0u8; 256].into();
        assert!(borsh::to_vec(&too_long).is_err());
        let fits: SmallVec<u16, u8> = vec![0u8; 256].into();
        assert_eq!(borsh::to_vec(&fits).unwrap().len(), 258);
    }
}
