use {
    crate::error::{Error, Result},
    borsh::{BorshDeserialize, BorshSerialize},
    solana_sdk::pubkey::Pubkey,
    std::str::FromStr,
};

pub const ID: Pubkey = solana_sdk::pubkey!("SQDS4ep65T869zMMBKyuUq6aD6EgTu8psMjkvj52pCf");
pub const DISCRIMINATOR: [u8; 8] = [224, 116, 121, 186, 68, 161, 79, 236];
pub const PROGRAM_CONFIG_DISCRIMINATOR: [u8; 8] = [196, 210, 90, 231, 144, 149, 140, 63];
pub const VAULT_TRANSACTION_DISCRIMINATOR: [u8; 8] = [168, 250, 162, 100, 81, 14, 162, 207];
pub const PROPOSAL_DISCRIMINATOR: [u8; 8] = [26, 94, 189, 187, 116, 136, 53, 33];
pub const MAX_TIME_LOCK: u32 = 3 * 30 * 24 * 60 * 60; // 3 months

/// checks the anchor discriminator then borsh decodes the account prefix, trailing bytes
/// (realloc padding) are ignored
fn decode_account<T: BorshDeserialize>(
    kind: &'static str,
    discriminator: &[u8; 8],
    address: &Pubkey,
    data: &[u8],
) -> Result<T> {
    if data.len() < 8 || &data[0..8] != discriminator {
        return Err(Error::Decode {
            kind,
            address: *address,
            reason: "discriminator mismatch".to_string(),
        });
    }
    T::deserialize(&mut &data[..]).map_err(|err| Error::Decode {
        kind,
        address: *address,
        reason: err.to_string(),
    })
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct MultisigV4 {
    __discriminator: [u8; 8],
    /// Key that is used to seed the multisig PDA.
    pub create_key: Pubkey,
    /// Authority that can change the members and threshold without a vote.
    /// `Pubkey::default()` makes the multisig autonomous.
    pub config_authority: Pubkey,
    pub threshold: u16,
    /// Seconds between voting settlement and execution.
    pub time_lock: u32,
    /// Last transaction index. 0 means no transactions have been created.
    pub transaction_index: u64,
    /// All transactions up until this index are stale.
    pub stale_transaction_index: u64,
    /// Where rent of closed transaction accounts can be reclaimed, `None` disables reclamation.
    pub rent_collector: Option<Pubkey>,
    pub bump: u8,
    /// Members sorted by key.
    pub members: Vec<Member>,
}

impl MultisigV4 {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        create_key: Pubkey,
        config_authority: Option<Pubkey>,
        threshold: u16,
        time_lock: u32,
        rent_collector: Option<Pubkey>,
        bump: u8,
        mut members: Vec<Member>,
    ) -> Self {
        members.sort_by_key(|m| m.key);
        Self {
            __discriminator: DISCRIMINATOR,
            create_key,
            config_authority: config_authority.unwrap_or_default(),
            threshold,
            time_lock,
            transaction_index: 0,
            stale_transaction_index: 0,
            rent_collector,
            bump,
            members,
        }
    }

    pub fn from_account_data(address: &Pubkey, data: &[u8]) -> Result<Self> {
        decode_account("multisig", &DISCRIMINATOR, address, data)
    }

    pub fn num_voters(members: &[Member]) -> usize {
        members
            .iter()
            .filter(|m| m.permissions.has(Permission::Vote))
            .count()
    }

    pub fn num_proposers(members: &[Member]) -> usize {
        members
            .iter()
            .filter(|m| m.permissions.has(Permission::Initiate))
            .count()
    }

    pub fn num_executors(members: &[Member]) -> usize {
        members
            .iter()
            .filter(|m| m.permissions.has(Permission::Execute))
            .count()
    }

    /// Returns `Some(index)` into `members` if `member_pubkey` is a member
    pub fn is_member(&self, member_pubkey: Pubkey) -> Option<usize> {
        self.members
            .binary_search_by_key(&member_pubkey, |m| m.key)
            .ok()
    }

    pub fn member_has_permission(&self, member_pubkey: Pubkey, permission: Permission) -> bool {
        match self.is_member(member_pubkey) {
            Some(index) => self.members[index].permissions.has(permission),
            _ => false,
        }
    }

    /// Index the next vault transaction must be created at
    pub fn next_transaction_index(&self) -> Option<u64> {
        self.transaction_index.checked_add(1)
    }

    pub fn config_authority(&self) -> Option<Pubkey> {
        if self.config_authority == Pubkey::default() {
            None
        } else {
            Some(self.config_authority)
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Eq, PartialEq, Clone, Copy, Debug)]
pub struct Member {
    pub key: Pubkey,
    pub permissions: Permissions,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Initiate = 1 << 0,
    Vote = 1 << 1,
    Execute = 1 << 2,
}

impl FromStr for Permission {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "initiate" | "propose" => Ok(Self::Initiate),
            "vote" => Ok(Self::Vote),
            "execute" => Ok(Self::Execute),
            _ => Err(Error::Config(format!("unknown permission {s}"))),
        }
    }
}

/// Bitmask for permissions.
#[derive(BorshSerialize, BorshDeserialize, Eq, PartialEq, Clone, Copy, Default, Debug)]
pub struct Permissions {
    pub mask: u8,
}

impl Permissions {
    pub const ALL_MASK: u8 =
        Permission::Initiate as u8 | Permission::Vote as u8 | Permission::Execute as u8;

    pub fn from_vec(permissions: &[Permission]) -> Self {
        let mut mask = 0;
        for permission in permissions {
            mask |= *permission as u8;
        }
        Self { mask }
    }

    pub fn all() -> Self {
        Self {
            mask: Self::ALL_MASK,
        }
    }

    /// parses names such as `vote` or `all`
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut permissions = Vec::with_capacity(names.len());
        for name in names {
            if name.as_ref().eq_ignore_ascii_case("all") {
                return Ok(Self::all());
            }
            permissions.push(name.as_ref().parse::<Permission>()?);
        }
        Ok(Self::from_vec(&permissions))
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.mask & (permission as u8) != 0
    }

    pub fn is_all(&self) -> bool {
        self.mask & Self::ALL_MASK == Self::ALL_MASK
    }

    pub fn names(&self) -> Vec<&'static str> {
        [
            (Permission::Initiate, "initiate"),
            (Permission::Vote, "vote"),
            (Permission::Execute, "execute"),
        ]
        .into_iter()
        .filter(|(permission, _)| self.has(*permission))
        .map(|(_, name)| name)
        .collect()
    }
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct ProgramConfig {
    __discriminator: [u8; 8],
    /// Authority which can update the config.
    pub authority: Pubkey,
    /// Lamports charged for creating a multisig.
    pub multisig_creation_fee: u64,
    /// Receiver of the creation fee.
    pub treasury: Pubkey,
    pub _reserved: [u8; 64],
}

impl ProgramConfig {
    pub fn new(authority: Pubkey, multisig_creation_fee: u64, treasury: Pubkey) -> Self {
        Self {
            __discriminator: PROGRAM_CONFIG_DISCRIMINATOR,
            authority,
            multisig_creation_fee,
            treasury,
            _reserved: [0; 64],
        }
    }
    pub fn from_account_data(address: &Pubkey, data: &[u8]) -> Result<Self> {
        decode_account(
            "program config",
            &PROGRAM_CONFIG_DISCRIMINATOR,
            address,
            data,
        )
    }
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct VaultTransaction {
    __discriminator: [u8; 8],
    pub multisig: Pubkey,
    /// Member of the multisig who submitted the transaction.
    pub creator: Pubkey,
    pub index: u64,
    pub bump: u8,
    pub vault_index: u8,
    pub vault_bump: u8,
    /// Bumps of the ephemeral signer pdas, the length is the number of ephemeral signers.
    pub ephemeral_signer_bumps: Vec<u8>,
    pub message: VaultTransactionMessage,
}

impl VaultTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        multisig: Pubkey,
        creator: Pubkey,
        index: u64,
        bump: u8,
        vault_index: u8,
        vault_bump: u8,
        ephemeral_signer_bumps: Vec<u8>,
        message: VaultTransactionMessage,
    ) -> Self {
        Self {
            __discriminator: VAULT_TRANSACTION_DISCRIMINATOR,
            multisig,
            creator,
            index,
            bump,
            vault_index,
            vault_bump,
            ephemeral_signer_bumps,
            message,
        }
    }
    pub fn from_account_data(address: &Pubkey, data: &[u8]) -> Result<Self> {
        decode_account(
            "vault transaction",
            &VAULT_TRANSACTION_DISCRIMINATOR,
            address,
            data,
        )
    }
}

/// Stored form of a vault transaction message, vectors use the default borsh u32 prefix
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct VaultTransactionMessage {
    pub num_signers: u8,
    pub num_writable_signers: u8,
    pub num_writable_non_signers: u8,
    pub account_keys: Vec<Pubkey>,
    pub instructions: Vec<MultisigCompiledInstruction>,
    pub address_table_lookups: Vec<MultisigMessageAddressTableLookup>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct MultisigCompiledInstruction {
    pub program_id_index: u8,
    pub account_indexes: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct MultisigMessageAddressTableLookup {
    pub account_key: Pubkey,
    pub writable_indexes: Vec<u8>,
    pub readonly_indexes: Vec<u8>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct Proposal {
    __discriminator: [u8; 8],
    pub multisig: Pubkey,
    pub transaction_index: u64,
    pub status: ProposalStatus,
    pub bump: u8,
    /// Keys that have approved/signed.
    pub approved: Vec<Pubkey>,
    pub rejected: Vec<Pubkey>,
    pub cancelled: Vec<Pubkey>,
}

impl Proposal {
    pub fn new(multisig: Pubkey, transaction_index: u64, status: ProposalStatus, bump: u8) -> Self {
        Self {
            __discriminator: PROPOSAL_DISCRIMINATOR,
            multisig,
            transaction_index,
            status,
            bump,
            approved: vec![],
            rejected: vec![],
            cancelled: vec![],
        }
    }
    pub fn from_account_data(address: &Pubkey, data: &[u8]) -> Result<Self> {
        decode_account("proposal", &PROPOSAL_DISCRIMINATOR, address, data)
    }
}

/// Timestamps are unix seconds of the transition
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProposalStatus {
    Draft { timestamp: i64 },
    Active { timestamp: i64 },
    Rejected { timestamp: i64 },
    Approved { timestamp: i64 },
    /// deprecated by the program, kept for layout compatibility
    Executing,
    Executed { timestamp: i64 },
    Cancelled { timestamp: i64 },
}

impl ProposalStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Draft { .. } => "draft",
            Self::Active { .. } => "active",
            Self::Rejected { .. } => "rejected",
            Self::Approved { .. } => "approved",
            Self::Executing => "executing",
            Self::Executed { .. } => "executed",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn members() -> Vec<Member> {
        vec![
            Member {
                key: Pubkey::new_unique(),
                permissions: Permissions::all(),
            },
            Member {
                key: Pubkey::new_unique(),
                permissions: Permissions::from_vec(&[Permission::Vote]),
            },
        ]
    }

    #[test]
    fn test_multisig_account_decode() {
        let address = Pubkey::new_unique();
        let msig = MultisigV4::new(Pubkey::new_unique(), None, 2, 0, None, 254, members());
        let mut data = borsh::to_vec(&msig).unwrap();
        // accounts are allocated with spare room for new members
        data.extend_from_slice(&[0u8; 64]);
        let decoded = MultisigV4::from_account_data(&address, &data).unwrap();
        assert_eq!(decoded, msig);
        assert_eq!(decoded.transaction_index, 0);
        assert_eq!(decoded.next_transaction_index(), Some(1));
        assert_eq!(decoded.config_authority(), None);
        assert_eq!(MultisigV4::num_voters(&decoded.members), 2);
        assert_eq!(MultisigV4::num_proposers(&decoded.members), 1);
        for member in &decoded.members {
            assert!(decoded.is_member(member.key).is_some());
            assert!(decoded.member_has_permission(member.key, Permission::Vote));
        }
        assert!(!decoded.member_has_permission(Pubkey::new_unique(), Permission::Vote));

        // a program config is not a multisig
        let cfg = ProgramConfig::new(Pubkey::new_unique(), 0, Pubkey::new_unique());
        let err = MultisigV4::from_account_data(&address, &borsh::to_vec(&cfg).unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::Decode { kind: "multisig", .. }));
        assert!(MultisigV4::from_account_data(&address, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_permissions() {
        assert_eq!(Permissions::all().mask, 7);
        assert!(Permissions::all().is_all());
        let vote_only = Permissions::from_names(&["vote"]).unwrap();
        assert!(vote_only.has(Permission::Vote));
        assert!(!vote_only.has(Permission::Execute));
        assert!(!vote_only.is_all());
        assert_eq!(
            Permissions::from_names(&["Initiate", "vote", "execute"]).unwrap(),
            Permissions::all()
        );
        assert_eq!(Permissions::from_names(&["all"]).unwrap(), Permissions::all());
        assert!(Permissions::from_names(&["admin"]).is_err());
        assert_eq!(vote_only.names(), vec!["vote"]);
        assert_eq!(Permissions::all().names(), vec!["initiate", "vote", "execute"]);
    }

    #[test]
    fn test_proposal_decode() {
        let address = Pubkey::new_unique();
        let proposal = Proposal::new(
            Pubkey::new_unique(),
            1,
            ProposalStatus::Active { timestamp: 1_700_000_000 },
            255,
        );
        let decoded =
            Proposal::from_account_data(&address, &borsh::to_vec(&proposal).unwrap()).unwrap();
        assert_eq!(decoded.status.name(), "active");
        assert_eq!(decoded.transaction_index, 1);
    }
}
