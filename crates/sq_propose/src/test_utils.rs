//! in-memory ledger that executes the system transfer and the squads instructions this
//! crate submits with the program's observable rules (pda checks, counter advance, account
//! already in use, proposal ordering), plus fault injection for failure scenarios
use {
    crate::{
        error::{Error, Result},
        programs::squads::{
            error::{MultisigErrorCode, ProgramFailure},
            instructions::{
                MultisigCreateArgsV2, ProposalCreateArgs, VaultTransactionCreateArgs,
                MULTISIG_CREATE_V2, PROPOSAL_CREATE, VAULT_TRANSACTION_CREATE,
            },
            message::TransactionMessage,
            pda,
            v4::{
                self, MultisigV4, Permission, ProgramConfig, Proposal, ProposalStatus,
                VaultTransaction,
            },
        },
        services::ledger::LedgerGateway,
        types::{Checkpoint, Confirmation, SubmitOptions},
    },
    borsh::{BorshDeserialize, BorshSerialize},
    solana_client::client_error::{ClientError, ClientErrorKind},
    solana_sdk::{
        commitment_config::CommitmentConfig,
        hash::Hash,
        instruction::InstructionError,
        pubkey::Pubkey,
        signature::Signature,
        system_instruction::SystemInstruction,
        system_program,
        transaction::{TransactionError, VersionedTransaction},
    },
    std::{collections::HashMap, sync::Mutex},
};

/// mock clock used for proposal timestamps
const MOCK_TIMESTAMP: i64 = 1_700_000_000;
/// `SystemError::ResultWithNegativeLamports`
const INSUFFICIENT_LAMPORTS: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Transfer,
    MultisigCreate,
    VaultTransactionCreate,
    ProposalCreate,
    Unknown,
}

#[derive(Clone, Default)]
struct MockAccount {
    lamports: u64,
    data: Vec<u8>,
}

#[derive(Default)]
struct MockState {
    accounts: HashMap<Pubkey, MockAccount>,
    statuses: HashMap<Signature, Option<TransactionError>>,
    block_height: u64,
    airdrops_fail: bool,
    injected_failures: Vec<(InstructionKind, TransactionError)>,
    competing_writes: u32,
    attempted: Vec<InstructionKind>,
}

pub struct MockLedger {
    state: Mutex<MockState>,
    treasury: Pubkey,
}

type IxResult<T> = std::result::Result<T, InstructionError>;

fn failure(reason: ProgramFailure) -> InstructionError {
    InstructionError::Custom(reason.code())
}

fn multisig_failure(code: MultisigErrorCode) -> InstructionError {
    failure(ProgramFailure::Multisig(code))
}

impl MockLedger {
    pub fn new() -> Self {
        let treasury = Pubkey::new_unique();
        let ledger = Self {
            state: Mutex::new(MockState::default()),
            treasury,
        };
        let (program_config, _) = pda::program_config_pda().unwrap();
        ledger.set_account_data(
            &program_config,
            borsh::to_vec(&ProgramConfig::new(Pubkey::new_unique(), 0, treasury)).unwrap(),
        );
        ledger
    }
    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }
    pub fn treasury(&self) -> Pubkey {
        self.treasury
    }
    pub fn credit(&self, address: &Pubkey, lamports: u64) {
        self.with_state(|state| {
            state.accounts.entry(*address).or_default().lamports += lamports;
        })
    }
    pub fn lamports(&self, address: &Pubkey) -> u64 {
        self.with_state(|state| {
            state
                .accounts
                .get(address)
                .map(|account| account.lamports)
                .unwrap_or_default()
        })
    }
    pub fn set_account_data(&self, address: &Pubkey, data: Vec<u8>) {
        self.with_state(|state| state.accounts.entry(*address).or_default().data = data)
    }
    pub fn remove_account(&self, address: &Pubkey) {
        self.with_state(|state| {
            state.accounts.remove(address);
        })
    }
    pub fn set_airdrops_fail(&self, fail: bool) {
        self.with_state(|state| state.airdrops_fail = fail)
    }
    /// the next transaction containing `kind` fails with `err`
    pub fn fail_next(&self, kind: InstructionKind, err: TransactionError) {
        self.with_state(|state| state.injected_failures.push((kind, err)))
    }
    /// before each of the next `count` vault transaction creations another member creates
    /// a vault transaction first, advancing the counter under the caller
    pub fn add_competing_writes(&self, count: u32) {
        self.with_state(|state| state.competing_writes += count)
    }
    /// every instruction of every submitted transaction, including failed ones
    pub fn attempted(&self) -> Vec<InstructionKind> {
        self.with_state(|state| state.attempted.clone())
    }
    pub fn attempts_of(&self, kind: InstructionKind) -> usize {
        self.attempted().into_iter().filter(|k| *k == kind).count()
    }
    /// number of accounts whose data starts with `discriminator`
    pub fn count_accounts(&self, discriminator: &[u8; 8]) -> usize {
        self.with_state(|state| {
            state
                .accounts
                .values()
                .filter(|account| account.data.starts_with(discriminator))
                .count()
        })
    }
    pub fn multisig(&self, address: &Pubkey) -> Option<MultisigV4> {
        let data = self.with_state(|state| state.accounts.get(address).map(|a| a.data.clone()))?;
        MultisigV4::from_account_data(address, &data).ok()
    }

    fn execute(
        state: &mut MockState,
        tx: &VersionedTransaction,
    ) -> std::result::Result<(), TransactionError> {
        if tx.verify_with_results().iter().any(|ok| !ok) {
            return Err(TransactionError::SignatureFailure);
        }
        let keys = tx.message.static_account_keys();
        let num_signers = tx.message.header().num_required_signatures as usize;
        let kinds = tx
            .message
            .instructions()
            .iter()
            .map(|ix| instruction_kind(&keys[ix.program_id_index as usize], &ix.data))
            .collect::<Vec<_>>();
        state.attempted.extend(kinds.iter().copied());

        if let Some(pos) = state
            .injected_failures
            .iter()
            .position(|(kind, _)| kinds.contains(kind))
        {
            return Err(state.injected_failures.remove(pos).1);
        }
        if state.competing_writes > 0 && kinds.contains(&InstructionKind::VaultTransactionCreate) {
            state.competing_writes -= 1;
            for (ix, kind) in tx.message.instructions().iter().zip(&kinds) {
                if *kind != InstructionKind::VaultTransactionCreate {
                    continue;
                }
                if let Some(multisig) = ix.accounts.first().map(|idx| keys[*idx as usize]) {
                    competing_vault_transaction(&mut state.accounts, &multisig);
                }
            }
        }

        // instructions run against a copy so a failure leaves no partial state
        let mut accounts = state.accounts.clone();
        for (idx, (ix, kind)) in tx.message.instructions().iter().zip(kinds).enumerate() {
            let ix_accounts = ix
                .accounts
                .iter()
                .map(|i| {
                    let i = *i as usize;
                    (keys[i], i < num_signers)
                })
                .collect::<Vec<_>>();
            let res = match kind {
                InstructionKind::Transfer => transfer(&mut accounts, &ix_accounts, &ix.data),
                InstructionKind::MultisigCreate => {
                    multisig_create(&mut accounts, &ix_accounts, &ix.data[8..])
                }
                InstructionKind::VaultTransactionCreate => {
                    vault_transaction_create(&mut accounts, &ix_accounts, &ix.data[8..])
                }
                InstructionKind::ProposalCreate => {
                    proposal_create(&mut accounts, &ix_accounts, &ix.data[8..])
                }
                InstructionKind::Unknown => Err(InstructionError::InvalidInstructionData),
            };
            res.map_err(|err| TransactionError::InstructionError(idx as u8, err))?;
        }
        state.accounts = accounts;
        Ok(())
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn instruction_kind(program_id: &Pubkey, data: &[u8]) -> InstructionKind {
    if *program_id == system_program::id() {
        return InstructionKind::Transfer;
    }
    if *program_id != v4::ID || data.len() < 8 {
        return InstructionKind::Unknown;
    }
    match <[u8; 8]>::try_from(&data[0..8]).unwrap_or_default() {
        MULTISIG_CREATE_V2 => InstructionKind::MultisigCreate,
        VAULT_TRANSACTION_CREATE => InstructionKind::VaultTransactionCreate,
        PROPOSAL_CREATE => InstructionKind::ProposalCreate,
        _ => InstructionKind::Unknown,
    }
}

fn account_at(accounts: &[(Pubkey, bool)], idx: usize) -> IxResult<(Pubkey, bool)> {
    accounts
        .get(idx)
        .copied()
        .ok_or(InstructionError::NotEnoughAccountKeys)
}

fn load_multisig(
    accounts: &HashMap<Pubkey, MockAccount>,
    address: &Pubkey,
) -> IxResult<MultisigV4> {
    let account = accounts
        .get(address)
        .ok_or(failure(ProgramFailure::AccountNotInitialized))?;
    MultisigV4::from_account_data(address, &account.data)
        .map_err(|_| failure(ProgramFailure::AccountDiscriminatorMismatch))
}

fn store<T: BorshSerialize>(
    accounts: &mut HashMap<Pubkey, MockAccount>,
    address: Pubkey,
    account: &T,
) -> IxResult<()> {
    accounts.entry(address).or_default().data =
        borsh::to_vec(account).map_err(|_| InstructionError::AccountDataTooSmall)?;
    Ok(())
}

fn exists(accounts: &HashMap<Pubkey, MockAccount>, address: &Pubkey) -> bool {
    accounts
        .get(address)
        .map(|account| !account.data.is_empty())
        .unwrap_or(false)
}

fn transfer(
    accounts: &mut HashMap<Pubkey, MockAccount>,
    ix_accounts: &[(Pubkey, bool)],
    data: &[u8],
) -> IxResult<()> {
    let lamports = match bincode::deserialize::<SystemInstruction>(data) {
        Ok(SystemInstruction::Transfer { lamports }) => lamports,
        _ => return Err(InstructionError::InvalidInstructionData),
    };
    let (from, from_signed) = account_at(ix_accounts, 0)?;
    let (to, _) = account_at(ix_accounts, 1)?;
    if !from_signed {
        return Err(InstructionError::MissingRequiredSignature);
    }
    let balance = accounts.get(&from).map(|a| a.lamports).unwrap_or_default();
    if balance < lamports {
        return Err(InstructionError::Custom(INSUFFICIENT_LAMPORTS));
    }
    accounts.entry(from).or_default().lamports -= lamports;
    accounts.entry(to).or_default().lamports += lamports;
    Ok(())
}

fn multisig_create(
    accounts: &mut HashMap<Pubkey, MockAccount>,
    ix_accounts: &[(Pubkey, bool)],
    data: &[u8],
) -> IxResult<()> {
    let args = MultisigCreateArgsV2::try_from_slice(data)
        .map_err(|_| InstructionError::InvalidInstructionData)?;
    let (multisig, _) = account_at(ix_accounts, 2)?;
    let (create_key, create_key_signed) = account_at(ix_accounts, 3)?;
    if !create_key_signed {
        return Err(InstructionError::MissingRequiredSignature);
    }
    let (expected, bump) =
        pda::multisig_pda(&create_key).map_err(|_| InstructionError::InvalidSeeds)?;
    if expected != multisig {
        return Err(failure(ProgramFailure::ConstraintSeeds));
    }
    if exists(accounts, &multisig) {
        return Err(failure(ProgramFailure::AccountAlreadyInUse));
    }
    if args.members.is_empty() {
        return Err(multisig_failure(MultisigErrorCode::EmptyMembers));
    }
    let mut keys = args.members.iter().map(|m| m.key).collect::<Vec<_>>();
    keys.sort();
    keys.dedup();
    if keys.len() != args.members.len() {
        return Err(multisig_failure(MultisigErrorCode::DuplicateMember));
    }
    if args.threshold == 0 || usize::from(args.threshold) > MultisigV4::num_voters(&args.members) {
        return Err(multisig_failure(MultisigErrorCode::InvalidThreshold));
    }
    if MultisigV4::num_proposers(&args.members) == 0 {
        return Err(multisig_failure(MultisigErrorCode::NoProposers));
    }
    if MultisigV4::num_executors(&args.members) == 0 {
        return Err(multisig_failure(MultisigErrorCode::NoExecutors));
    }
    let account = MultisigV4::new(
        create_key,
        args.config_authority,
        args.threshold,
        args.time_lock,
        args.rent_collector,
        bump,
        args.members,
    );
    store(accounts, multisig, &account)
}

fn vault_transaction_create(
    accounts: &mut HashMap<Pubkey, MockAccount>,
    ix_accounts: &[(Pubkey, bool)],
    data: &[u8],
) -> IxResult<()> {
    let args = VaultTransactionCreateArgs::try_from_slice(data)
        .map_err(|_| InstructionError::InvalidInstructionData)?;
    let (multisig_key, _) = account_at(ix_accounts, 0)?;
    let (transaction, _) = account_at(ix_accounts, 1)?;
    let (creator, creator_signed) = account_at(ix_accounts, 2)?;
    let mut multisig = load_multisig(accounts, &multisig_key)?;
    if !creator_signed || !multisig.member_has_permission(creator, Permission::Initiate) {
        return Err(multisig_failure(MultisigErrorCode::Unauthorized));
    }
    let index = multisig
        .next_transaction_index()
        .ok_or(InstructionError::ArithmeticOverflow)?;
    let (expected, bump) =
        pda::transaction_pda(&multisig_key, index).map_err(|_| InstructionError::InvalidSeeds)?;
    if expected != transaction {
        return Err(failure(ProgramFailure::ConstraintSeeds));
    }
    if exists(accounts, &transaction) {
        return Err(failure(ProgramFailure::AccountAlreadyInUse));
    }
    let message = TransactionMessage::try_from_slice(&args.transaction_message)
        .map_err(|_| multisig_failure(MultisigErrorCode::InvalidTransactionMessage))?;
    let (_, vault_bump) = pda::vault_pda(&multisig_key, args.vault_index)
        .map_err(|_| InstructionError::InvalidSeeds)?;
    let vault_transaction = VaultTransaction::new(
        multisig_key,
        creator,
        index,
        bump,
        args.vault_index,
        vault_bump,
        vec![],
        message.to_vault_transaction_message(),
    );
    multisig.transaction_index = index;
    store(accounts, transaction, &vault_transaction)?;
    store(accounts, multisig_key, &multisig)
}

fn proposal_create(
    accounts: &mut HashMap<Pubkey, MockAccount>,
    ix_accounts: &[(Pubkey, bool)],
    data: &[u8],
) -> IxResult<()> {
    let args = ProposalCreateArgs::try_from_slice(data)
        .map_err(|_| InstructionError::InvalidInstructionData)?;
    let (multisig_key, _) = account_at(ix_accounts, 0)?;
    let (proposal, _) = account_at(ix_accounts, 1)?;
    let (creator, creator_signed) = account_at(ix_accounts, 2)?;
    let multisig = load_multisig(accounts, &multisig_key)?;
    if args.transaction_index > multisig.transaction_index {
        return Err(multisig_failure(MultisigErrorCode::InvalidTransactionIndex));
    }
    if args.transaction_index <= multisig.stale_transaction_index {
        return Err(multisig_failure(MultisigErrorCode::StaleProposal));
    }
    let may_propose = multisig.member_has_permission(creator, Permission::Initiate)
        || multisig.member_has_permission(creator, Permission::Vote);
    if !creator_signed || !may_propose {
        return Err(multisig_failure(MultisigErrorCode::Unauthorized));
    }
    let (expected, bump) = pda::proposal_pda(&multisig_key, args.transaction_index)
        .map_err(|_| InstructionError::InvalidSeeds)?;
    if expected != proposal {
        return Err(failure(ProgramFailure::ConstraintSeeds));
    }
    if exists(accounts, &proposal) {
        return Err(failure(ProgramFailure::AccountAlreadyInUse));
    }
    let status = if args.draft {
        ProposalStatus::Draft { timestamp: MOCK_TIMESTAMP }
    } else {
        ProposalStatus::Active { timestamp: MOCK_TIMESTAMP }
    };
    let account = Proposal::new(multisig_key, args.transaction_index, status, bump);
    store(accounts, proposal, &account)
}

/// another proposer lands a vault transaction at the next index
fn competing_vault_transaction(accounts: &mut HashMap<Pubkey, MockAccount>, multisig_key: &Pubkey) {
    let Ok(mut multisig) = load_multisig(accounts, multisig_key) else {
        return;
    };
    let Some(index) = multisig.next_transaction_index() else {
        return;
    };
    let (transaction, bump) = pda::transaction_pda(multisig_key, index).unwrap();
    let (_, vault_bump) = pda::vault_pda(multisig_key, 0).unwrap();
    let foreign = VaultTransaction::new(
        *multisig_key,
        Pubkey::new_unique(),
        index,
        bump,
        0,
        vault_bump,
        vec![],
        TransactionMessage::try_compile(multisig_key, &[])
            .unwrap()
            .to_vault_transaction_message(),
    );
    multisig.transaction_index = index;
    store(accounts, transaction, &foreign).unwrap();
    store(accounts, *multisig_key, &multisig).unwrap();
}

impl LedgerGateway for MockLedger {
    async fn latest_checkpoint(&self, _commitment: CommitmentConfig) -> Result<Checkpoint> {
        Ok(self.with_state(|state| {
            state.block_height += 1;
            Checkpoint {
                blockhash: Hash::new_unique(),
                last_valid_block_height: state.block_height + 150,
            }
        }))
    }

    async fn submit(&self, tx: &VersionedTransaction, opts: SubmitOptions) -> Result<Signature> {
        let signature = tx.signatures.first().copied().unwrap_or_default();
        self.with_state(|state| {
            if state.statuses.contains_key(&signature) {
                return Err(Error::transaction_failed(None, TransactionError::AlreadyProcessed));
            }
            match Self::execute(state, tx) {
                Ok(()) => {
                    state.statuses.insert(signature, None);
                    Ok(signature)
                }
                Err(err) if opts.skip_preflight => {
                    state.statuses.insert(signature, Some(err));
                    Ok(signature)
                }
                Err(err) => Err(Error::transaction_failed(None, err)),
            }
        })
    }

    async fn confirm(
        &self,
        signature: &Signature,
        _checkpoint: &Checkpoint,
        _commitment: CommitmentConfig,
    ) -> Result<Confirmation> {
        self.with_state(|state| match state.statuses.get(signature) {
            Some(None) => Ok(Confirmation::Success),
            Some(Some(err)) => Ok(Confirmation::Failed(err.clone())),
            None => Err(Error::BlockhashExpired {
                signature: *signature,
            }),
        })
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        Ok(self.with_state(|state| state.accounts.get(address).map(|a| a.data.clone())))
    }

    async fn fund(&self, address: &Pubkey, lamports: u64) -> Result<Signature> {
        self.with_state(|state| {
            if state.airdrops_fail {
                return Err(Error::Transport(Box::new(ClientError::from(
                    ClientErrorKind::Custom("airdrop request failed: rate limited".to_string()),
                ))));
            }
            state.accounts.entry(*address).or_default().lamports += lamports;
            let signature = Signature::new_unique();
            state.statuses.insert(signature, None);
            Ok(signature)
        })
    }
}
