pub mod jupiter;
pub mod orca;
pub mod pumpfun;
pub mod pumpswap;
pub mod raydium_cpmm;
pub mod raydium_v4;

use borsh::BorshDeserialize;
use serde::Serialize;

use crate::error::DecodeError;
use crate::records::{TransferEvent, TransferKind};
use crate::transaction::CanonicalInstruction;

pub const RAYDIUM_V4_PROGRAM_ID: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";
pub const RAYDIUM_CPMM_PROGRAM_ID: &str = "CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C";
pub const ORCA_WHIRLPOOL_PROGRAM_ID: &str = "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc";
pub const PUMPFUN_PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";
pub const PUMPSWAP_PROGRAM_ID: &str = "pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA";
pub const JUPITER_V6_PROGRAM_ID: &str = "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4";

pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";
pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";

pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";
pub const NATIVE_SOL_DECIMALS: u8 = 9;

/// Mints that price the other side of a trade.
pub const QUOTE_MINTS: &[&str] = &[WSOL_MINT, USDC_MINT, USDT_MINT];

/// Prefix of an Anchor `emit_cpi!` self-invocation carrying an event record.
pub const ANCHOR_EVENT_TAG: [u8; 8] = [228, 69, 165, 46, 81, 203, 154, 29];

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum_macros::Display,
    strum_macros::AsRefStr,
    strum_macros::VariantNames,
)]
pub enum Protocol {
    RaydiumV4,
    #[strum(serialize = "RaydiumCPMM")]
    #[serde(rename = "RaydiumCPMM")]
    RaydiumCpmm,
    Orca,
    Pumpfun,
    Pumpswap,
    Jupiter,
}

impl Protocol {
    pub fn from_program_id(program_id: &str) -> Option<Self> {
        match program_id {
            RAYDIUM_V4_PROGRAM_ID => Some(Self::RaydiumV4),
            RAYDIUM_CPMM_PROGRAM_ID => Some(Self::RaydiumCpmm),
            ORCA_WHIRLPOOL_PROGRAM_ID => Some(Self::Orca),
            PUMPFUN_PROGRAM_ID => Some(Self::Pumpfun),
            PUMPSWAP_PROGRAM_ID => Some(Self::Pumpswap),
            JUPITER_V6_PROGRAM_ID => Some(Self::Jupiter),
            _ => None,
        }
    }

    pub fn program_id(self) -> &'static str {
        match self {
            Self::RaydiumV4 => RAYDIUM_V4_PROGRAM_ID,
            Self::RaydiumCpmm => RAYDIUM_CPMM_PROGRAM_ID,
            Self::Orca => ORCA_WHIRLPOOL_PROGRAM_ID,
            Self::Pumpfun => PUMPFUN_PROGRAM_ID,
            Self::Pumpswap => PUMPSWAP_PROGRAM_ID,
            Self::Jupiter => JUPITER_V6_PROGRAM_ID,
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::RaydiumV4,
            Self::RaydiumCpmm,
            Self::Orca,
            Self::Pumpfun,
            Self::Pumpswap,
            Self::Jupiter,
        ]
    }

    pub fn all_program_ids() -> &'static [&'static str] {
        &[
            RAYDIUM_V4_PROGRAM_ID,
            RAYDIUM_CPMM_PROGRAM_ID,
            ORCA_WHIRLPOOL_PROGRAM_ID,
            PUMPFUN_PROGRAM_ID,
            PUMPSWAP_PROGRAM_ID,
            JUPITER_V6_PROGRAM_ID,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ActionKind {
    Swap,
    AddLiquidity,
    RemoveLiquidity,
    CreatePool,
}

/// Direction of a leg relative to the user: `In` moves from the user into
/// the pool, `Out` from the pool to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegDirection {
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLeg {
    pub mint: String,
    pub raw_amount: u64,
    pub direction: LegDirection,
    /// Decimals carried by the instruction itself, when it states them.
    pub decimals: Option<u8>,
}

impl ActionLeg {
    pub fn new(mint: impl Into<String>, raw_amount: u64, direction: LegDirection) -> Self {
        Self {
            mint: mint.into(),
            raw_amount,
            direction,
            decimals: None,
        }
    }

    pub fn from_transfer(
        transfer: &TransferEvent,
        direction: LegDirection,
    ) -> Result<Self, DecodeError> {
        let mint = transfer.mint.clone().ok_or_else(|| {
            DecodeError::new(format!(
                "transfer at position {} has no resolvable mint",
                transfer.position
            ))
        })?;
        Ok(Self {
            mint,
            raw_amount: transfer.raw_amount,
            direction,
            decimals: transfer.decimals,
        })
    }
}

/// One DEX action decoded from one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolAction {
    pub kind: ActionKind,
    pub program_id: String,
    pub pool_id: String,
    /// Position of the originating instruction.
    pub position: usize,
    pub legs: Vec<ActionLeg>,
    pub lp_token: Option<ActionLeg>,
    pub fee: Option<ActionLeg>,
}

impl ProtocolAction {
    pub fn new(
        kind: ActionKind,
        ix: &CanonicalInstruction,
        pool_id: impl Into<String>,
        legs: Vec<ActionLeg>,
    ) -> Self {
        Self {
            kind,
            program_id: ix.program_id.clone(),
            pool_id: pool_id.into(),
            position: ix.position,
            legs,
            lp_token: None,
            fee: None,
        }
    }

    pub fn swap(
        ix: &CanonicalInstruction,
        pool_id: impl Into<String>,
        input: ActionLeg,
        output: ActionLeg,
    ) -> Self {
        Self::new(ActionKind::Swap, ix, pool_id, vec![input, output])
    }

    pub fn with_lp_token(mut self, lp: Option<ActionLeg>) -> Self {
        self.lp_token = lp;
        self
    }

    pub fn with_fee(mut self, fee: Option<ActionLeg>) -> Self {
        self.fee = fee;
        self
    }
}

/// First eight bytes of instruction data, the Anchor discriminator.
pub fn discriminator(data: &[u8]) -> Option<[u8; 8]> {
    data.get(..8)?.try_into().ok()
}

pub fn read_u64(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset.checked_add(8)?)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

pub fn require_accounts(ix: &CanonicalInstruction, min: usize) -> Result<(), DecodeError> {
    if ix.accounts.len() < min {
        return Err(DecodeError::new(format!(
            "unrecognized layout: expected at least {min} accounts, got {}",
            ix.accounts.len()
        )));
    }
    Ok(())
}

/// Account at `idx`; callers check arity first, so a miss is a layout error.
pub fn account_at(ix: &CanonicalInstruction, idx: usize) -> Result<&str, DecodeError> {
    ix.account(idx)
        .ok_or_else(|| DecodeError::new(format!("unrecognized layout: no account at {idx}")))
}

/// Borsh-decode instruction arguments. Trailing optional fields are allowed.
pub fn parse_args<T: BorshDeserialize>(payload: &[u8], name: &str) -> Result<T, DecodeError> {
    let mut cursor = payload;
    T::deserialize(&mut cursor)
        .map_err(|e| DecodeError::new(format!("unrecognized layout: {name} arguments: {e}")))
}

/// First token movement into `account`.
pub fn transfer_into<'a>(
    transfers: &'a [TransferEvent],
    account: &str,
) -> Option<&'a TransferEvent> {
    transfers
        .iter()
        .find(|t| t.kind != TransferKind::Burn && t.destination == account)
}

/// First token movement out of `account`.
pub fn transfer_out_of<'a>(
    transfers: &'a [TransferEvent],
    account: &str,
) -> Option<&'a TransferEvent> {
    transfers
        .iter()
        .find(|t| t.kind != TransferKind::MintTo && t.source == account)
}

pub fn require_transfer<'a>(
    found: Option<&'a TransferEvent>,
    what: &str,
) -> Result<&'a TransferEvent, DecodeError> {
    found.ok_or_else(|| DecodeError::new(format!("missing {what} transfer")))
}

pub fn minted<'a>(transfers: &'a [TransferEvent], mint: &str) -> Option<&'a TransferEvent> {
    transfers
        .iter()
        .find(|t| t.kind == TransferKind::MintTo && t.mint.as_deref() == Some(mint))
}

pub fn burned<'a>(transfers: &'a [TransferEvent], mint: &str) -> Option<&'a TransferEvent> {
    transfers
        .iter()
        .find(|t| t.kind == TransferKind::Burn && t.mint.as_deref() == Some(mint))
}

pub fn is_quote_mint(mint: &str) -> bool {
    QUOTE_MINTS.contains(&mint)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::transaction::BalanceIndex;
    use crate::types::{RawMeta, RawTokenBalance, RawUiTokenAmount};

    pub fn instruction(program_id: &str, accounts: &[&str], data: Vec<u8>) -> CanonicalInstruction {
        CanonicalInstruction {
            position: 0,
            program_id: program_id.to_string(),
            accounts: accounts.iter().map(ToString::to_string).collect(),
            data,
            parent: None,
            depth: 0,
            outer_index: 0,
        }
    }

    pub fn named_accounts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("acc{i}")).collect()
    }

    pub fn instruction_with(program_id: &str, accounts: &[String], data: Vec<u8>) -> CanonicalInstruction {
        let refs: Vec<&str> = accounts.iter().map(String::as_str).collect();
        instruction(program_id, &refs, data)
    }

    pub fn transfer(
        position: usize,
        kind: TransferKind,
        mint: &str,
        amount: u64,
        source: &str,
        destination: &str,
    ) -> TransferEvent {
        TransferEvent {
            position,
            kind,
            mint: Some(mint.to_string()),
            raw_amount: amount,
            decimals: None,
            source: source.to_string(),
            destination: destination.to_string(),
            authority: "authority".to_string(),
            program_id: TOKEN_PROGRAM_ID.to_string(),
        }
    }

    pub fn with_disc(disc: [u8; 8], args: &[&[u8]]) -> Vec<u8> {
        let mut data = disc.to_vec();
        for a in args {
            data.extend_from_slice(a);
        }
        data
    }

    /// Token rows are `(account, mint, pre, post, decimals)`, lamport rows
    /// `(account, pre, post)`.
    pub fn balance_index(
        tokens: &[(&str, &str, u64, u64, u8)],
        lamports: &[(&str, u64, u64)],
    ) -> BalanceIndex {
        let row = |account_index: usize, mint: &str, amount: u64, decimals: u8| RawTokenBalance {
            account_index,
            mint: mint.to_string(),
            owner: None,
            program_id: None,
            ui_token_amount: RawUiTokenAmount {
                amount: amount.to_string(),
                decimals,
            },
        };

        let mut meta = RawMeta::default();
        let mut keys = Vec::new();
        let mut pre_rows = Vec::new();
        let mut post_rows = Vec::new();
        for &(account, mint, pre, post, decimals) in tokens {
            pre_rows.push(row(keys.len(), mint, pre, decimals));
            post_rows.push(row(keys.len(), mint, post, decimals));
            keys.push(account.to_string());
            meta.pre_balances.push(0);
            meta.post_balances.push(0);
        }
        for &(account, pre, post) in lamports {
            keys.push(account.to_string());
            meta.pre_balances.push(pre);
            meta.post_balances.push(post);
        }
        meta.pre_token_balances = Some(pre_rows);
        meta.post_token_balances = Some(post_rows);
        BalanceIndex::build(&meta, &keys)
    }
}
