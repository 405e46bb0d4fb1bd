use borsh::BorshDeserialize;

use crate::error::DecodeError;
use crate::parser::registry::ProtocolDecoder;
use crate::protocols::{
    ActionKind, ActionLeg, LegDirection, Protocol, ProtocolAction, account_at, burned, minted,
    parse_args, require_accounts, require_transfer, transfer_into, transfer_out_of,
};
use crate::records::TransferEvent;
use crate::transaction::{BalanceIndex, CanonicalInstruction};

/// Raydium AMM v4 instruction tags (single leading byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaydiumV4Instruction {
    Initialize,
    Initialize2,
    MonitorStep,
    Deposit,
    Withdraw,
    MigrateToOpenBook,
    SetParams,
    WithdrawPnl,
    WithdrawSrm,
    SwapBaseIn,
    PreInitialize,
    SwapBaseOut,
    SimulateInfo,
    AdminCancelOrders,
    CreateConfigAccount,
    UpdateConfigAccount,
    SwapBaseInV2,
    SwapBaseOutV2,
}

impl RaydiumV4Instruction {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Initialize,
            1 => Self::Initialize2,
            2 => Self::MonitorStep,
            3 => Self::Deposit,
            4 => Self::Withdraw,
            5 => Self::MigrateToOpenBook,
            6 => Self::SetParams,
            7 => Self::WithdrawPnl,
            8 => Self::WithdrawSrm,
            9 => Self::SwapBaseIn,
            10 => Self::PreInitialize,
            11 => Self::SwapBaseOut,
            12 => Self::SimulateInfo,
            13 => Self::AdminCancelOrders,
            14 => Self::CreateConfigAccount,
            15 => Self::UpdateConfigAccount,
            16 => Self::SwapBaseInV2,
            17 => Self::SwapBaseOutV2,
            _ => return None,
        })
    }
}

const SWAP_DATA_LEN: usize = 17;
const DEPOSIT_DATA_LEN: usize = 25;
const WITHDRAW_DATA_LEN: usize = 9;

const SWAP_MIN_ACCOUNTS: usize = 17;
const SWAP_V2_ACCOUNTS: usize = 8;
const DEPOSIT_ACCOUNTS: usize = 14;
const WITHDRAW_MIN_ACCOUNTS: usize = 16;
const INITIALIZE2_ACCOUNTS: usize = 21;

#[derive(BorshDeserialize)]
struct Initialize2Args {
    _nonce: u8,
    _open_time: u64,
    init_pc_amount: u64,
    init_coin_amount: u64,
}

#[derive(Debug)]
pub struct RaydiumV4Decoder;

impl ProtocolDecoder for RaydiumV4Decoder {
    fn name(&self) -> &str {
        Protocol::RaydiumV4.as_ref()
    }

    fn decode(
        &self,
        ix: &CanonicalInstruction,
        transfers: &[TransferEvent],
        _balances: &BalanceIndex,
    ) -> Result<Vec<ProtocolAction>, DecodeError> {
        let (&tag, payload) = ix
            .data
            .split_first()
            .ok_or_else(DecodeError::unrecognized_layout)?;
        let kind = RaydiumV4Instruction::from_tag(tag).ok_or_else(DecodeError::unrecognized_layout)?;

        match kind {
            RaydiumV4Instruction::SwapBaseIn | RaydiumV4Instruction::SwapBaseOut => {
                check_len(&ix.data, SWAP_DATA_LEN)?;
                require_accounts(ix, SWAP_MIN_ACCOUNTS)?;
                let n = ix.accounts.len();
                decode_swap(ix, transfers, n - 3, n - 2)
            }
            RaydiumV4Instruction::SwapBaseInV2 | RaydiumV4Instruction::SwapBaseOutV2 => {
                check_len(&ix.data, SWAP_DATA_LEN)?;
                require_accounts(ix, SWAP_V2_ACCOUNTS)?;
                decode_swap(ix, transfers, 5, 6)
            }
            RaydiumV4Instruction::Deposit => {
                check_len(&ix.data, DEPOSIT_DATA_LEN)?;
                require_accounts(ix, DEPOSIT_ACCOUNTS)?;
                decode_deposit(ix, transfers)
            }
            RaydiumV4Instruction::Withdraw => {
                check_len(&ix.data, WITHDRAW_DATA_LEN)?;
                require_accounts(ix, WITHDRAW_MIN_ACCOUNTS)?;
                decode_withdraw(ix, transfers)
            }
            RaydiumV4Instruction::Initialize2 => {
                require_accounts(ix, INITIALIZE2_ACCOUNTS)?;
                let args: Initialize2Args = parse_args(payload, "initialize2")?;
                decode_initialize2(ix, transfers, &args)
            }
            RaydiumV4Instruction::Initialize
            | RaydiumV4Instruction::MonitorStep
            | RaydiumV4Instruction::MigrateToOpenBook
            | RaydiumV4Instruction::SetParams
            | RaydiumV4Instruction::WithdrawPnl
            | RaydiumV4Instruction::WithdrawSrm
            | RaydiumV4Instruction::PreInitialize
            | RaydiumV4Instruction::SimulateInfo
            | RaydiumV4Instruction::AdminCancelOrders
            | RaydiumV4Instruction::CreateConfigAccount
            | RaydiumV4Instruction::UpdateConfigAccount => Ok(Vec::new()),
        }
    }
}

fn check_len(data: &[u8], min: usize) -> Result<(), DecodeError> {
    if data.len() < min {
        return Err(DecodeError::new(format!(
            "unrecognized layout: data length {} below {min}",
            data.len()
        )));
    }
    Ok(())
}

fn decode_swap(
    ix: &CanonicalInstruction,
    transfers: &[TransferEvent],
    user_source: usize,
    user_destination: usize,
) -> Result<Vec<ProtocolAction>, DecodeError> {
    let source = account_at(ix, user_source)?;
    let destination = account_at(ix, user_destination)?;
    let paid = require_transfer(transfer_out_of(transfers, source), "user input")?;
    let received = require_transfer(transfer_into(transfers, destination), "user output")?;

    Ok(vec![ProtocolAction::swap(
        ix,
        account_at(ix, 1)?,
        ActionLeg::from_transfer(paid, LegDirection::In)?,
        ActionLeg::from_transfer(received, LegDirection::Out)?,
    )])
}

fn decode_deposit(
    ix: &CanonicalInstruction,
    transfers: &[TransferEvent],
) -> Result<Vec<ProtocolAction>, DecodeError> {
    let coin = require_transfer(transfer_into(transfers, account_at(ix, 6)?), "coin vault")?;
    let pc = require_transfer(transfer_into(transfers, account_at(ix, 7)?), "pc vault")?;
    let lp = minted(transfers, account_at(ix, 5)?)
        .map(|t| ActionLeg::from_transfer(t, LegDirection::Out))
        .transpose()?;

    Ok(vec![
        ProtocolAction::new(
            ActionKind::AddLiquidity,
            ix,
            account_at(ix, 1)?,
            vec![
                ActionLeg::from_transfer(coin, LegDirection::In)?,
                ActionLeg::from_transfer(pc, LegDirection::In)?,
            ],
        )
        .with_lp_token(lp),
    ])
}

fn decode_withdraw(
    ix: &CanonicalInstruction,
    transfers: &[TransferEvent],
) -> Result<Vec<ProtocolAction>, DecodeError> {
    let coin = require_transfer(transfer_out_of(transfers, account_at(ix, 6)?), "coin vault")?;
    let pc = require_transfer(transfer_out_of(transfers, account_at(ix, 7)?), "pc vault")?;
    let lp = burned(transfers, account_at(ix, 5)?)
        .map(|t| ActionLeg::from_transfer(t, LegDirection::In))
        .transpose()?;

    Ok(vec![
        ProtocolAction::new(
            ActionKind::RemoveLiquidity,
            ix,
            account_at(ix, 1)?,
            vec![
                ActionLeg::from_transfer(coin, LegDirection::Out)?,
                ActionLeg::from_transfer(pc, LegDirection::Out)?,
            ],
        )
        .with_lp_token(lp),
    ])
}

fn decode_initialize2(
    ix: &CanonicalInstruction,
    transfers: &[TransferEvent],
    args: &Initialize2Args,
) -> Result<Vec<ProtocolAction>, DecodeError> {
    let lp = minted(transfers, account_at(ix, 7)?)
        .map(|t| ActionLeg::from_transfer(t, LegDirection::Out))
        .transpose()?;

    Ok(vec![
        ProtocolAction::new(
            ActionKind::CreatePool,
            ix,
            account_at(ix, 4)?,
            vec![
                ActionLeg::new(account_at(ix, 8)?, args.init_coin_amount, LegDirection::In),
                ActionLeg::new(account_at(ix, 9)?, args.init_pc_amount, LegDirection::In),
            ],
        )
        .with_lp_token(lp),
    ])
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;
    use crate::protocols::test_support::{instruction_with, named_accounts, transfer};
    use crate::protocols::{RAYDIUM_V4_PROGRAM_ID, WSOL_MINT};
    use crate::records::TransferKind;

    fn swap_data(tag: u8) -> Vec<u8> {
        let mut data = vec![tag];
        data.extend_from_slice(&1_000_u64.to_le_bytes());
        data.extend_from_slice(&1_u64.to_le_bytes());
        data
    }

    #[test]
    fn swap_base_in_uses_user_account_transfers() {
        let accounts = named_accounts(18);
        let ix = instruction_with(RAYDIUM_V4_PROGRAM_ID, &accounts, swap_data(9));
        let transfers = vec![
            transfer(1, TransferKind::Transfer, WSOL_MINT, 1_000, "acc15", "acc6"),
            transfer(2, TransferKind::Transfer, "TOKEN", 77, "acc5", "acc16"),
        ];
        let actions = RaydiumV4Decoder
            .decode(&ix, &transfers, &BalanceIndex::default())
            .unwrap();
        assert_eq!(actions.len(), 1);
        let swap = &actions[0];
        assert_eq!(swap.kind, ActionKind::Swap);
        assert_eq!(swap.pool_id, "acc1");
        assert_eq!(swap.legs[0], ActionLeg::new(WSOL_MINT, 1_000, LegDirection::In));
        assert_eq!(swap.legs[1], ActionLeg::new("TOKEN", 77, LegDirection::Out));
    }

    #[test]
    fn seventeen_account_swap_shifts_user_accounts() {
        let accounts = named_accounts(17);
        let ix = instruction_with(RAYDIUM_V4_PROGRAM_ID, &accounts, swap_data(11));
        let transfers = vec![
            transfer(1, TransferKind::Transfer, "A", 5, "acc14", "acc4"),
            transfer(2, TransferKind::Transfer, "B", 6, "acc5", "acc15"),
        ];
        let actions = RaydiumV4Decoder
            .decode(&ix, &transfers, &BalanceIndex::default())
            .unwrap();
        assert_eq!(actions[0].legs[0].mint, "A");
        assert_eq!(actions[0].legs[1].mint, "B");
    }

    #[test]
    fn missing_output_transfer_is_a_decode_error() {
        let accounts = named_accounts(8);
        let ix = instruction_with(RAYDIUM_V4_PROGRAM_ID, &accounts, swap_data(16));
        let transfers = vec![transfer(1, TransferKind::Transfer, "A", 5, "acc5", "acc3")];
        let err = RaydiumV4Decoder
            .decode(&ix, &transfers, &BalanceIndex::default())
            .unwrap_err();
        assert_eq!(err.reason, "missing user output transfer");
    }

    #[test]
    fn deposit_reads_vault_transfers_and_lp_mint() {
        let accounts = named_accounts(14);
        let mut data = vec![3];
        for v in [10_u64, 20, 0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let ix = instruction_with(RAYDIUM_V4_PROGRAM_ID, &accounts, data);
        let transfers = vec![
            transfer(1, TransferKind::Transfer, "COIN", 10, "acc9", "acc6"),
            transfer(2, TransferKind::Transfer, "PC", 20, "acc10", "acc7"),
            transfer(3, TransferKind::MintTo, "acc5", 3, "", "acc11"),
        ];
        let actions = RaydiumV4Decoder
            .decode(&ix, &transfers, &BalanceIndex::default())
            .unwrap();
        let add = &actions[0];
        assert_eq!(add.kind, ActionKind::AddLiquidity);
        assert_eq!(add.legs.len(), 2);
        assert_eq!(add.legs[0].mint, "COIN");
        assert_eq!(add.legs[1].raw_amount, 20);
        assert_eq!(add.lp_token.as_ref().unwrap().raw_amount, 3);
    }

    #[test]
    fn withdraw_reads_outgoing_vault_transfers_and_burn() {
        let accounts = named_accounts(16);
        let mut data = vec![4];
        data.extend_from_slice(&9_u64.to_le_bytes());
        let ix = instruction_with(RAYDIUM_V4_PROGRAM_ID, &accounts, data);
        let transfers = vec![
            transfer(1, TransferKind::Transfer, "COIN", 10, "acc6", "userc"),
            transfer(2, TransferKind::Transfer, "PC", 20, "acc7", "userp"),
            transfer(3, TransferKind::Burn, "acc5", 9, "userlp", ""),
        ];
        let actions = RaydiumV4Decoder
            .decode(&ix, &transfers, &BalanceIndex::default())
            .unwrap();
        assert_eq!(actions[0].kind, ActionKind::RemoveLiquidity);
        assert_eq!(actions[0].legs[0].direction, LegDirection::Out);
        assert_eq!(actions[0].lp_token.as_ref().unwrap().direction, LegDirection::In);
    }

    #[test]
    fn initialize2_is_argument_driven() {
        let accounts = named_accounts(21);
        let mut data = vec![1, 254];
        for v in [0_u64, 500, 7_000] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let ix = instruction_with(RAYDIUM_V4_PROGRAM_ID, &accounts, data);
        let actions = RaydiumV4Decoder
            .decode(&ix, &[], &BalanceIndex::default())
            .unwrap();
        let create = &actions[0];
        assert_eq!(create.kind, ActionKind::CreatePool);
        assert_eq!(create.pool_id, "acc4");
        assert_eq!(create.legs[0], ActionLeg::new("acc8", 7_000, LegDirection::In));
        assert_eq!(create.legs[1], ActionLeg::new("acc9", 500, LegDirection::In));
        assert!(create.lp_token.is_none());
    }

    #[test]
    fn admin_calls_decode_to_nothing_and_unknown_tags_fail() {
        let ix = instruction_with(RAYDIUM_V4_PROGRAM_ID, &named_accounts(3), vec![6, 0]);
        assert!(
            RaydiumV4Decoder
                .decode(&ix, &[], &BalanceIndex::default())
                .unwrap()
                .is_empty()
        );

        let bad = instruction_with(RAYDIUM_V4_PROGRAM_ID, &named_accounts(3), vec![200]);
        assert_eq!(
            RaydiumV4Decoder
                .decode(&bad, &[], &BalanceIndex::default())
                .unwrap_err(),
            DecodeError::unrecognized_layout()
        );
    }

    #[test]
    fn short_swap_is_rejected_before_reading_payload() {
        let ix = instruction_with(RAYDIUM_V4_PROGRAM_ID, &named_accounts(18), vec![9, 1, 2]);
        let err = RaydiumV4Decoder
            .decode(&ix, &[], &BalanceIndex::default())
            .unwrap_err();
        assert!(err.reason.starts_with("unrecognized layout"));
    }
}
