use borsh::BorshDeserialize;

use crate::error::DecodeError;
use crate::parser::registry::ProtocolDecoder;
use crate::protocols::{
    ANCHOR_EVENT_TAG, ActionKind, ActionLeg, LegDirection, Protocol, ProtocolAction, account_at,
    discriminator, parse_args, require_accounts, require_transfer, transfer_into, transfer_out_of,
};
use crate::records::TransferEvent;
use crate::transaction::{BalanceIndex, CanonicalInstruction};

const SWAP_BASE_INPUT: [u8; 8] = [143, 190, 90, 218, 196, 30, 51, 222];
const SWAP_BASE_OUTPUT: [u8; 8] = [55, 217, 98, 86, 163, 74, 180, 173];
const INITIALIZE: [u8; 8] = [175, 175, 109, 31, 13, 152, 155, 237];
const DEPOSIT: [u8; 8] = [242, 35, 198, 137, 82, 225, 242, 182];
const WITHDRAW: [u8; 8] = [183, 18, 70, 156, 148, 109, 161, 34];

const ADMIN: [[u8; 8]; 6] = [
    [137, 52, 237, 212, 215, 117, 108, 104], // create_amm_config
    [49, 60, 174, 136, 154, 28, 116, 200],   // update_amm_config
    [130, 87, 108, 6, 46, 224, 117, 123],    // update_pool_status
    [136, 136, 252, 221, 194, 66, 126, 89],  // collect_protocol_fee
    [167, 138, 78, 149, 223, 194, 6, 126],   // collect_fund_fee
    ANCHOR_EVENT_TAG,
];

const SWAP_ACCOUNTS: usize = 13;
const INITIALIZE_ACCOUNTS: usize = 20;
const DEPOSIT_ACCOUNTS: usize = 13;
const WITHDRAW_ACCOUNTS: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpmmInstruction {
    SwapBaseInput,
    SwapBaseOutput,
    Initialize,
    Deposit,
    Withdraw,
    Admin,
}

impl CpmmInstruction {
    pub fn from_discriminator(disc: [u8; 8]) -> Option<Self> {
        match disc {
            SWAP_BASE_INPUT => Some(Self::SwapBaseInput),
            SWAP_BASE_OUTPUT => Some(Self::SwapBaseOutput),
            INITIALIZE => Some(Self::Initialize),
            DEPOSIT => Some(Self::Deposit),
            WITHDRAW => Some(Self::Withdraw),
            d if ADMIN.contains(&d) => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(BorshDeserialize)]
struct SwapArgs {
    _amount: u64,
    _threshold: u64,
}

#[derive(BorshDeserialize)]
struct InitializeArgs {
    init_amount_0: u64,
    init_amount_1: u64,
    _open_time: u64,
}

/// Shared by deposit (maximums) and withdraw (minimums).
#[derive(BorshDeserialize)]
struct LiquidityArgs {
    lp_token_amount: u64,
    _token_0_bound: u64,
    _token_1_bound: u64,
}

#[derive(Debug)]
pub struct RaydiumCpmmDecoder;

impl ProtocolDecoder for RaydiumCpmmDecoder {
    fn name(&self) -> &str {
        Protocol::RaydiumCpmm.as_ref()
    }

    fn decode(
        &self,
        ix: &CanonicalInstruction,
        transfers: &[TransferEvent],
        balances: &BalanceIndex,
    ) -> Result<Vec<ProtocolAction>, DecodeError> {
        let kind = discriminator(&ix.data)
            .and_then(CpmmInstruction::from_discriminator)
            .ok_or_else(DecodeError::unrecognized_layout)?;
        let payload = &ix.data[8..];

        match kind {
            CpmmInstruction::SwapBaseInput | CpmmInstruction::SwapBaseOutput => {
                require_accounts(ix, SWAP_ACCOUNTS)?;
                let _: SwapArgs = parse_args(payload, "swap")?;
                decode_swap(ix, balances)
            }
            CpmmInstruction::Initialize => {
                require_accounts(ix, INITIALIZE_ACCOUNTS)?;
                let args: InitializeArgs = parse_args(payload, "initialize")?;
                Ok(vec![
                    ProtocolAction::new(
                        ActionKind::CreatePool,
                        ix,
                        account_at(ix, 3)?,
                        vec![
                            ActionLeg::new(account_at(ix, 4)?, args.init_amount_0, LegDirection::In),
                            ActionLeg::new(account_at(ix, 5)?, args.init_amount_1, LegDirection::In),
                        ],
                    ),
                ])
            }
            CpmmInstruction::Deposit => {
                require_accounts(ix, DEPOSIT_ACCOUNTS)?;
                let args: LiquidityArgs = parse_args(payload, "deposit")?;
                decode_liquidity(ix, transfers, &args, ActionKind::AddLiquidity)
            }
            CpmmInstruction::Withdraw => {
                require_accounts(ix, WITHDRAW_ACCOUNTS)?;
                let args: LiquidityArgs = parse_args(payload, "withdraw")?;
                decode_liquidity(ix, transfers, &args, ActionKind::RemoveLiquidity)
            }
            CpmmInstruction::Admin => Ok(Vec::new()),
        }
    }
}

/// The swap arguments only bound the trade; executed amounts are the vault deltas.
fn decode_swap(
    ix: &CanonicalInstruction,
    balances: &BalanceIndex,
) -> Result<Vec<ProtocolAction>, DecodeError> {
    let input_vault = account_at(ix, 6)?;
    let output_vault = account_at(ix, 7)?;

    let input = balances
        .account(input_vault)
        .ok_or_else(|| DecodeError::new("missing input vault balance"))?;
    let output = balances
        .account(output_vault)
        .ok_or_else(|| DecodeError::new("missing output vault balance"))?;

    let paid = u64::try_from(input.delta())
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| DecodeError::new("input vault balance did not increase"))?;
    let received = u64::try_from(-output.delta())
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| DecodeError::new("output vault balance did not decrease"))?;

    let leg = |mint_idx: usize,
               raw: u64,
               direction: LegDirection,
               decimals: u8|
     -> Result<ActionLeg, DecodeError> {
        Ok(ActionLeg {
            decimals: Some(decimals),
            ..ActionLeg::new(account_at(ix, mint_idx)?, raw, direction)
        })
    };

    Ok(vec![ProtocolAction::swap(
        ix,
        account_at(ix, 3)?,
        leg(10, paid, LegDirection::In, input.decimals)?,
        leg(11, received, LegDirection::Out, output.decimals)?,
    )])
}

fn decode_liquidity(
    ix: &CanonicalInstruction,
    transfers: &[TransferEvent],
    args: &LiquidityArgs,
    kind: ActionKind,
) -> Result<Vec<ProtocolAction>, DecodeError> {
    let vault_0 = account_at(ix, 6)?;
    let vault_1 = account_at(ix, 7)?;
    let lp_mint = account_at(ix, 12)?;

    let (legs, lp) = if kind == ActionKind::AddLiquidity {
        let t0 = require_transfer(transfer_into(transfers, vault_0), "token 0 vault")?;
        let t1 = require_transfer(transfer_into(transfers, vault_1), "token 1 vault")?;
        (
            vec![
                ActionLeg::from_transfer(t0, LegDirection::In)?,
                ActionLeg::from_transfer(t1, LegDirection::In)?,
            ],
            ActionLeg::new(lp_mint, args.lp_token_amount, LegDirection::Out),
        )
    } else {
        let t0 = require_transfer(transfer_out_of(transfers, vault_0), "token 0 vault")?;
        let t1 = require_transfer(transfer_out_of(transfers, vault_1), "token 1 vault")?;
        (
            vec![
                ActionLeg::from_transfer(t0, LegDirection::Out)?,
                ActionLeg::from_transfer(t1, LegDirection::Out)?,
            ],
            ActionLeg::new(lp_mint, args.lp_token_amount, LegDirection::In),
        )
    };

    Ok(vec![
        ProtocolAction::new(kind, ix, account_at(ix, 2)?, legs).with_lp_token(Some(lp)),
    ])
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;
    use crate::protocols::RAYDIUM_CPMM_PROGRAM_ID;
    use crate::protocols::test_support::{
        balance_index, instruction_with, named_accounts, transfer, with_disc,
    };
    use crate::records::TransferKind;

    fn swap_ix() -> CanonicalInstruction {
        instruction_with(
            RAYDIUM_CPMM_PROGRAM_ID,
            &named_accounts(13),
            with_disc(SWAP_BASE_INPUT, &[&100_u64.to_le_bytes(), &1_u64.to_le_bytes()]),
        )
    }

    #[test]
    fn swap_amounts_come_from_vault_deltas() {
        let balances = balance_index(
            &[
                ("acc6", "acc10", 1_000, 1_250, 9),
                ("acc7", "acc11", 9_000, 8_100, 6),
            ],
            &[],
        );
        let actions = RaydiumCpmmDecoder.decode(&swap_ix(), &[], &balances).unwrap();
        let swap = &actions[0];
        assert_eq!(swap.pool_id, "acc3");
        assert_eq!(swap.legs[0].mint, "acc10");
        assert_eq!(swap.legs[0].raw_amount, 250);
        assert_eq!(swap.legs[0].decimals, Some(9));
        assert_eq!(swap.legs[1].mint, "acc11");
        assert_eq!(swap.legs[1].raw_amount, 900);
        assert_eq!(swap.legs[1].direction, LegDirection::Out);
    }

    #[test]
    fn swap_without_vault_snapshot_fails() {
        let balances = balance_index(&[("acc6", "acc10", 1, 2, 9)], &[]);
        let err = RaydiumCpmmDecoder
            .decode(&swap_ix(), &[], &balances)
            .unwrap_err();
        assert_eq!(err.reason, "missing output vault balance");
    }

    #[test]
    fn swap_with_flat_vault_fails() {
        let balances = balance_index(
            &[("acc6", "acc10", 5, 5, 9), ("acc7", "acc11", 9, 1, 6)],
            &[],
        );
        let err = RaydiumCpmmDecoder
            .decode(&swap_ix(), &[], &balances)
            .unwrap_err();
        assert_eq!(err.reason, "input vault balance did not increase");
    }

    #[test]
    fn initialize_reads_arguments() {
        let ix = instruction_with(
            RAYDIUM_CPMM_PROGRAM_ID,
            &named_accounts(20),
            with_disc(
                INITIALIZE,
                &[&11_u64.to_le_bytes(), &22_u64.to_le_bytes(), &0_u64.to_le_bytes()],
            ),
        );
        let actions = RaydiumCpmmDecoder
            .decode(&ix, &[], &BalanceIndex::default())
            .unwrap();
        assert_eq!(actions[0].kind, ActionKind::CreatePool);
        assert_eq!(actions[0].legs[0], ActionLeg::new("acc4", 11, LegDirection::In));
        assert_eq!(actions[0].legs[1], ActionLeg::new("acc5", 22, LegDirection::In));
    }

    #[test]
    fn withdraw_uses_transfers_and_lp_argument() {
        let ix = instruction_with(
            RAYDIUM_CPMM_PROGRAM_ID,
            &named_accounts(14),
            with_disc(
                WITHDRAW,
                &[&500_u64.to_le_bytes(), &0_u64.to_le_bytes(), &0_u64.to_le_bytes()],
            ),
        );
        let transfers = vec![
            transfer(1, TransferKind::Burn, "acc12", 500, "acc3", ""),
            transfer(2, TransferKind::TransferChecked, "acc10", 40, "acc6", "acc4"),
            transfer(3, TransferKind::TransferChecked, "acc11", 60, "acc7", "acc5"),
        ];
        let actions = RaydiumCpmmDecoder
            .decode(&ix, &transfers, &BalanceIndex::default())
            .unwrap();
        let remove = &actions[0];
        assert_eq!(remove.kind, ActionKind::RemoveLiquidity);
        assert_eq!(remove.pool_id, "acc2");
        assert_eq!(remove.legs[0].raw_amount, 40);
        assert_eq!(remove.legs[1].raw_amount, 60);
        assert_eq!(
            remove.lp_token,
            Some(ActionLeg::new("acc12", 500, LegDirection::In))
        );
    }

    #[test]
    fn deposit_missing_vault_transfer_fails() {
        let ix = instruction_with(
            RAYDIUM_CPMM_PROGRAM_ID,
            &named_accounts(13),
            with_disc(
                DEPOSIT,
                &[&1_u64.to_le_bytes(), &9_u64.to_le_bytes(), &9_u64.to_le_bytes()],
            ),
        );
        let transfers = vec![transfer(1, TransferKind::Transfer, "acc10", 4, "acc4", "acc6")];
        let err = RaydiumCpmmDecoder
            .decode(&ix, &transfers, &BalanceIndex::default())
            .unwrap_err();
        assert_eq!(err.reason, "missing token 1 vault transfer");
    }

    #[test]
    fn admin_and_event_records_are_silent() {
        for disc in ADMIN {
            let ix = instruction_with(RAYDIUM_CPMM_PROGRAM_ID, &named_accounts(2), disc.to_vec());
            assert!(
                RaydiumCpmmDecoder
                    .decode(&ix, &[], &BalanceIndex::default())
                    .unwrap()
                    .is_empty()
            );
        }
    }

    #[test]
    fn layout_errors() {
        let unknown = instruction_with(RAYDIUM_CPMM_PROGRAM_ID, &named_accounts(13), vec![0; 24]);
        assert_eq!(
            RaydiumCpmmDecoder
                .decode(&unknown, &[], &BalanceIndex::default())
                .unwrap_err(),
            DecodeError::unrecognized_layout()
        );

        let short_args = instruction_with(
            RAYDIUM_CPMM_PROGRAM_ID,
            &named_accounts(13),
            with_disc(SWAP_BASE_OUTPUT, &[&1_u64.to_le_bytes()]),
        );
        let err = RaydiumCpmmDecoder
            .decode(&short_args, &[], &BalanceIndex::default())
            .unwrap_err();
        assert!(err.reason.starts_with("unrecognized layout: swap arguments"));

        let few_accounts = instruction_with(RAYDIUM_CPMM_PROGRAM_ID, &named_accounts(5), swap_ix().data);
        assert!(
            RaydiumCpmmDecoder
                .decode(&few_accounts, &[], &BalanceIndex::default())
                .unwrap_err()
                .reason
                .contains("expected at least 13 accounts")
        );
    }
}
