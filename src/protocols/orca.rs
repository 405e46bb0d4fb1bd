use borsh::BorshDeserialize;

use crate::error::DecodeError;
use crate::parser::registry::ProtocolDecoder;
use crate::protocols::{
    ANCHOR_EVENT_TAG, ActionKind, ActionLeg, LegDirection, Protocol, ProtocolAction, account_at,
    discriminator, parse_args, require_accounts, require_transfer, transfer_into, transfer_out_of,
};
use crate::records::TransferEvent;
use crate::transaction::{BalanceIndex, CanonicalInstruction};

const SWAP: [u8; 8] = [248, 198, 158, 145, 225, 117, 135, 200];
const SWAP_V2: [u8; 8] = [43, 4, 237, 11, 26, 201, 30, 98];
const TWO_HOP_SWAP: [u8; 8] = [195, 96, 237, 108, 68, 162, 219, 230];
const TWO_HOP_SWAP_V2: [u8; 8] = [186, 143, 209, 29, 254, 2, 194, 117];
const INCREASE_LIQUIDITY: [u8; 8] = [46, 156, 243, 118, 13, 205, 251, 178];
const DECREASE_LIQUIDITY: [u8; 8] = [160, 38, 208, 111, 104, 91, 44, 1];
const INCREASE_LIQUIDITY_V2: [u8; 8] = [133, 29, 89, 223, 69, 238, 176, 10];
const DECREASE_LIQUIDITY_V2: [u8; 8] = [58, 127, 188, 62, 79, 82, 196, 96];

/// Position management, fee collection and pool administration.
const NON_TRADING: [[u8; 8]; 21] = [
    [135, 128, 47, 77, 15, 152, 240, 49],    // open_position
    [242, 29, 134, 48, 58, 110, 14, 60],     // open_position_with_metadata
    [212, 47, 95, 92, 114, 102, 131, 250],   // open_position_with_token_extensions
    [123, 134, 81, 0, 49, 68, 98, 98],       // close_position
    [1, 182, 135, 59, 155, 25, 99, 223],     // close_position_with_token_extensions
    [164, 152, 207, 99, 30, 186, 19, 182],   // collect_fees
    [207, 117, 95, 191, 229, 180, 226, 15],  // collect_fees_v2
    [70, 5, 132, 87, 86, 235, 177, 34],      // collect_reward
    [177, 107, 37, 180, 160, 19, 49, 209],   // collect_reward_v2
    [22, 67, 23, 98, 150, 178, 70, 220],     // collect_protocol_fees
    [154, 230, 250, 13, 236, 209, 75, 223],  // update_fees_and_rewards
    [11, 188, 193, 214, 141, 91, 149, 184],  // initialize_tick_array
    [95, 180, 10, 172, 84, 174, 232, 40],    // initialize_pool
    [207, 45, 87, 242, 27, 63, 204, 67],     // initialize_pool_v2
    [208, 127, 21, 1, 194, 190, 196, 70],    // initialize_config
    [183, 74, 156, 160, 112, 2, 42, 30],     // initialize_fee_tier
    [95, 135, 192, 196, 242, 129, 230, 68],  // initialize_reward
    [13, 197, 86, 168, 109, 176, 27, 244],   // set_reward_emissions
    [53, 243, 137, 65, 8, 140, 158, 6],      // set_fee_rate
    [95, 7, 4, 50, 154, 79, 156, 131],       // set_protocol_fee_rate
    ANCHOR_EVENT_TAG,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhirlpoolInstruction {
    Swap,
    SwapV2,
    TwoHopSwap,
    TwoHopSwapV2,
    IncreaseLiquidity,
    DecreaseLiquidity,
    IncreaseLiquidityV2,
    DecreaseLiquidityV2,
    NonTrading,
}

impl WhirlpoolInstruction {
    pub fn from_discriminator(disc: [u8; 8]) -> Option<Self> {
        match disc {
            SWAP => Some(Self::Swap),
            SWAP_V2 => Some(Self::SwapV2),
            TWO_HOP_SWAP => Some(Self::TwoHopSwap),
            TWO_HOP_SWAP_V2 => Some(Self::TwoHopSwapV2),
            INCREASE_LIQUIDITY => Some(Self::IncreaseLiquidity),
            DECREASE_LIQUIDITY => Some(Self::DecreaseLiquidity),
            INCREASE_LIQUIDITY_V2 => Some(Self::IncreaseLiquidityV2),
            DECREASE_LIQUIDITY_V2 => Some(Self::DecreaseLiquidityV2),
            d if NON_TRADING.contains(&d) => Some(Self::NonTrading),
            _ => None,
        }
    }
}

#[derive(BorshDeserialize)]
struct SwapArgs {
    _amount: u64,
    _other_amount_threshold: u64,
    _sqrt_price_limit: u128,
    _amount_specified_is_input: bool,
    a_to_b: bool,
}

#[derive(BorshDeserialize)]
struct TwoHopSwapArgs {
    _amount: u64,
    _other_amount_threshold: u64,
    _amount_specified_is_input: bool,
    a_to_b_one: bool,
    a_to_b_two: bool,
    _sqrt_price_limit_one: u128,
    _sqrt_price_limit_two: u128,
}

#[derive(BorshDeserialize)]
struct LiquidityArgs {
    _liquidity_amount: u128,
    _token_a_bound: u64,
    _token_b_bound: u64,
}

/// Account positions of one whirlpool hop within an instruction.
struct HopAccounts {
    whirlpool: usize,
    vault_a: usize,
    vault_b: usize,
}

/// Account positions of a liquidity change within an instruction.
struct PositionAccounts {
    whirlpool: usize,
    vault_a: usize,
    vault_b: usize,
    mints: Option<(usize, usize)>,
}

const SWAP_ACCOUNTS: usize = 11;
const SWAP_V2_ACCOUNTS: usize = 15;
const TWO_HOP_ACCOUNTS: usize = 20;
const TWO_HOP_V2_ACCOUNTS: usize = 24;
const LIQUIDITY_ACCOUNTS: usize = 11;
const LIQUIDITY_V2_ACCOUNTS: usize = 15;

#[derive(Debug)]
pub struct OrcaDecoder;

impl ProtocolDecoder for OrcaDecoder {
    fn name(&self) -> &str {
        Protocol::Orca.as_ref()
    }

    fn decode(
        &self,
        ix: &CanonicalInstruction,
        transfers: &[TransferEvent],
        balances: &BalanceIndex,
    ) -> Result<Vec<ProtocolAction>, DecodeError> {
        let kind = discriminator(&ix.data)
            .and_then(WhirlpoolInstruction::from_discriminator)
            .ok_or_else(DecodeError::unrecognized_layout)?;
        let payload = &ix.data[8..];

        match kind {
            WhirlpoolInstruction::Swap => {
                require_accounts(ix, SWAP_ACCOUNTS)?;
                let args: SwapArgs = parse_args(payload, "swap")?;
                let hop = HopAccounts {
                    whirlpool: 2,
                    vault_a: 4,
                    vault_b: 6,
                };
                Ok(vec![decode_hop(ix, transfers, &hop, args.a_to_b)?])
            }
            WhirlpoolInstruction::SwapV2 => {
                require_accounts(ix, SWAP_V2_ACCOUNTS)?;
                let args: SwapArgs = parse_args(payload, "swap_v2")?;
                let hop = HopAccounts {
                    whirlpool: 4,
                    vault_a: 8,
                    vault_b: 10,
                };
                Ok(vec![decode_hop(ix, transfers, &hop, args.a_to_b)?])
            }
            WhirlpoolInstruction::TwoHopSwap => {
                require_accounts(ix, TWO_HOP_ACCOUNTS)?;
                let args: TwoHopSwapArgs = parse_args(payload, "two_hop_swap")?;
                let one = HopAccounts {
                    whirlpool: 2,
                    vault_a: 5,
                    vault_b: 7,
                };
                let two = HopAccounts {
                    whirlpool: 3,
                    vault_a: 9,
                    vault_b: 11,
                };
                Ok(vec![
                    decode_hop(ix, transfers, &one, args.a_to_b_one)?,
                    decode_hop(ix, transfers, &two, args.a_to_b_two)?,
                ])
            }
            WhirlpoolInstruction::TwoHopSwapV2 => {
                require_accounts(ix, TWO_HOP_V2_ACCOUNTS)?;
                let _: TwoHopSwapArgs = parse_args(payload, "two_hop_swap_v2")?;
                // v2 names the vaults by role, so direction needs no flag.
                let one = HopAccounts {
                    whirlpool: 0,
                    vault_a: 9,
                    vault_b: 10,
                };
                let two = HopAccounts {
                    whirlpool: 1,
                    vault_a: 11,
                    vault_b: 12,
                };
                Ok(vec![
                    decode_hop(ix, transfers, &one, true)?,
                    decode_hop(ix, transfers, &two, true)?,
                ])
            }
            WhirlpoolInstruction::IncreaseLiquidity | WhirlpoolInstruction::DecreaseLiquidity => {
                require_accounts(ix, LIQUIDITY_ACCOUNTS)?;
                let _: LiquidityArgs = parse_args(payload, "liquidity")?;
                let accounts = PositionAccounts {
                    whirlpool: 0,
                    vault_a: 7,
                    vault_b: 8,
                    mints: None,
                };
                let adding = kind == WhirlpoolInstruction::IncreaseLiquidity;
                Ok(vec![decode_position(ix, transfers, balances, &accounts, adding)?])
            }
            WhirlpoolInstruction::IncreaseLiquidityV2
            | WhirlpoolInstruction::DecreaseLiquidityV2 => {
                require_accounts(ix, LIQUIDITY_V2_ACCOUNTS)?;
                let _: LiquidityArgs = parse_args(payload, "liquidity_v2")?;
                let accounts = PositionAccounts {
                    whirlpool: 0,
                    vault_a: 11,
                    vault_b: 12,
                    mints: Some((7, 8)),
                };
                let adding = kind == WhirlpoolInstruction::IncreaseLiquidityV2;
                Ok(vec![decode_position(ix, transfers, balances, &accounts, adding)?])
            }
            WhirlpoolInstruction::NonTrading => Ok(Vec::new()),
        }
    }
}

fn decode_hop(
    ix: &CanonicalInstruction,
    transfers: &[TransferEvent],
    hop: &HopAccounts,
    a_to_b: bool,
) -> Result<ProtocolAction, DecodeError> {
    let (vault_in, vault_out) = if a_to_b {
        (hop.vault_a, hop.vault_b)
    } else {
        (hop.vault_b, hop.vault_a)
    };
    let paid = require_transfer(transfer_into(transfers, account_at(ix, vault_in)?), "input vault")?;
    let received = require_transfer(
        transfer_out_of(transfers, account_at(ix, vault_out)?),
        "output vault",
    )?;
    Ok(ProtocolAction::swap(
        ix,
        account_at(ix, hop.whirlpool)?,
        ActionLeg::from_transfer(paid, LegDirection::In)?,
        ActionLeg::from_transfer(received, LegDirection::Out)?,
    ))
}

/// Concentrated positions out of range move only one token; the idle side
/// becomes a zero leg when its mint is known.
fn decode_position(
    ix: &CanonicalInstruction,
    transfers: &[TransferEvent],
    balances: &BalanceIndex,
    accounts: &PositionAccounts,
    adding: bool,
) -> Result<ProtocolAction, DecodeError> {
    let (kind, direction) = if adding {
        (ActionKind::AddLiquidity, LegDirection::In)
    } else {
        (ActionKind::RemoveLiquidity, LegDirection::Out)
    };

    let leg = |vault_idx: usize, mint_idx: Option<usize>, what: &str| -> Result<ActionLeg, DecodeError> {
        let vault = account_at(ix, vault_idx)?;
        let moved = if adding {
            transfer_into(transfers, vault)
        } else {
            transfer_out_of(transfers, vault)
        };
        if let Some(t) = moved {
            return ActionLeg::from_transfer(t, direction);
        }
        let mint = match mint_idx {
            Some(idx) => Some(account_at(ix, idx)?),
            None => balances.mint_of(vault),
        };
        match mint {
            Some(mint) => Ok(ActionLeg::new(mint, 0, direction)),
            None => Err(DecodeError::new(format!("missing {what} transfer"))),
        }
    };

    let legs = vec![
        leg(accounts.vault_a, accounts.mints.map(|m| m.0), "token a vault")?,
        leg(accounts.vault_b, accounts.mints.map(|m| m.1), "token b vault")?,
    ];
    Ok(ProtocolAction::new(
        kind,
        ix,
        account_at(ix, accounts.whirlpool)?,
        legs,
    ))
}
