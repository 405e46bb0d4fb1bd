use borsh::BorshDeserialize;

use crate::error::DecodeError;
use crate::parser::registry::ProtocolDecoder;
use crate::protocols::{
    ANCHOR_EVENT_TAG, ActionLeg, LegDirection, NATIVE_SOL_DECIMALS, Protocol, ProtocolAction,
    WSOL_MINT, account_at, discriminator, parse_args, require_accounts, require_transfer,
};
use crate::records::{TransferEvent, TransferKind};
use crate::transaction::{BalanceIndex, CanonicalInstruction};

const BUY: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
const SELL: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];

/// Launch, migration and curve administration.
const NON_TRADING: [[u8; 8]; 8] = [
    [24, 30, 200, 40, 5, 28, 7, 119],       // create
    [183, 18, 70, 156, 148, 109, 161, 34],  // withdraw
    [155, 234, 231, 146, 236, 158, 162, 30], // migrate
    [175, 175, 109, 31, 13, 152, 155, 237], // initialize
    [27, 234, 178, 52, 147, 2, 187, 141],   // set_params
    [234, 102, 194, 203, 150, 72, 62, 229], // extend_account
    [20, 22, 86, 123, 198, 28, 219, 132],   // collect_creator_fee
    ANCHOR_EVENT_TAG,
];

const TRADE_ACCOUNTS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpfunInstruction {
    Buy,
    Sell,
    NonTrading,
}

impl PumpfunInstruction {
    pub fn from_discriminator(disc: [u8; 8]) -> Option<Self> {
        match disc {
            BUY => Some(Self::Buy),
            SELL => Some(Self::Sell),
            d if NON_TRADING.contains(&d) => Some(Self::NonTrading),
            _ => None,
        }
    }
}

/// `max_sol_cost` on buy, `min_sol_output` on sell.
#[derive(BorshDeserialize)]
struct TradeArgs {
    amount: u64,
    _sol_bound: u64,
}

struct TradeAccounts<'a> {
    fee_recipient: &'a str,
    mint: &'a str,
    bonding_curve: &'a str,
}

impl<'a> TradeAccounts<'a> {
    fn resolve(ix: &'a CanonicalInstruction) -> Result<Self, DecodeError> {
        require_accounts(ix, TRADE_ACCOUNTS)?;
        Ok(Self {
            fee_recipient: account_at(ix, 1)?,
            mint: account_at(ix, 2)?,
            bonding_curve: account_at(ix, 3)?,
        })
    }
}

#[derive(Debug)]
pub struct PumpfunDecoder;

impl ProtocolDecoder for PumpfunDecoder {
    fn name(&self) -> &str {
        Protocol::Pumpfun.as_ref()
    }

    fn decode(
        &self,
        ix: &CanonicalInstruction,
        transfers: &[TransferEvent],
        balances: &BalanceIndex,
    ) -> Result<Vec<ProtocolAction>, DecodeError> {
        let kind = discriminator(&ix.data)
            .and_then(PumpfunInstruction::from_discriminator)
            .ok_or_else(DecodeError::unrecognized_layout)?;

        match kind {
            PumpfunInstruction::Buy => {
                let args: TradeArgs = parse_args(&ix.data[8..], "buy")?;
                decode_buy(ix, transfers, &args)
            }
            PumpfunInstruction::Sell => {
                let args: TradeArgs = parse_args(&ix.data[8..], "sell")?;
                decode_sell(ix, balances, &args)
            }
            PumpfunInstruction::NonTrading => Ok(Vec::new()),
        }
    }
}

fn sol_leg(raw_amount: u64, direction: LegDirection) -> ActionLeg {
    ActionLeg {
        decimals: Some(NATIVE_SOL_DECIMALS),
        ..ActionLeg::new(WSOL_MINT, raw_amount, direction)
    }
}

/// SOL paid into the curve is a system transfer; the fee is a second one
/// to the fee recipient.
fn decode_buy(
    ix: &CanonicalInstruction,
    transfers: &[TransferEvent],
    args: &TradeArgs,
) -> Result<Vec<ProtocolAction>, DecodeError> {
    let accounts = TradeAccounts::resolve(ix)?;
    let native_into = |account: &str| {
        transfers
            .iter()
            .find(|t| t.kind == TransferKind::NativeTransfer && t.destination == account)
    };

    let paid = require_transfer(native_into(accounts.bonding_curve), "bonding curve")?;
    let fee = native_into(accounts.fee_recipient).map(|t| sol_leg(t.raw_amount, LegDirection::In));

    Ok(vec![
        ProtocolAction::swap(
            ix,
            accounts.bonding_curve,
            sol_leg(paid.raw_amount, LegDirection::In),
            ActionLeg::new(accounts.mint, args.amount, LegDirection::Out),
        )
        .with_fee(fee),
    ])
}

/// The program moves lamports out of the curve directly, so the SOL side is
/// read from lamport balances: the curve's loss, less the fee recipient's gain.
fn decode_sell(
    ix: &CanonicalInstruction,
    balances: &BalanceIndex,
    args: &TradeArgs,
) -> Result<Vec<ProtocolAction>, DecodeError> {
    let accounts = TradeAccounts::resolve(ix)?;
    let curve_loss = balances
        .lamport_delta(accounts.bonding_curve)
        .and_then(|d| u64::try_from(-d).ok())
        .filter(|v| *v > 0)
        .ok_or_else(|| DecodeError::new("missing bonding curve lamport outflow"))?;
    let fee = balances
        .lamport_delta(accounts.fee_recipient)
        .and_then(|d| u64::try_from(d).ok())
        .filter(|v| *v > 0 && *v < curve_loss);

    Ok(vec![
        ProtocolAction::swap(
            ix,
            accounts.bonding_curve,
            ActionLeg::new(accounts.mint, args.amount, LegDirection::In),
            sol_leg(curve_loss - fee.unwrap_or(0), LegDirection::Out),
        )
        .with_fee(fee.map(|f| sol_leg(f, LegDirection::In))),
    ])
}
