use borsh::BorshDeserialize;

use crate::error::DecodeError;
use crate::parser::registry::ProtocolDecoder;
use crate::protocols::{
    ANCHOR_EVENT_TAG, ActionKind, ActionLeg, LegDirection, Protocol, ProtocolAction, account_at,
    discriminator, minted, parse_args, require_accounts, require_transfer, transfer_into,
    transfer_out_of,
};
use crate::records::{TransferEvent, TransferKind};
use crate::transaction::{BalanceIndex, CanonicalInstruction};

const BUY: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
const SELL: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];
const CREATE_POOL: [u8; 8] = [233, 146, 209, 142, 207, 104, 64, 188];
const DEPOSIT: [u8; 8] = [242, 35, 198, 137, 82, 225, 242, 182];
const WITHDRAW: [u8; 8] = [183, 18, 70, 156, 148, 109, 161, 34];

const NON_TRADING: [[u8; 8]; 7] = [
    [201, 207, 243, 114, 75, 111, 47, 189], // create_config
    [164, 84, 130, 189, 111, 58, 250, 200], // update_global_config
    [234, 102, 194, 203, 150, 72, 62, 229], // extend_account
    [160, 57, 89, 42, 181, 139, 43, 66],    // collect_coin_creator_fee
    [210, 149, 128, 45, 188, 58, 78, 175],  // set_coin_creator
    [242, 40, 117, 145, 73, 96, 105, 104],  // admin_set_coin_creator
    ANCHOR_EVENT_TAG,
];

const TRADE_ACCOUNTS: usize = 17;
const CREATE_POOL_ACCOUNTS: usize = 18;
const LIQUIDITY_ACCOUNTS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpswapInstruction {
    Buy,
    Sell,
    CreatePool,
    Deposit,
    Withdraw,
    NonTrading,
}

impl PumpswapInstruction {
    pub fn from_discriminator(disc: [u8; 8]) -> Option<Self> {
        match disc {
            BUY => Some(Self::Buy),
            SELL => Some(Self::Sell),
            CREATE_POOL => Some(Self::CreatePool),
            DEPOSIT => Some(Self::Deposit),
            WITHDRAW => Some(Self::Withdraw),
            d if NON_TRADING.contains(&d) => Some(Self::NonTrading),
            _ => None,
        }
    }
}

/// `base_amount_out/max_quote_amount_in` on buy,
/// `base_amount_in/min_quote_amount_out` on sell.
#[derive(BorshDeserialize)]
struct TradeArgs {
    _base_amount: u64,
    _quote_bound: u64,
}

#[derive(BorshDeserialize)]
struct CreatePoolArgs {
    _index: u16,
    base_amount_in: u64,
    quote_amount_in: u64,
}

#[derive(BorshDeserialize)]
struct LiquidityArgs {
    lp_token_amount: u64,
    _base_bound: u64,
    _quote_bound: u64,
}

#[derive(Debug)]
pub struct PumpswapDecoder;

impl ProtocolDecoder for PumpswapDecoder {
    fn name(&self) -> &str {
        Protocol::Pumpswap.as_ref()
    }

    fn decode(
        &self,
        ix: &CanonicalInstruction,
        transfers: &[TransferEvent],
        _balances: &BalanceIndex,
    ) -> Result<Vec<ProtocolAction>, DecodeError> {
        let kind = discriminator(&ix.data)
            .and_then(PumpswapInstruction::from_discriminator)
            .ok_or_else(DecodeError::unrecognized_layout)?;
        let payload = &ix.data[8..];

        match kind {
            PumpswapInstruction::Buy | PumpswapInstruction::Sell => {
                require_accounts(ix, TRADE_ACCOUNTS)?;
                let _: TradeArgs = parse_args(payload, "trade")?;
                decode_trade(ix, transfers, kind == PumpswapInstruction::Buy)
            }
            PumpswapInstruction::CreatePool => {
                require_accounts(ix, CREATE_POOL_ACCOUNTS)?;
                let args: CreatePoolArgs = parse_args(payload, "create_pool")?;
                let lp = minted(transfers, account_at(ix, 5)?)
                    .map(|t| ActionLeg::from_transfer(t, LegDirection::Out))
                    .transpose()?;
                Ok(vec![
                    ProtocolAction::new(
                        ActionKind::CreatePool,
                        ix,
                        account_at(ix, 0)?,
                        vec![
                            ActionLeg::new(account_at(ix, 3)?, args.base_amount_in, LegDirection::In),
                            ActionLeg::new(account_at(ix, 4)?, args.quote_amount_in, LegDirection::In),
                        ],
                    )
                    .with_lp_token(lp),
                ])
            }
            PumpswapInstruction::Deposit | PumpswapInstruction::Withdraw => {
                require_accounts(ix, LIQUIDITY_ACCOUNTS)?;
                let args: LiquidityArgs = parse_args(payload, "liquidity")?;
                decode_liquidity(ix, transfers, &args, kind == PumpswapInstruction::Deposit)
            }
            PumpswapInstruction::NonTrading => Ok(Vec::new()),
        }
    }
}

fn transfer_between<'a>(
    transfers: &'a [TransferEvent],
    source: &str,
    destination: &str,
) -> Option<&'a TransferEvent> {
    transfers.iter().find(|t| {
        matches!(t.kind, TransferKind::Transfer | TransferKind::TransferChecked)
            && t.source == source
            && t.destination == destination
    })
}

/// Buys pay quote into the pool and take base out; sells the reverse. The
/// protocol fee is a separate transfer into the fee recipient's account.
fn decode_trade(
    ix: &CanonicalInstruction,
    transfers: &[TransferEvent],
    buy: bool,
) -> Result<Vec<ProtocolAction>, DecodeError> {
    let user_base = account_at(ix, 5)?;
    let user_quote = account_at(ix, 6)?;
    let pool_base = account_at(ix, 7)?;
    let pool_quote = account_at(ix, 8)?;
    let fee_account = account_at(ix, 10)?;

    let (paid, received) = if buy {
        (
            require_transfer(transfer_between(transfers, user_quote, pool_quote), "quote input")?,
            require_transfer(transfer_between(transfers, pool_base, user_base), "base output")?,
        )
    } else {
        (
            require_transfer(transfer_between(transfers, user_base, pool_base), "base input")?,
            require_transfer(transfer_between(transfers, pool_quote, user_quote), "quote output")?,
        )
    };
    let fee = transfer_into(transfers, fee_account)
        .map(|t| ActionLeg::from_transfer(t, LegDirection::In))
        .transpose()?;

    Ok(vec![
        ProtocolAction::swap(
            ix,
            account_at(ix, 0)?,
            ActionLeg::from_transfer(paid, LegDirection::In)?,
            ActionLeg::from_transfer(received, LegDirection::Out)?,
        )
        .with_fee(fee),
    ])
}

fn decode_liquidity(
    ix: &CanonicalInstruction,
    transfers: &[TransferEvent],
    args: &LiquidityArgs,
    deposit: bool,
) -> Result<Vec<ProtocolAction>, DecodeError> {
    let pool_base = account_at(ix, 9)?;
    let pool_quote = account_at(ix, 10)?;
    let lp_mint = account_at(ix, 5)?;

    let (kind, direction, base, quote) = if deposit {
        (
            ActionKind::AddLiquidity,
            LegDirection::In,
            transfer_into(transfers, pool_base),
            transfer_into(transfers, pool_quote),
        )
    } else {
        (
            ActionKind::RemoveLiquidity,
            LegDirection::Out,
            transfer_out_of(transfers, pool_base),
            transfer_out_of(transfers, pool_quote),
        )
    };
    let base = require_transfer(base, "pool base")?;
    let quote = require_transfer(quote, "pool quote")?;
    let lp_direction = if deposit {
        LegDirection::Out
    } else {
        LegDirection::In
    };

    Ok(vec![
        ProtocolAction::new(
            kind,
            ix,
            account_at(ix, 0)?,
            vec![
                ActionLeg::from_transfer(base, direction)?,
                ActionLeg::from_transfer(quote, direction)?,
            ],
        )
        .with_lp_token(Some(ActionLeg::new(lp_mint, args.lp_token_amount, lp_direction))),
    ])
}
