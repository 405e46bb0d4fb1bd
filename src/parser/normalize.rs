use crate::error::DecodeError;
use crate::protocols::{ActionKind, ActionLeg, LegDirection, ProtocolAction, is_quote_mint};
use crate::records::{LiquidityChange, LiquidityType, TokenAmount, Trade, TradeType};
use crate::transaction::{BalanceIndex, ParsedTransaction};

/// Canonical record produced from one decoded action.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvent {
    Trade(Trade),
    Liquidity(LiquidityChange),
}

/// Transaction-level stamps shared by every record of one parse.
#[derive(Debug, Clone, Copy)]
pub struct TxContext<'a> {
    pub signature: &'a str,
    pub slot: u64,
    pub timestamp: i64,
    pub user: &'a str,
    pub balances: &'a BalanceIndex,
}

impl<'a> From<&'a ParsedTransaction> for TxContext<'a> {
    fn from(tx: &'a ParsedTransaction) -> Self {
        Self {
            signature: &tx.signature,
            slot: tx.slot,
            timestamp: tx.timestamp,
            user: &tx.signer,
            balances: &tx.balances,
        }
    }
}

/// Buy when quote goes in for a non-quote token, Sell for the reverse.
pub fn classify(input_mint: &str, output_mint: &str) -> TradeType {
    match (is_quote_mint(input_mint), is_quote_mint(output_mint)) {
        (true, false) => TradeType::Buy,
        (false, true) => TradeType::Sell,
        _ => TradeType::Swap,
    }
}

pub fn token_amount(leg: &ActionLeg, balances: &BalanceIndex) -> Result<TokenAmount, DecodeError> {
    let decimals = balances
        .decimals(&leg.mint)
        .or(leg.decimals)
        .ok_or_else(|| DecodeError::new(format!("no decimals recorded for mint {}", leg.mint)))?;
    Ok(TokenAmount::new(leg.mint.clone(), leg.raw_amount, decimals))
}

pub fn normalize(
    action: &ProtocolAction,
    amm: &str,
    ctx: &TxContext<'_>,
) -> Result<NormalizedEvent, DecodeError> {
    match action.kind {
        ActionKind::Swap => normalize_swap(action, amm, ctx).map(NormalizedEvent::Trade),
        ActionKind::AddLiquidity => {
            normalize_liquidity(action, LiquidityType::Add, amm, ctx).map(NormalizedEvent::Liquidity)
        }
        ActionKind::RemoveLiquidity => normalize_liquidity(action, LiquidityType::Remove, amm, ctx)
            .map(NormalizedEvent::Liquidity),
        ActionKind::CreatePool => normalize_liquidity(action, LiquidityType::Create, amm, ctx)
            .map(NormalizedEvent::Liquidity),
    }
}

fn normalize_swap(action: &ProtocolAction, amm: &str, ctx: &TxContext<'_>) -> Result<Trade, DecodeError> {
    let leg = |direction: LegDirection| {
        action
            .legs
            .iter()
            .find(|l| l.direction == direction)
            .ok_or_else(|| DecodeError::new("swap needs one input and one output leg"))
    };
    let input = token_amount(leg(LegDirection::In)?, ctx.balances)?;
    let output = token_amount(leg(LegDirection::Out)?, ctx.balances)?;
    let fee = action
        .fee
        .as_ref()
        .map(|f| token_amount(f, ctx.balances))
        .transpose()?;

    Ok(Trade {
        signature: ctx.signature.to_string(),
        slot: ctx.slot,
        timestamp: ctx.timestamp,
        trade_type: classify(&input.mint, &output.mint),
        user: ctx.user.to_string(),
        input_token: input,
        output_token: output,
        amm: amm.to_string(),
        program_id: action.program_id.clone(),
        pool_id: action.pool_id.clone(),
        position: action.position,
        route: None,
        fee,
    })
}

fn normalize_liquidity(
    action: &ProtocolAction,
    kind: LiquidityType,
    amm: &str,
    ctx: &TxContext<'_>,
) -> Result<LiquidityChange, DecodeError> {
    let mut tokens = action
        .legs
        .iter()
        .map(|l| token_amount(l, ctx.balances))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let (Some(token0), Some(token1)) = (tokens.next(), tokens.next()) else {
        return Err(DecodeError::new("liquidity change needs at least two legs"));
    };
    let lp_token = action
        .lp_token
        .as_ref()
        .map(|l| token_amount(l, ctx.balances))
        .transpose()?;

    Ok(LiquidityChange {
        signature: ctx.signature.to_string(),
        slot: ctx.slot,
        timestamp: ctx.timestamp,
        kind,
        user: ctx.user.to_string(),
        pool_id: action.pool_id.clone(),
        amm: amm.to_string(),
        program_id: action.program_id.clone(),
        position: action.position,
        token0,
        token1,
        extra_tokens: tokens.collect(),
        lp_token,
    })
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::float_cmp,
    reason = "test assertions compare exact decimal shifts"
)]
mod tests {
    use super::*;
    use crate::protocols::test_support::{balance_index, instruction};
    use crate::protocols::{USDC_MINT, WSOL_MINT};

    fn ctx(balances: &BalanceIndex) -> TxContext<'_> {
        TxContext {
            signature: "sig",
            slot: 9,
            timestamp: 1_700_000_000,
            user: "payer",
            balances,
        }
    }

    fn action(kind: ActionKind, legs: Vec<ActionLeg>) -> ProtocolAction {
        ProtocolAction::new(kind, &instruction("prog", &[], vec![]), "pool", legs)
    }

    #[test]
    fn classification_uses_quote_set() {
        assert_eq!(classify(WSOL_MINT, "TOKEN"), TradeType::Buy);
        assert_eq!(classify("TOKEN", USDC_MINT), TradeType::Sell);
        assert_eq!(classify("A", "B"), TradeType::Swap);
        assert_eq!(classify(WSOL_MINT, USDC_MINT), TradeType::Swap);
    }

    #[test]
    fn swap_scales_by_recorded_decimals() {
        let balances = balance_index(&[("ata", "TOKEN", 0, 0, 6)], &[]);
        let swap = action(
            ActionKind::Swap,
            vec![
                ActionLeg::new("TOKEN", 2_500_000, LegDirection::Out),
                ActionLeg::new(WSOL_MINT, 10_000_000, LegDirection::In),
            ],
        )
        .with_fee(Some(ActionLeg::new(WSOL_MINT, 5_000, LegDirection::In)));
        let NormalizedEvent::Trade(trade) = normalize(&swap, "Amm", &ctx(&balances)).unwrap() else {
            panic!("expected a trade");
        };
        assert_eq!(trade.trade_type, TradeType::Buy);
        assert_eq!(trade.input_token.amount, 0.01);
        assert_eq!(trade.output_token.amount, 2.5);
        assert_eq!(trade.output_token.decimals, 6);
        assert_eq!(trade.fee.unwrap().amount, 0.000_005);
        assert_eq!(trade.user, "payer");
        assert_eq!(trade.amm, "Amm");
        assert!(trade.route.is_none());
    }

    #[test]
    fn leg_decimals_used_when_index_is_silent() {
        let leg = ActionLeg {
            decimals: Some(3),
            ..ActionLeg::new("X", 1_234, LegDirection::In)
        };
        let amount = token_amount(&leg, &BalanceIndex::default()).unwrap();
        assert_eq!(amount.amount, 1.234);

        let err = token_amount(&ActionLeg::new("Y", 1, LegDirection::In), &BalanceIndex::default())
            .unwrap_err();
        assert_eq!(err.reason, "no decimals recorded for mint Y");
    }

    #[test]
    fn zero_amount_legs_are_kept() {
        let balances = balance_index(&[("a", "A", 0, 0, 6), ("b", "B", 0, 0, 6)], &[]);
        let add = action(
            ActionKind::AddLiquidity,
            vec![
                ActionLeg::new("A", 0, LegDirection::In),
                ActionLeg::new("B", 7, LegDirection::In),
            ],
        );
        let NormalizedEvent::Liquidity(change) = normalize(&add, "Amm", &ctx(&balances)).unwrap()
        else {
            panic!("expected a liquidity change");
        };
        assert_eq!(change.kind, LiquidityType::Add);
        assert_eq!(change.token0.raw_amount, 0);
        assert_eq!(change.token0.amount, 0.0);
        assert_eq!(change.token1.amount, 0.000_007);
    }

    #[test]
    fn extra_legs_follow_listed_order() {
        let balances = balance_index(
            &[("a", "A", 0, 0, 0), ("b", "B", 0, 0, 0), ("c", "C", 0, 0, 0), ("d", "D", 0, 0, 0)],
            &[],
        );
        let legs = ["A", "B", "C", "D"]
            .iter()
            .map(|m| ActionLeg::new(*m, 1, LegDirection::Out))
            .collect();
        let remove = action(ActionKind::RemoveLiquidity, legs);
        let NormalizedEvent::Liquidity(change) = normalize(&remove, "Amm", &ctx(&balances)).unwrap()
        else {
            panic!("expected a liquidity change");
        };
        assert_eq!(change.token0.mint, "A");
        assert_eq!(change.token1.mint, "B");
        let extra: Vec<&str> = change.extra_tokens.iter().map(|t| t.mint.as_str()).collect();
        assert_eq!(extra, vec!["C", "D"]);
    }

    #[test]
    fn malformed_actions_are_rejected() {
        let balances = balance_index(&[("a", "A", 0, 0, 0)], &[]);
        let one_leg = action(
            ActionKind::CreatePool,
            vec![ActionLeg::new("A", 1, LegDirection::In)],
        );
        assert_eq!(
            normalize(&one_leg, "Amm", &ctx(&balances)).unwrap_err().reason,
            "liquidity change needs at least two legs"
        );

        let no_output = action(
            ActionKind::Swap,
            vec![
                ActionLeg::new("A", 1, LegDirection::In),
                ActionLeg::new("A", 1, LegDirection::In),
            ],
        );
        assert_eq!(
            normalize(&no_output, "Amm", &ctx(&balances)).unwrap_err().reason,
            "swap needs one input and one output leg"
        );
    }
}
