//! Output records. Field names and optional-field presence are the wire
//! contract consumers rely on.

use serde::Serialize;

pub const UNKNOWN_SYMBOL: &str = "UNK";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum TradeType {
    Buy,
    Sell,
    Swap,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum LiquidityType {
    Add,
    Remove,
    Create,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
    pub mint: String,
    pub raw_amount: u64,
    pub decimals: u8,
    /// `raw_amount / 10^decimals`.
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl TokenAmount {
    pub fn new(mint: impl Into<String>, raw_amount: u64, decimals: u8) -> Self {
        Self {
            mint: mint.into(),
            raw_amount,
            decimals,
            amount: ui_amount(raw_amount, decimals),
            symbol: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub signature: String,
    pub slot: u64,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub user: String,
    pub input_token: TokenAmount,
    pub output_token: TokenAmount,
    pub amm: String,
    pub program_id: String,
    /// Pool or market the leg executed against.
    pub pool_id: String,
    /// Position of the originating instruction in the instruction tree.
    pub position: usize,
    /// Route number; only present on trades synthesized from a multi-hop route.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<TokenAmount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityChange {
    pub signature: String,
    pub slot: u64,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: LiquidityType,
    pub user: String,
    pub pool_id: String,
    pub amm: String,
    pub program_id: String,
    pub position: usize,
    pub token0: TokenAmount,
    pub token1: TokenAmount,
    /// Legs beyond the second for multi-token pools, in listed order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_tokens: Vec<TokenAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lp_token: Option<TokenAmount>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display, strum_macros::AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum TransferKind {
    Transfer,
    TransferChecked,
    NativeTransfer,
    MintTo,
    Burn,
}

/// One elementary value movement observed in the instruction tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEvent {
    pub position: usize,
    pub kind: TransferKind,
    /// `None` only for a plain `Transfer` whose accounts appear in no balance row.
    pub mint: Option<String>,
    pub raw_amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    /// Empty for `MintTo`.
    pub source: String,
    /// Empty for `Burn`.
    pub destination: String,
    pub authority: String,
    pub program_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub state: bool,
    pub signature: String,
    pub slot: u64,
    pub timestamp: i64,
    /// Transaction fee paid in SOL.
    pub fee: TokenAmount,
    pub trades: Vec<Trade>,
    pub liquidities: Vec<LiquidityChange>,
    pub transfers: Vec<TransferEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

/// Shift `raw` right by `decimals` places.
///
/// The decimal string is built exactly and then parsed, so the result is the
/// `f64` closest to the true quotient rather than the product of two roundings.
pub fn ui_amount(raw: u64, decimals: u8) -> f64 {
    let digits = raw.to_string();
    let decimals = usize::from(decimals);
    let text = if decimals == 0 {
        digits
    } else if digits.len() > decimals {
        let (int, frac) = digits.split_at(digits.len() - decimals);
        format!("{int}.{frac}")
    } else {
        format!("0.{}{digits}", "0".repeat(decimals - digits.len()))
    };
    text.parse().unwrap_or(0.0)
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::float_cmp,
    reason = "test assertions compare exact decimal shifts"
)]
mod tests {
    use super::*;

    fn lcg_next(state: &mut u64) -> u64 {
        *state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1);
        *state
    }

    #[test]
    fn ui_amount_shifts_exactly() {
        assert_eq!(ui_amount(1_950_837_707, 6), 1950.837_707);
        assert_eq!(ui_amount(147_754_335, 9), 0.147_754_335);
        assert_eq!(ui_amount(1, 9), 0.000_000_001);
        assert_eq!(ui_amount(0, 6), 0.0);
        assert_eq!(ui_amount(42, 0), 42.0);
        assert_eq!(ui_amount(50_000_000_000_000, 6), 50_000_000.0);
    }

    #[test]
    fn ui_amount_round_trips_for_randomized_inputs() {
        let mut seed = 0x5EED_u64;
        for _ in 0..20_000 {
            // Leave headroom below 2^53 so the two roundings stay under half a unit.
            let raw = lcg_next(&mut seed) % (1_u64 << 50);
            let decimals = (lcg_next(&mut seed) % 10) as u8;
            let amount = ui_amount(raw, decimals);
            let back = (amount * 10_f64.powi(i32::from(decimals))).round() as u64;
            assert_eq!(back, raw, "raw={raw} decimals={decimals}");
        }
    }

    #[test]
    fn enum_wire_names_are_uppercase() {
        assert_eq!(
            serde_json::to_value(TradeType::Buy).unwrap(),
            serde_json::json!("BUY")
        );
        assert_eq!(LiquidityType::Create.to_string(), "CREATE");
        assert_eq!("REMOVE".parse::<LiquidityType>().ok(), Some(LiquidityType::Remove));
    }

    #[test]
    fn optional_fields_are_omitted() {
        let token = TokenAmount::new("m", 1, 0);
        let value = serde_json::to_value(&token).unwrap();
        assert!(value.get("symbol").is_none());
        assert_eq!(value["rawAmount"], 1);
    }
}
