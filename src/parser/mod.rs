//! Parse orchestration.
//!
//! One call walks `Start → Dispatching → Aggregating → Done`: build the
//! instruction tree, hand every registered instruction and its subtree
//! transfers to a decoder, normalize the actions, then collapse routes.

pub mod normalize;
pub mod registry;
pub mod route;

use crate::error::{DecodeError, Error};
use crate::records::{LiquidityChange, ParseResult, TokenAmount, Trade};
use crate::transaction::transfers::TransferExtractor;
use crate::transaction::{self, ParsedTransaction};
use crate::types::{ParseOptions, RawTransaction};
use normalize::{NormalizedEvent, TxContext};
pub use registry::{DecoderRegistry, ProtocolDecoder, decoder_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Start,
    Dispatching,
    Aggregating,
    Done,
}

/// Decode failures of one parse, tagged with the instruction that raised them.
#[derive(Debug, Default)]
struct Diagnostics {
    messages: Vec<String>,
}

impl Diagnostics {
    /// Record `err`, or turn it into the call's error when the policy says raise.
    fn report(
        &mut self,
        err: DecodeError,
        program_id: &str,
        position: usize,
        options: &ParseOptions,
    ) -> Result<(), Error> {
        if options.throw_error {
            return Err(err.into_error(program_id));
        }
        tracing::warn!(program_id, position, reason = %err, "decode failed");
        self.messages
            .push(format!("{program_id} at instruction {position}: {err}"));
        Ok(())
    }

    fn into_msg(self) -> Option<String> {
        (!self.messages.is_empty()).then(|| self.messages.join("; "))
    }
}

/// Stateless transaction parser over an immutable decoder registry.
pub struct DexParser {
    registry: DecoderRegistry,
}

impl Default for DexParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DexParser {
    /// Parser with every built-in protocol decoder registered.
    pub fn new() -> Self {
        Self::with_registry(DecoderRegistry::with_defaults())
    }

    pub fn with_registry(registry: DecoderRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    pub fn parse_all(&self, tx: &RawTransaction, options: &ParseOptions) -> Result<ParseResult, Error> {
        let signature = tx.signature();
        tracing::debug!(signature, stage = %Stage::Start, "parse");

        if tx.is_failed() {
            tracing::debug!(signature, stage = %Stage::Done, "failed transaction, nothing to extract");
            return Ok(failed_result(tx));
        }

        let parsed = transaction::build(tx)?;
        let extractor = TransferExtractor::new(&parsed.tree, &parsed.balances);

        tracing::debug!(signature, stage = %Stage::Dispatching, instructions = parsed.tree.len(), "parse");
        let mut diagnostics = Diagnostics::default();
        let (trades, liquidities) = self.dispatch(&parsed, &extractor, options, &mut diagnostics)?;

        tracing::debug!(signature, stage = %Stage::Aggregating, trades = trades.len(), "parse");
        let trades = route::collapse_routes(trades, &parsed.tree);
        let msg = diagnostics.into_msg();

        let result = ParseResult {
            state: msg.is_none(),
            signature: parsed.signature.clone(),
            slot: parsed.slot,
            timestamp: parsed.timestamp,
            fee: parsed.fee(),
            trades,
            liquidities,
            transfers: extractor.into_events(),
            msg,
        };
        tracing::debug!(
            signature,
            stage = %Stage::Done,
            trades = result.trades.len(),
            liquidities = result.liquidities.len(),
            state = result.state,
            "parse"
        );
        Ok(result)
    }

    pub fn parse_trades(&self, tx: &RawTransaction, options: &ParseOptions) -> Result<Vec<Trade>, Error> {
        self.parse_all(tx, options).map(|r| r.trades)
    }

    pub fn parse_liquidity(
        &self,
        tx: &RawTransaction,
        options: &ParseOptions,
    ) -> Result<Vec<LiquidityChange>, Error> {
        self.parse_all(tx, options).map(|r| r.liquidities)
    }

    /// Decode and normalize every allowed instruction with a registered decoder, in
    /// tree order. Nested calls are visited too, so AMM hops under a router are seen.
    fn dispatch(
        &self,
        parsed: &ParsedTransaction,
        extractor: &TransferExtractor,
        options: &ParseOptions,
        diagnostics: &mut Diagnostics,
    ) -> Result<(Vec<Trade>, Vec<LiquidityChange>), Error> {
        let ctx = TxContext::from(parsed);
        let mut trades = Vec::new();
        let mut liquidities = Vec::new();

        for ix in parsed.tree.nodes() {
            if !options.allows(&ix.program_id) {
                continue;
            }
            let Some(decoder) = self.registry.get(&ix.program_id) else {
                continue;
            };

            let actions = match decoder.decode(ix, extractor.extract(ix.position), &parsed.balances) {
                Ok(actions) => actions,
                Err(err) => {
                    diagnostics.report(err, &ix.program_id, ix.position, options)?;
                    continue;
                }
            };
            tracing::debug!(
                program = decoder.name(),
                position = ix.position,
                actions = actions.len(),
                "decoded instruction"
            );

            for action in &actions {
                match normalize::normalize(action, decoder.name(), &ctx) {
                    Ok(NormalizedEvent::Trade(trade)) => trades.push(trade),
                    Ok(NormalizedEvent::Liquidity(change)) => liquidities.push(change),
                    Err(err) => diagnostics.report(err, &ix.program_id, ix.position, options)?,
                }
            }
        }

        Ok((trades, liquidities))
    }
}

/// A transaction the runtime rejected yields nothing and is not a parse error.
fn failed_result(tx: &RawTransaction) -> ParseResult {
    let fee = tx.meta.as_ref().map_or(0, |m| m.fee);
    ParseResult {
        state: true,
        signature: tx.signature().to_string(),
        slot: tx.slot,
        timestamp: tx.block_time.unwrap_or(0),
        fee: TokenAmount::new(
            crate::protocols::WSOL_MINT,
            fee,
            crate::protocols::NATIVE_SOL_DECIMALS,
        ),
        trades: Vec::new(),
        liquidities: Vec::new(),
        transfers: Vec::new(),
        msg: None,
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::float_cmp,
    reason = "test assertions compare exact decimal shifts"
)]
mod tests {
    use super::*;
    use crate::protocols::{ActionLeg, LegDirection, ProtocolAction, TOKEN_PROGRAM_ID, WSOL_MINT};
    use crate::records::TransferEvent;
    use crate::transaction::{BalanceIndex, CanonicalInstruction};

    /// Swaps whatever its subtree moved: first transfer in, second out.
    struct EchoDecoder;

    impl ProtocolDecoder for EchoDecoder {
        fn name(&self) -> &str {
            "Echo"
        }

        fn decode(
            &self,
            ix: &CanonicalInstruction,
            transfers: &[TransferEvent],
            _balances: &BalanceIndex,
        ) -> Result<Vec<ProtocolAction>, DecodeError> {
            match ix.data.first() {
                Some(0) => Ok(Vec::new()),
                Some(1) if transfers.len() >= 2 => Ok(vec![ProtocolAction::swap(
                    ix,
                    "pool",
                    ActionLeg::from_transfer(&transfers[0], LegDirection::In)?,
                    ActionLeg::from_transfer(&transfers[1], LegDirection::Out)?,
                )]),
                Some(1) => Err(DecodeError::new("missing swap transfer")),
                _ => Err(DecodeError::unrecognized_layout()),
            }
        }
    }

    fn spl_transfer(amount: u64) -> String {
        let mut data = vec![3];
        data.extend_from_slice(&amount.to_le_bytes());
        bs58::encode(data).into_string()
    }

    /// Keys: 0 payer, 1 echo, 2 token program, 3 user WSOL ata, 4 vault WSOL,
    /// 5 vault TOKEN, 6 user TOKEN ata, 7 unrelated program.
    fn raw(outer: serde_json::Value, inner: serde_json::Value, err: serde_json::Value) -> RawTransaction {
        let row = |idx: usize, mint: &str, decimals: u8| {
            serde_json::json!({
                "accountIndex": idx,
                "mint": mint,
                "owner": "someone",
                "uiTokenAmount": { "amount": "0", "decimals": decimals }
            })
        };
        serde_json::from_value(serde_json::json!({
            "slot": 10,
            "blockTime": 1_700_000_000,
            "transaction": {
                "signatures": ["sig"],
                "message": {
                    "accountKeys": ["payer", "echo", TOKEN_PROGRAM_ID, "userW", "vaultW", "vaultT", "userT", "other"],
                    "instructions": outer,
                }
            },
            "meta": {
                "err": err,
                "fee": 5000,
                "innerInstructions": inner,
                "preTokenBalances": [row(3, WSOL_MINT, 9), row(4, WSOL_MINT, 9), row(5, "TOKEN", 6), row(6, "TOKEN", 6)],
                "postTokenBalances": [],
            }
        }))
        .unwrap()
    }

    fn echo(tag: u8) -> serde_json::Value {
        serde_json::json!({ "programIdIndex": 1, "accounts": [], "data": bs58::encode([tag]).into_string() })
    }

    fn swap_cpis(index: usize) -> serde_json::Value {
        serde_json::json!({
            "index": index,
            "instructions": [
                { "programIdIndex": 2, "accounts": [3, 4, 0], "data": spl_transfer(1_000_000_000), "stackHeight": 2 },
                { "programIdIndex": 2, "accounts": [5, 6, 4], "data": spl_transfer(2_500_000), "stackHeight": 2 },
            ]
        })
    }

    fn parser() -> DexParser {
        DexParser::with_registry(DecoderRegistry::empty().register("echo", EchoDecoder))
    }

    #[test]
    fn dispatches_registered_programs_and_keeps_all_transfers() {
        let tx = raw(
            serde_json::json!([echo(1), { "programIdIndex": 7, "accounts": [], "data": "" }]),
            serde_json::json!([swap_cpis(0)]),
            serde_json::Value::Null,
        );
        let result = parser().parse_all(&tx, &ParseOptions::default()).unwrap();
        assert!(result.state);
        assert!(result.msg.is_none());
        assert_eq!(result.transfers.len(), 2);
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.amm, "Echo");
        assert_eq!(trade.input_token.amount, 1.0);
        assert_eq!(trade.output_token.amount, 2.5);
        assert_eq!(trade.user, "payer");
        assert_eq!(result.fee.raw_amount, 5000);
    }

    #[test]
    fn failed_transaction_short_circuits() {
        let tx = raw(
            serde_json::json!([echo(1)]),
            serde_json::json!([swap_cpis(0)]),
            serde_json::json!({ "InstructionError": [0, { "Custom": 1 }] }),
        );
        let result = parser().parse_all(&tx, &ParseOptions::throwing()).unwrap();
        assert!(result.state);
        assert!(result.msg.is_none());
        assert!(result.trades.is_empty());
        assert!(result.liquidities.is_empty());
        assert!(result.transfers.is_empty());
    }

    #[test]
    fn decode_failures_are_collected_by_default() {
        let tx = raw(
            serde_json::json!([echo(1), echo(7), echo(1)]),
            serde_json::json!([swap_cpis(2)]),
            serde_json::Value::Null,
        );
        let result = parser().parse_all(&tx, &ParseOptions::default()).unwrap();
        assert!(!result.state);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(
            result.msg.as_deref(),
            Some("echo at instruction 0: missing swap transfer; echo at instruction 1: unrecognized layout")
        );
    }

    #[test]
    fn throw_error_raises_first_failure() {
        let tx = raw(
            serde_json::json!([echo(9), echo(1)]),
            serde_json::json!([]),
            serde_json::Value::Null,
        );
        let err = parser().parse_all(&tx, &ParseOptions::throwing()).unwrap_err();
        match err {
            Error::Decode { program_id, reason } => {
                assert_eq!(program_id, "echo");
                assert_eq!(reason, "unrecognized layout");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn program_filters_skip_dispatch() {
        let tx = raw(
            serde_json::json!([echo(9)]),
            serde_json::json!([]),
            serde_json::Value::Null,
        );
        let options = ParseOptions {
            ignore_program_ids: Some(vec!["echo".to_string()]),
            ..ParseOptions::default()
        };
        let result = parser().parse_all(&tx, &options).unwrap();
        assert!(result.state);

        let only_token = ParseOptions {
            program_ids: Some(vec![TOKEN_PROGRAM_ID.to_string()]),
            ..ParseOptions::default()
        };
        assert!(parser().parse_all(&tx, &only_token).unwrap().state);
    }

    #[test]
    fn projections_match_parse_all() {
        let tx = raw(
            serde_json::json!([echo(1), echo(0)]),
            serde_json::json!([swap_cpis(0)]),
            serde_json::Value::Null,
        );
        let parser = parser();
        let all = parser.parse_all(&tx, &ParseOptions::default()).unwrap();
        assert_eq!(parser.parse_trades(&tx, &ParseOptions::default()).unwrap(), all.trades);
        assert!(parser.parse_liquidity(&tx, &ParseOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::Dispatching.to_string(), "dispatching");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}
