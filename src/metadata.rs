//! Optional token-symbol enrichment.
//!
//! Symbols never influence amounts; they are attached after the synchronous
//! parse, and any lookup that fails or runs past its deadline becomes `"UNK"`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;
use crate::parser::DexParser;
use crate::records::{LiquidityChange, ParseResult, TokenAmount, Trade, UNKNOWN_SYMBOL};
use crate::types::{ParseOptions, RawTransaction};

/// Best-effort mint → symbol lookup, typically backed by a token-list service.
#[async_trait]
pub trait SymbolResolver: Send + Sync {
    async fn lookup_symbol(&self, mint: &str) -> Option<String>;
}

/// In-memory resolver for tests and for callers that ship their own list.
#[derive(Debug, Clone, Default)]
pub struct StaticSymbolResolver {
    symbols: HashMap<String, String>,
}

impl StaticSymbolResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, mint: impl Into<String>, symbol: impl Into<String>) -> Self {
        self.symbols.insert(mint.into(), symbol.into());
        self
    }
}

#[async_trait]
impl SymbolResolver for StaticSymbolResolver {
    async fn lookup_symbol(&self, mint: &str) -> Option<String> {
        self.symbols.get(mint).cloned()
    }
}

fn token_amounts_mut(result: &mut ParseResult) -> impl Iterator<Item = &mut TokenAmount> {
    let ParseResult {
        fee,
        trades,
        liquidities,
        ..
    } = result;

    let trades = trades.iter_mut().flat_map(|t| {
        let Trade {
            input_token,
            output_token,
            fee,
            ..
        } = t;
        [input_token, output_token].into_iter().chain(fee.as_mut())
    });
    let liquidities = liquidities.iter_mut().flat_map(|l| {
        let LiquidityChange {
            token0,
            token1,
            extra_tokens,
            lp_token,
            ..
        } = l;
        [token0, token1]
            .into_iter()
            .chain(extra_tokens.iter_mut())
            .chain(lp_token.as_mut())
    });

    std::iter::once(fee).chain(trades).chain(liquidities)
}

/// Look up every distinct mint once, in first-seen order, and stamp the symbol
/// on each token amount.
pub async fn resolve_symbols(result: &mut ParseResult, resolver: &dyn SymbolResolver, timeout: Duration) {
    let mut order: Vec<String> = Vec::new();
    for token in token_amounts_mut(result) {
        if !order.contains(&token.mint) {
            order.push(token.mint.clone());
        }
    }

    let mut symbols: HashMap<String, String> = HashMap::with_capacity(order.len());
    for mint in order {
        let symbol = match tokio::time::timeout(timeout, resolver.lookup_symbol(&mint)).await {
            Ok(Some(symbol)) => symbol,
            Ok(None) => UNKNOWN_SYMBOL.to_string(),
            Err(_) => {
                tracing::debug!(mint = %mint, ?timeout, "symbol lookup timed out");
                UNKNOWN_SYMBOL.to_string()
            }
        };
        symbols.insert(mint, symbol);
    }

    for token in token_amounts_mut(result) {
        token.symbol = symbols.get(&token.mint).cloned();
    }
}

impl DexParser {
    /// [`DexParser::parse_all`] followed by symbol enrichment bounded by
    /// `options.symbol_timeout_ms` per lookup.
    pub async fn parse_all_with_symbols(
        &self,
        tx: &RawTransaction,
        options: &ParseOptions,
        resolver: &dyn SymbolResolver,
    ) -> Result<ParseResult, Error> {
        let mut result = self.parse_all(tx, options)?;
        resolve_symbols(
            &mut result,
            resolver,
            Duration::from_millis(options.symbol_timeout_ms),
        )
        .await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::protocols::WSOL_MINT;
    use crate::records::{LiquidityType, TradeType};

    struct Counting {
        calls: AtomicUsize,
        inner: StaticSymbolResolver,
    }

    #[async_trait]
    impl SymbolResolver for Counting {
        async fn lookup_symbol(&self, mint: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup_symbol(mint).await
        }
    }

    struct Stalled;

    #[async_trait]
    impl SymbolResolver for Stalled {
        async fn lookup_symbol(&self, _mint: &str) -> Option<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Some("LATE".to_string())
        }
    }

    fn result() -> ParseResult {
        let trade = Trade {
            signature: "sig".to_string(),
            slot: 1,
            timestamp: 0,
            trade_type: TradeType::Buy,
            user: "u".to_string(),
            input_token: TokenAmount::new(WSOL_MINT, 1, 9),
            output_token: TokenAmount::new("MEME", 5, 6),
            amm: "Pumpfun".to_string(),
            program_id: "p".to_string(),
            pool_id: "pool".to_string(),
            position: 0,
            route: None,
            fee: Some(TokenAmount::new(WSOL_MINT, 1, 9)),
        };
        let change = LiquidityChange {
            signature: "sig".to_string(),
            slot: 1,
            timestamp: 0,
            kind: LiquidityType::Add,
            user: "u".to_string(),
            pool_id: "pool".to_string(),
            amm: "Pumpswap".to_string(),
            program_id: "p".to_string(),
            position: 1,
            token0: TokenAmount::new("MEME", 5, 6),
            token1: TokenAmount::new(WSOL_MINT, 1, 9),
            extra_tokens: Vec::new(),
            lp_token: Some(TokenAmount::new("LP", 2, 6)),
        };
        ParseResult {
            state: true,
            signature: "sig".to_string(),
            slot: 1,
            timestamp: 0,
            fee: TokenAmount::new(WSOL_MINT, 5000, 9),
            trades: vec![trade],
            liquidities: vec![change],
            transfers: Vec::new(),
            msg: None,
        }
    }

    #[tokio::test]
    async fn each_mint_is_looked_up_once() {
        let resolver = Counting {
            calls: AtomicUsize::new(0),
            inner: StaticSymbolResolver::new().with(WSOL_MINT, "SOL"),
        };
        let mut result = result();
        resolve_symbols(&mut result, &resolver, Duration::from_millis(100)).await;

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.fee.symbol.as_deref(), Some("SOL"));
        let trade = &result.trades[0];
        assert_eq!(trade.input_token.symbol.as_deref(), Some("SOL"));
        assert_eq!(trade.output_token.symbol.as_deref(), Some(UNKNOWN_SYMBOL));
        assert_eq!(
            result.liquidities[0].lp_token.as_ref().and_then(|t| t.symbol.as_deref()),
            Some(UNKNOWN_SYMBOL)
        );
    }

    #[tokio::test]
    async fn timeout_degrades_to_unknown_without_touching_amounts() {
        let mut result = result();
        let before = result.trades[0].output_token.amount;
        resolve_symbols(&mut result, &Stalled, Duration::from_millis(10)).await;

        let trade = &result.trades[0];
        assert_eq!(trade.output_token.symbol.as_deref(), Some(UNKNOWN_SYMBOL));
        assert!((trade.output_token.amount - before).abs() < f64::EPSILON);
        assert_eq!(result.fee.symbol.as_deref(), Some(UNKNOWN_SYMBOL));
    }
}
