#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::dbg_macro,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::panic,
    )
)]

pub mod error;
pub mod parser;
pub mod protocols;
pub mod records;
pub mod transaction;
pub mod types;

#[cfg(feature = "native")]
pub mod metadata;
#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::{DecodeError, Error};
#[cfg(feature = "native")]
pub use metadata::{StaticSymbolResolver, SymbolResolver};
pub use parser::{DecoderRegistry, DexParser, ProtocolDecoder, Stage, decoder_for};
pub use protocols::{ActionKind, ActionLeg, LegDirection, Protocol, ProtocolAction};
pub use records::{
    LiquidityChange, LiquidityType, ParseResult, TokenAmount, Trade, TradeType, TransferEvent,
    TransferKind, UNKNOWN_SYMBOL,
};
pub use transaction::{BalanceIndex, CanonicalInstruction, InstructionTree};
pub use types::{ParseOptions, RawTransaction};
