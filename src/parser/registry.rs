use std::collections::HashMap;

use crate::error::DecodeError;
use crate::protocols::jupiter::JupiterDecoder;
use crate::protocols::orca::OrcaDecoder;
use crate::protocols::pumpfun::PumpfunDecoder;
use crate::protocols::pumpswap::PumpswapDecoder;
use crate::protocols::raydium_cpmm::RaydiumCpmmDecoder;
use crate::protocols::raydium_v4::RaydiumV4Decoder;
use crate::protocols::{Protocol, ProtocolAction};
use crate::records::TransferEvent;
use crate::transaction::{BalanceIndex, CanonicalInstruction};

/// Turns one instruction of a program into zero or more DEX actions.
///
/// `transfers` holds only the value movements of the instruction's own
/// subtree, so an action can never borrow a sibling's transfer.
pub trait ProtocolDecoder: Send + Sync {
    /// Name stamped into the `amm` field of produced records.
    fn name(&self) -> &str;

    fn decode(
        &self,
        ix: &CanonicalInstruction,
        transfers: &[TransferEvent],
        balances: &BalanceIndex,
    ) -> Result<Vec<ProtocolAction>, DecodeError>;
}

pub fn decoder_for(protocol: Protocol) -> &'static dyn ProtocolDecoder {
    match protocol {
        Protocol::RaydiumV4 => &RaydiumV4Decoder,
        Protocol::RaydiumCpmm => &RaydiumCpmmDecoder,
        Protocol::Orca => &OrcaDecoder,
        Protocol::Pumpfun => &PumpfunDecoder,
        Protocol::Pumpswap => &PumpswapDecoder,
        Protocol::Jupiter => &JupiterDecoder,
    }
}

enum Entry {
    Builtin(&'static dyn ProtocolDecoder),
    Custom(Box<dyn ProtocolDecoder>),
}

impl Entry {
    fn decoder(&self) -> &dyn ProtocolDecoder {
        match self {
            Self::Builtin(d) => *d,
            Self::Custom(d) => d.as_ref(),
        }
    }
}

/// programId → decoder map. Built once, then only read.
pub struct DecoderRegistry {
    entries: HashMap<String, Entry>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DecoderRegistry {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Every built-in protocol under its canonical program id.
    pub fn with_defaults() -> Self {
        let entries = Protocol::all()
            .iter()
            .map(|p| (p.program_id().to_string(), Entry::Builtin(decoder_for(*p))))
            .collect();
        Self { entries }
    }

    /// Register (or replace) the decoder for `program_id`.
    pub fn register(
        mut self,
        program_id: impl Into<String>,
        decoder: impl ProtocolDecoder + 'static,
    ) -> Self {
        self.entries
            .insert(program_id.into(), Entry::Custom(Box::new(decoder)));
        self
    }

    /// Route a fork or redeployment of a built-in protocol to its decoder.
    pub fn register_builtin(mut self, program_id: impl Into<String>, protocol: Protocol) -> Self {
        self.entries
            .insert(program_id.into(), Entry::Builtin(decoder_for(protocol)));
        self
    }

    pub fn get(&self, program_id: &str) -> Option<&dyn ProtocolDecoder> {
        self.entries.get(program_id).map(Entry::decoder)
    }

    pub fn contains(&self, program_id: &str) -> bool {
        self.entries.contains_key(program_id)
    }

    /// Registered program ids, sorted.
    pub fn program_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
