/// A confirmed transaction as returned by `getTransaction` with `encoding = "json"`.
#[derive(serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    /// Slot in which the transaction landed.
    pub slot: u64,
    /// Unix timestamp of the block, when the node knows it.
    #[serde(default)]
    pub block_time: Option<i64>,
    pub transaction: RawTransactionBody,
    /// Execution metadata. Absent meta is treated as an empty, successful run.
    #[serde(default)]
    pub meta: Option<RawMeta>,
}

impl RawTransaction {
    /// First signature (base58), which identifies the transaction.
    pub fn signature(&self) -> &str {
        self.transaction
            .signatures
            .first()
            .map_or("", String::as_str)
    }

    /// Whether the runtime recorded an execution error.
    pub fn is_failed(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.err.as_ref())
            .is_some_and(|err| !err.is_null())
    }
}

#[derive(serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawTransactionBody {
    pub signatures: Vec<String>,
    pub message: RawMessage,
}

#[derive(serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    /// Static account keys; the fee payer comes first.
    pub account_keys: Vec<String>,
    pub instructions: Vec<RawCompiledInstruction>,
}

#[derive(serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawCompiledInstruction {
    pub program_id_index: usize,
    /// Indices into the resolved account-key list.
    pub accounts: Vec<usize>,
    /// Base58 encoded instruction data.
    pub data: String,
    /// Invocation depth; 1 for top level, 2+ for CPIs.
    #[serde(default)]
    pub stack_height: Option<u32>,
}

#[derive(serde::Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawMeta {
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
    #[serde(default)]
    pub inner_instructions: Option<Vec<RawInnerInstructions>>,
    #[serde(default)]
    pub pre_token_balances: Option<Vec<RawTokenBalance>>,
    #[serde(default)]
    pub post_token_balances: Option<Vec<RawTokenBalance>>,
    /// Keys pulled in through address lookup tables.
    #[serde(default)]
    pub loaded_addresses: Option<RawLoadedAddresses>,
    #[serde(default)]
    pub compute_units_consumed: Option<u64>,
}

#[derive(serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawInnerInstructions {
    /// Index of the top-level instruction that issued these CPIs.
    pub index: usize,
    pub instructions: Vec<RawCompiledInstruction>,
}

#[derive(serde::Deserialize, Debug, Clone, Default)]
pub struct RawLoadedAddresses {
    #[serde(default)]
    pub writable: Vec<String>,
    #[serde(default)]
    pub readonly: Vec<String>,
}

#[derive(serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenBalance {
    pub account_index: usize,
    pub mint: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
    pub ui_token_amount: RawUiTokenAmount,
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct RawUiTokenAmount {
    /// Raw integer amount as a decimal string.
    pub amount: String,
    pub decimals: u8,
}

/// Per-call parser options.
#[derive(serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ParseOptions {
    /// Raise on the first decode failure instead of collecting it into `msg`.
    pub throw_error: bool,
    /// When set, only these programs are dispatched.
    pub program_ids: Option<Vec<String>>,
    /// Programs that are never dispatched.
    pub ignore_program_ids: Option<Vec<String>>,
    /// Upper bound for a single symbol lookup.
    pub symbol_timeout_ms: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            throw_error: false,
            program_ids: None,
            ignore_program_ids: None,
            symbol_timeout_ms: 500,
        }
    }
}

impl ParseOptions {
    pub fn throwing() -> Self {
        Self {
            throw_error: true,
            ..Self::default()
        }
    }

    pub fn allows(&self, program_id: &str) -> bool {
        if let Some(only) = &self.program_ids
            && !only.iter().any(|id| id == program_id)
        {
            return false;
        }
        !self
            .ignore_program_ids
            .as_ref()
            .is_some_and(|ignored| ignored.iter().any(|id| id == program_id))
    }
}
