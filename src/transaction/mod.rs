//! Instruction tree construction.
//!
//! Top-level instructions and their CPIs are flattened into one arena in
//! pre-order: every node is immediately followed by its own subtree, so a
//! subtree is always a contiguous slice.

pub mod balances;
pub mod transfers;

use crate::error::Error;
use crate::protocols::NATIVE_SOL_DECIMALS;
use crate::records::TokenAmount;
use crate::types::{RawCompiledInstruction, RawMeta, RawTransaction};
pub use balances::{BalanceIndex, OwnerBalance, TokenBalanceSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalInstruction {
    /// Index in pre-order emission order.
    pub position: usize,
    pub program_id: String,
    pub accounts: Vec<String>,
    pub data: Vec<u8>,
    pub parent: Option<usize>,
    /// 0 for top-level instructions.
    pub depth: u32,
    /// Index of the top-level instruction this node belongs to.
    pub outer_index: usize,
}

impl CanonicalInstruction {
    pub fn account(&self, idx: usize) -> Option<&str> {
        self.accounts.get(idx).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstructionTree {
    nodes: Vec<CanonicalInstruction>,
}

impl InstructionTree {
    pub fn from_nodes(nodes: Vec<CanonicalInstruction>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[CanonicalInstruction] {
        &self.nodes
    }

    pub fn get(&self, position: usize) -> Option<&CanonicalInstruction> {
        self.nodes.get(position)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Exclusive end of the subtree rooted at `root`.
    pub fn subtree_end(&self, root: usize) -> usize {
        let Some(node) = self.nodes.get(root) else {
            return root;
        };
        self.nodes[root + 1..]
            .iter()
            .position(|n| n.depth <= node.depth)
            .map_or(self.nodes.len(), |offset| root + 1 + offset)
    }

    pub fn subtree(&self, root: usize) -> &[CanonicalInstruction] {
        if root >= self.nodes.len() {
            return &[];
        }
        &self.nodes[root..self.subtree_end(root)]
    }

    /// Top-level ancestor of the node at `position`.
    pub fn root_of(&self, position: usize) -> Option<&CanonicalInstruction> {
        let mut current = self.nodes.get(position)?;
        while let Some(parent) = current.parent {
            current = self.nodes.get(parent)?;
        }
        Some(current)
    }
}

/// A transaction with resolved keys, its instruction tree and balance records.
#[derive(Debug, Clone)]
pub struct ParsedTransaction {
    pub signature: String,
    pub slot: u64,
    pub timestamp: i64,
    /// Fee payer.
    pub signer: String,
    pub fee_lamports: u64,
    pub keys: Vec<String>,
    pub tree: InstructionTree,
    pub balances: BalanceIndex,
}

impl ParsedTransaction {
    pub fn fee(&self) -> TokenAmount {
        TokenAmount::new(
            crate::protocols::WSOL_MINT,
            self.fee_lamports,
            NATIVE_SOL_DECIMALS,
        )
    }
}

/// Static keys followed by lookup-table writable then readonly keys.
pub fn resolve_account_keys(tx: &RawTransaction) -> Vec<String> {
    let mut keys = tx.transaction.message.account_keys.clone();
    if let Some(loaded) = tx.meta.as_ref().and_then(|m| m.loaded_addresses.as_ref()) {
        keys.extend(loaded.writable.iter().cloned());
        keys.extend(loaded.readonly.iter().cloned());
    }
    keys
}

pub fn build(tx: &RawTransaction) -> Result<ParsedTransaction, Error> {
    let keys = resolve_account_keys(tx);
    let default_meta = RawMeta::default();
    let meta = tx.meta.as_ref().unwrap_or(&default_meta);

    let outer = &tx.transaction.message.instructions;
    let mut inner_by_outer: Vec<Vec<&RawCompiledInstruction>> = vec![Vec::new(); outer.len()];
    for group in meta.inner_instructions.iter().flatten() {
        match inner_by_outer.get_mut(group.index) {
            Some(slot) => slot.extend(group.instructions.iter()),
            None => tracing::warn!(
                index = group.index,
                outer = outer.len(),
                "inner instructions reference a missing outer instruction"
            ),
        }
    }

    let mut nodes = Vec::with_capacity(outer.len());
    for (outer_index, ix) in outer.iter().enumerate() {
        let root = nodes.len();
        nodes.push(canonicalize(ix, &keys, root, None, 0, outer_index)?);

        // stack[d] is the most recent node at depth d within this outer instruction.
        let mut stack = vec![root];
        for inner in &inner_by_outer[outer_index] {
            let wanted = inner
                .stack_height
                .map_or(1, |h| h.saturating_sub(1).max(1) as usize);
            let depth = wanted.min(stack.len());
            stack.truncate(depth);
            let parent = stack[depth - 1];
            let position = nodes.len();
            nodes.push(canonicalize(
                inner,
                &keys,
                position,
                Some(parent),
                depth as u32,
                outer_index,
            )?);
            stack.push(position);
        }
    }

    let balances = BalanceIndex::build(meta, &keys);
    let signer = keys.first().cloned().ok_or_else(|| Error::MalformedTransaction {
        reason: "transaction has no account keys".into(),
    })?;

    tracing::debug!(
        signature = tx.signature(),
        instructions = nodes.len(),
        keys = keys.len(),
        "built instruction tree"
    );

    Ok(ParsedTransaction {
        signature: tx.signature().to_string(),
        slot: tx.slot,
        timestamp: tx.block_time.unwrap_or(0),
        signer,
        fee_lamports: meta.fee,
        keys,
        tree: InstructionTree::from_nodes(nodes),
        balances,
    })
}

fn canonicalize(
    ix: &RawCompiledInstruction,
    keys: &[String],
    position: usize,
    parent: Option<usize>,
    depth: u32,
    outer_index: usize,
) -> Result<CanonicalInstruction, Error> {
    let lookup = |idx: usize| {
        keys.get(idx).cloned().ok_or_else(|| Error::MalformedTransaction {
            reason: format!(
                "account index {idx} out of range ({} keys) in instruction {position}",
                keys.len()
            ),
        })
    };

    let program_id = lookup(ix.program_id_index)?;
    let accounts = ix
        .accounts
        .iter()
        .map(|&idx| lookup(idx))
        .collect::<Result<Vec<_>, _>>()?;
    let data = bs58::decode(&ix.data)
        .into_vec()
        .map_err(|e| Error::MalformedTransaction {
            reason: format!("instruction {position} data is not base58: {e}"),
        })?;

    Ok(CanonicalInstruction {
        position,
        program_id,
        accounts,
        data,
        parent,
        depth,
        outer_index,
    })
}
