use crate::protocols::{
    NATIVE_SOL_DECIMALS, SYSTEM_PROGRAM_ID, TOKEN_2022_PROGRAM_ID, TOKEN_PROGRAM_ID, WSOL_MINT,
    read_u64,
};
use crate::records::{TransferEvent, TransferKind};
use crate::transaction::{BalanceIndex, CanonicalInstruction, InstructionTree};

const SPL_TRANSFER: u8 = 3;
const SPL_MINT_TO: u8 = 7;
const SPL_BURN: u8 = 8;
const SPL_TRANSFER_CHECKED: u8 = 12;
const SPL_MINT_TO_CHECKED: u8 = 14;
const SPL_BURN_CHECKED: u8 = 15;
const SYSTEM_TRANSFER: u32 = 2;

/// Every value movement of one transaction, in pre-order.
///
/// Because positions of a subtree are contiguous, a subtree query is a
/// slice of the precomputed list.
#[derive(Debug, Clone, Default)]
pub struct TransferExtractor {
    events: Vec<TransferEvent>,
    tree_len: usize,
    subtree_ends: Vec<usize>,
}

impl TransferExtractor {
    pub fn new(tree: &InstructionTree, balances: &BalanceIndex) -> Self {
        let events = tree
            .nodes()
            .iter()
            .filter_map(|ix| decode_transfer(ix, balances))
            .collect();
        let subtree_ends = (0..tree.len()).map(|i| tree.subtree_end(i)).collect();
        Self {
            events,
            tree_len: tree.len(),
            subtree_ends,
        }
    }

    pub fn all(&self) -> &[TransferEvent] {
        &self.events
    }

    /// Transfers issued within the subtree rooted at `root`, root included.
    pub fn extract(&self, root: usize) -> &[TransferEvent] {
        if root >= self.tree_len {
            return &[];
        }
        let end = self.subtree_ends[root];
        let lo = self.events.partition_point(|e| e.position < root);
        let hi = self.events.partition_point(|e| e.position < end);
        &self.events[lo..hi]
    }

    pub fn into_events(self) -> Vec<TransferEvent> {
        self.events
    }
}

/// Recognize a token or native value movement; anything else yields `None`.
pub fn decode_transfer(ix: &CanonicalInstruction, balances: &BalanceIndex) -> Option<TransferEvent> {
    match ix.program_id.as_str() {
        TOKEN_PROGRAM_ID | TOKEN_2022_PROGRAM_ID => decode_token(ix, balances),
        SYSTEM_PROGRAM_ID => decode_system(ix),
        _ => None,
    }
}

fn decode_token(ix: &CanonicalInstruction, balances: &BalanceIndex) -> Option<TransferEvent> {
    let (&tag, _) = ix.data.split_first()?;
    let amount = read_u64(&ix.data, 1)?;
    let acct = |i: usize| ix.account(i).map(str::to_string);

    let (kind, mint, decimals, source, destination, authority) = match tag {
        SPL_TRANSFER => {
            let source = acct(0)?;
            let destination = acct(1)?;
            let mint = balances
                .mint_of(&source)
                .or_else(|| balances.mint_of(&destination))
                .map(str::to_string);
            let decimals = mint.as_deref().and_then(|m| balances.decimals(m));
            (TransferKind::Transfer, mint, decimals, source, destination, acct(2)?)
        }
        SPL_TRANSFER_CHECKED => (
            TransferKind::TransferChecked,
            Some(acct(1)?),
            Some(*ix.data.get(9)?),
            acct(0)?,
            acct(2)?,
            acct(3)?,
        ),
        SPL_MINT_TO | SPL_MINT_TO_CHECKED => {
            let mint = acct(0)?;
            let decimals = ix
                .data
                .get(9)
                .copied()
                .or_else(|| balances.decimals(&mint));
            (TransferKind::MintTo, Some(mint), decimals, String::new(), acct(1)?, acct(2)?)
        }
        SPL_BURN | SPL_BURN_CHECKED => {
            let mint = acct(1)?;
            let decimals = ix
                .data
                .get(9)
                .copied()
                .or_else(|| balances.decimals(&mint));
            (TransferKind::Burn, Some(mint), decimals, acct(0)?, String::new(), acct(2)?)
        }
        _ => return None,
    };

    Some(TransferEvent {
        position: ix.position,
        kind,
        mint,
        raw_amount: amount,
        decimals,
        source,
        destination,
        authority,
        program_id: ix.program_id.clone(),
    })
}

fn decode_system(ix: &CanonicalInstruction) -> Option<TransferEvent> {
    let tag = u32::from_le_bytes(ix.data.get(..4)?.try_into().ok()?);
    if tag != SYSTEM_TRANSFER {
        return None;
    }
    let lamports = read_u64(&ix.data, 4)?;
    let source = ix.account(0)?.to_string();
    Some(TransferEvent {
        position: ix.position,
        kind: TransferKind::NativeTransfer,
        mint: Some(WSOL_MINT.to_string()),
        raw_amount: lamports,
        decimals: Some(NATIVE_SOL_DECIMALS),
        authority: source.clone(),
        source,
        destination: ix.account(1)?.to_string(),
        program_id: ix.program_id.clone(),
    })
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;
    use crate::types::{RawMeta, RawTokenBalance, RawUiTokenAmount};

    fn node(position: usize, parent: Option<usize>, depth: u32, program: &str, accounts: &[&str], data: Vec<u8>) -> CanonicalInstruction {
        CanonicalInstruction {
            position,
            program_id: program.to_string(),
            accounts: accounts.iter().map(ToString::to_string).collect(),
            data,
            parent,
            depth,
            outer_index: 0,
        }
    }

    fn spl_transfer(amount: u64) -> Vec<u8> {
        let mut data = vec![SPL_TRANSFER];
        data.extend_from_slice(&amount.to_le_bytes());
        data
    }

    fn spl_transfer_checked(amount: u64, decimals: u8) -> Vec<u8> {
        let mut data = vec![SPL_TRANSFER_CHECKED];
        data.extend_from_slice(&amount.to_le_bytes());
        data.push(decimals);
        data
    }

    fn system_transfer(lamports: u64) -> Vec<u8> {
        let mut data = SYSTEM_TRANSFER.to_le_bytes().to_vec();
        data.extend_from_slice(&lamports.to_le_bytes());
        data
    }

    fn balances() -> BalanceIndex {
        let keys: Vec<String> = ["src", "dst"].iter().map(ToString::to_string).collect();
        let row = |i: usize| RawTokenBalance {
            account_index: i,
            mint: "USDC".to_string(),
            owner: Some("owner".to_string()),
            program_id: None,
            ui_token_amount: RawUiTokenAmount {
                amount: "0".to_string(),
                decimals: 6,
            },
        };
        BalanceIndex::build(
            &RawMeta {
                pre_token_balances: Some(vec![row(0), row(1)]),
                ..RawMeta::default()
            },
            &keys,
        )
    }

    fn sample_tree() -> InstructionTree {
        InstructionTree::from_nodes(vec![
            node(0, None, 0, "router", &["payer"], vec![]),
            node(1, Some(0), 1, "amm", &["pool"], vec![]),
            node(2, Some(1), 2, TOKEN_PROGRAM_ID, &["src", "dst", "owner"], spl_transfer(10)),
            node(3, Some(1), 2, TOKEN_2022_PROGRAM_ID, &["dst", "MINTX", "src", "pool"], spl_transfer_checked(20, 3)),
            node(4, Some(0), 1, SYSTEM_PROGRAM_ID, &["payer", "tip"], system_transfer(30)),
            node(5, None, 0, TOKEN_PROGRAM_ID, &["src", "dst", "owner"], spl_transfer(40)),
            node(6, None, 0, "memo", &[], vec![1, 2, 3]),
        ])
    }

    #[test]
    fn recognizes_transfer_kinds() {
        let extractor = TransferExtractor::new(&sample_tree(), &balances());
        let all = extractor.all();
        assert_eq!(all.len(), 4);

        assert_eq!(all[0].kind, TransferKind::Transfer);
        assert_eq!(all[0].mint.as_deref(), Some("USDC"));
        assert_eq!(all[0].decimals, Some(6));
        assert_eq!(all[0].authority, "owner");

        assert_eq!(all[1].kind, TransferKind::TransferChecked);
        assert_eq!(all[1].mint.as_deref(), Some("MINTX"));
        assert_eq!(all[1].decimals, Some(3));
        assert_eq!(all[1].destination, "src");

        assert_eq!(all[2].kind, TransferKind::NativeTransfer);
        assert_eq!(all[2].mint.as_deref(), Some(WSOL_MINT));
        assert_eq!(all[2].raw_amount, 30);
    }

    #[test]
    fn subtree_queries_never_leak_siblings() {
        let extractor = TransferExtractor::new(&sample_tree(), &balances());
        let amounts = |root: usize| -> Vec<u64> {
            extractor.extract(root).iter().map(|t| t.raw_amount).collect()
        };
        assert_eq!(amounts(0), vec![10, 20, 30]);
        assert_eq!(amounts(1), vec![10, 20]);
        assert_eq!(amounts(4), vec![30]);
        assert_eq!(amounts(5), vec![40]);
        assert!(amounts(6).is_empty());
        assert!(amounts(99).is_empty());
    }

    #[test]
    fn ordering_matches_preorder_positions() {
        let extractor = TransferExtractor::new(&sample_tree(), &balances());
        let positions: Vec<usize> = extractor.all().iter().map(|t| t.position).collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn mint_and_burn_are_tagged() {
        let mut mint_to = vec![SPL_MINT_TO];
        mint_to.extend_from_slice(&5_u64.to_le_bytes());
        let mut burn = vec![SPL_BURN_CHECKED];
        burn.extend_from_slice(&6_u64.to_le_bytes());
        burn.push(9);
        let tree = InstructionTree::from_nodes(vec![
            node(0, None, 0, TOKEN_PROGRAM_ID, &["LP", "dst", "auth"], mint_to),
            node(1, None, 0, TOKEN_PROGRAM_ID, &["src", "LP", "auth"], burn),
        ]);
        let extractor = TransferExtractor::new(&tree, &BalanceIndex::default());
        let all = extractor.all();
        assert_eq!(all[0].kind, TransferKind::MintTo);
        assert_eq!(all[0].mint.as_deref(), Some("LP"));
        assert!(all[0].source.is_empty());
        assert_eq!(all[1].kind, TransferKind::Burn);
        assert_eq!(all[1].decimals, Some(9));
        assert!(all[1].destination.is_empty());
    }

    #[test]
    fn short_or_foreign_data_is_ignored() {
        let tree = InstructionTree::from_nodes(vec![
            node(0, None, 0, TOKEN_PROGRAM_ID, &["a", "b", "c"], vec![SPL_TRANSFER, 1]),
            node(1, None, 0, SYSTEM_PROGRAM_ID, &["a", "b"], vec![0, 0, 0, 0]),
            node(2, None, 0, TOKEN_PROGRAM_ID, &["a"], spl_transfer(1)),
        ]);
        let extractor = TransferExtractor::new(&tree, &BalanceIndex::default());
        assert!(extractor.all().is_empty());
        assert!(extractor.extract(0).is_empty());
    }

    #[test]
    fn unresolvable_plain_transfer_keeps_no_mint() {
        let tree = InstructionTree::from_nodes(vec![node(
            0,
            None,
            0,
            TOKEN_PROGRAM_ID,
            &["x", "y", "z"],
            spl_transfer(3),
        )]);
        let extractor = TransferExtractor::new(&tree, &BalanceIndex::default());
        let event = extractor.all().first().unwrap();
        assert!(event.mint.is_none());
        assert!(event.decimals.is_none());
    }
}
