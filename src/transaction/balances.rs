use std::collections::HashMap;

use crate::protocols::{NATIVE_SOL_DECIMALS, WSOL_MINT};
use crate::types::{RawMeta, RawTokenBalance};

/// Pre/post state of one token account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalanceSnapshot {
    pub account: String,
    pub owner: Option<String>,
    pub mint: String,
    pub pre_raw: u64,
    pub post_raw: u64,
    pub decimals: u8,
}

impl TokenBalanceSnapshot {
    /// `post - pre`, signed.
    pub fn delta(&self) -> i128 {
        i128::from(self.post_raw) - i128::from(self.pre_raw)
    }
}

/// Aggregated (owner, mint) view, summed over every token account the owner holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OwnerBalance {
    pub pre_raw: u64,
    pub post_raw: u64,
    pub decimals: u8,
}

/// Balance records of one transaction, indexed for decoder lookups.
#[derive(Debug, Clone, Default)]
pub struct BalanceIndex {
    by_account: HashMap<String, TokenBalanceSnapshot>,
    by_owner: HashMap<(String, String), OwnerBalance>,
    decimals: HashMap<String, u8>,
    lamports: HashMap<String, (u64, u64)>,
}

impl BalanceIndex {
    pub fn build(meta: &RawMeta, keys: &[String]) -> Self {
        let mut index = Self::default();

        let empty = Vec::new();
        let pre = meta.pre_token_balances.as_ref().unwrap_or(&empty);
        let post = meta.post_token_balances.as_ref().unwrap_or(&empty);
        for row in pre {
            index.record(row, keys, |snap, raw| snap.pre_raw = raw);
        }
        for row in post {
            index.record(row, keys, |snap, raw| snap.post_raw = raw);
        }

        for snap in index.by_account.values() {
            let Some(owner) = &snap.owner else { continue };
            let entry = index
                .by_owner
                .entry((owner.clone(), snap.mint.clone()))
                .or_default();
            entry.pre_raw = entry.pre_raw.saturating_add(snap.pre_raw);
            entry.post_raw = entry.post_raw.saturating_add(snap.post_raw);
            entry.decimals = snap.decimals;
        }

        for (i, key) in keys.iter().enumerate() {
            let pre = meta.pre_balances.get(i).copied();
            let post = meta.post_balances.get(i).copied();
            if pre.is_some() || post.is_some() {
                index
                    .lamports
                    .insert(key.clone(), (pre.unwrap_or(0), post.unwrap_or(0)));
            }
        }

        index
    }

    fn record(
        &mut self,
        row: &RawTokenBalance,
        keys: &[String],
        apply: impl Fn(&mut TokenBalanceSnapshot, u64),
    ) {
        let Some(account) = keys.get(row.account_index) else {
            tracing::debug!(
                account_index = row.account_index,
                "token balance row points past the account list"
            );
            return;
        };
        let raw = row.ui_token_amount.amount.parse::<u64>().unwrap_or(0);
        let decimals = row.ui_token_amount.decimals;
        self.decimals.insert(row.mint.clone(), decimals);
        let snap = self
            .by_account
            .entry(account.clone())
            .or_insert_with(|| TokenBalanceSnapshot {
                account: account.clone(),
                owner: row.owner.clone(),
                mint: row.mint.clone(),
                pre_raw: 0,
                post_raw: 0,
                decimals,
            });
        if snap.owner.is_none() {
            snap.owner.clone_from(&row.owner);
        }
        apply(snap, raw);
    }

    pub fn account(&self, account: &str) -> Option<&TokenBalanceSnapshot> {
        self.by_account.get(account)
    }

    pub fn owner(&self, owner: &str, mint: &str) -> Option<OwnerBalance> {
        self.by_owner
            .get(&(owner.to_string(), mint.to_string()))
            .copied()
    }

    pub fn mint_of(&self, account: &str) -> Option<&str> {
        self.by_account.get(account).map(|s| s.mint.as_str())
    }

    /// Decimals recorded for `mint`; native SOL is always known.
    pub fn decimals(&self, mint: &str) -> Option<u8> {
        self.decimals.get(mint).copied().or_else(|| {
            (mint == WSOL_MINT).then_some(NATIVE_SOL_DECIMALS)
        })
    }

    /// Signed lamport change of `account` over the transaction.
    pub fn lamport_delta(&self, account: &str) -> Option<i128> {
        self.lamports
            .get(account)
            .map(|(pre, post)| i128::from(*post) - i128::from(*pre))
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;
    use crate::types::RawUiTokenAmount;

    fn row(account_index: usize, mint: &str, owner: &str, amount: u64, decimals: u8) -> RawTokenBalance {
        RawTokenBalance {
            account_index,
            mint: mint.to_string(),
            owner: Some(owner.to_string()),
            program_id: None,
            ui_token_amount: RawUiTokenAmount {
                amount: amount.to_string(),
                decimals,
            },
        }
    }

    fn keys() -> Vec<String> {
        ["payer", "ata1", "ata2", "vault"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn missing_pre_row_means_created_account() {
        let meta = RawMeta {
            pre_token_balances: Some(vec![row(3, "MINT", "pool", 1_000, 6)]),
            post_token_balances: Some(vec![
                row(1, "MINT", "payer", 250, 6),
                row(3, "MINT", "pool", 750, 6),
            ]),
            ..RawMeta::default()
        };
        let index = BalanceIndex::build(&meta, &keys());

        let created = index.account("ata1").unwrap();
        assert_eq!(created.pre_raw, 0);
        assert_eq!(created.delta(), 250);
        assert_eq!(index.account("vault").unwrap().delta(), -250);
        assert_eq!(index.decimals("MINT"), Some(6));
        assert_eq!(index.mint_of("vault"), Some("MINT"));
    }

    #[test]
    fn owner_view_sums_accounts() {
        let meta = RawMeta {
            pre_token_balances: Some(vec![
                row(1, "MINT", "payer", 10, 2),
                row(2, "MINT", "payer", 5, 2),
            ]),
            post_token_balances: Some(vec![
                row(1, "MINT", "payer", 0, 2),
                row(2, "MINT", "payer", 40, 2),
            ]),
            ..RawMeta::default()
        };
        let index = BalanceIndex::build(&meta, &keys());
        let owned = index.owner("payer", "MINT").unwrap();
        assert_eq!((owned.pre_raw, owned.post_raw, owned.decimals), (15, 40, 2));
        assert!(index.owner("payer", "OTHER").is_none());
    }

    #[test]
    fn native_sol_decimals_and_lamports() {
        let meta = RawMeta {
            pre_balances: vec![10_000, 0, 0, 500],
            post_balances: vec![4_000, 0, 0, 6_500],
            ..RawMeta::default()
        };
        let index = BalanceIndex::build(&meta, &keys());
        assert_eq!(index.decimals(WSOL_MINT), Some(9));
        assert_eq!(index.decimals("UNKNOWN"), None);
        assert_eq!(index.lamport_delta("payer"), Some(-6_000));
        assert_eq!(index.lamport_delta("vault"), Some(6_000));
        assert_eq!(index.lamport_delta("nobody"), None);
    }
}
