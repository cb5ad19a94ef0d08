/// Per-account credit ledger
///
/// One non-negative integer balance per account plus an append-only
/// transaction log, both in the shared store. The balance is the source of
/// truth; the log is audit material, truncated to the most recent 1000
/// entries. Storage errors surface as `LedgerUnavailable`, never as
/// "insufficient credits".
use crate::error::{PipelineError, PipelineResult};
use crate::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const BALANCE_KEY_PREFIX: &str = "credits:balance:";
const LOG_KEY_PREFIX: &str = "credits:log:";
const MAX_LOG_ENTRIES: usize = 1000;

/// Transaction categories recorded in the audit log
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    SignupBonus,
    Deduction,
    Purchase,
    SubscriptionRenewal,
}

/// One entry in an account's transaction log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub timestamp: DateTime<Utc>,
    /// Signed credit delta; deductions are negative
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub description: String,
}

#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn KeyValueStore>,
    signup_bonus: i64,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn KeyValueStore>, signup_bonus: i64) -> Self {
        Self {
            store,
            signup_bonus,
        }
    }

    fn balance_key(account_id: &str) -> String {
        format!("{}{}", BALANCE_KEY_PREFIX, account_id)
    }

    fn log_key(account_id: &str) -> String {
        format!("{}{}", LOG_KEY_PREFIX, account_id)
    }

    /// Current balance; uninitialized accounts read as zero
    pub async fn balance(&self, account_id: &str) -> PipelineResult<i64> {
        let raw = self
            .store
            .get(&Self::balance_key(account_id))
            .await
            .map_err(PipelineError::LedgerUnavailable)?;
        Ok(raw.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0))
    }

    pub async fn has_sufficient(&self, account_id: &str, amount: i64) -> PipelineResult<bool> {
        Ok(self.balance(account_id).await? >= amount)
    }

    /// Deduct credits, refusing without mutation when the balance is short
    ///
    /// Returns false for insufficient funds. The re-read and the decrement
    /// are two steps; only the decrement itself is atomic at the storage
    /// layer, which is what prevents lost updates under concurrent
    /// deductions.
    pub async fn deduct(
        &self,
        account_id: &str,
        amount: i64,
        description: &str,
    ) -> PipelineResult<bool> {
        let current = self.balance(account_id).await?;
        if current < amount {
            debug!(
                "Declining deduction of {} for {}: balance {}",
                amount, account_id, current
            );
            return Ok(false);
        }

        let new_balance = self
            .store
            .decrement(&Self::balance_key(account_id), amount)
            .await
            .map_err(PipelineError::LedgerUnavailable)?;

        self.append_record(
            account_id,
            TransactionRecord {
                timestamp: Utc::now(),
                amount: -amount,
                kind: TransactionKind::Deduction,
                description: description.to_string(),
            },
        )
        .await;

        info!(
            "💳 Deducted {} credit(s) from {} (balance {})",
            amount, account_id, new_balance
        );
        Ok(true)
    }

    /// Add credits; rejects non-positive amounts
    pub async fn add(
        &self,
        account_id: &str,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> PipelineResult<i64> {
        if amount <= 0 {
            return Err(PipelineError::Internal(format!(
                "credit amount must be positive, got {}",
                amount
            )));
        }

        let new_balance = self
            .store
            .increment(&Self::balance_key(account_id), amount)
            .await
            .map_err(PipelineError::LedgerUnavailable)?;

        self.append_record(
            account_id,
            TransactionRecord {
                timestamp: Utc::now(),
                amount,
                kind,
                description: description.to_string(),
            },
        )
        .await;

        info!(
            "💰 Added {} credit(s) to {} (balance {})",
            amount, account_id, new_balance
        );
        Ok(new_balance)
    }

    /// Grant the signup bonus exactly once per account
    ///
    /// Safe to call on every request; repeated calls are no-ops once the
    /// balance key exists.
    pub async fn initialize(&self, account_id: &str) -> PipelineResult<()> {
        let created = self
            .store
            .set_if_absent(&Self::balance_key(account_id), &self.signup_bonus.to_string())
            .await
            .map_err(PipelineError::LedgerUnavailable)?;

        if created {
            self.append_record(
                account_id,
                TransactionRecord {
                    timestamp: Utc::now(),
                    amount: self.signup_bonus,
                    kind: TransactionKind::SignupBonus,
                    description: "signup bonus".to_string(),
                },
            )
            .await;
            info!(
                "🆕 Initialized account {} with {} credit(s)",
                account_id, self.signup_bonus
            );
        }
        Ok(())
    }

    /// Most-recent-first transaction log for an account
    pub async fn transactions(
        &self,
        account_id: &str,
        count: usize,
    ) -> PipelineResult<Vec<TransactionRecord>> {
        let raw = self
            .store
            .list_range(&Self::log_key(account_id), 0, count)
            .await
            .map_err(PipelineError::LedgerUnavailable)?;

        Ok(raw
            .iter()
            .filter_map(|json| serde_json::from_str(json).ok())
            .collect())
    }

    /// Append to the audit log; failures are logged, never propagated
    ///
    /// The log is advisory — a lost record must not fail an operation whose
    /// balance mutation already happened.
    async fn append_record(&self, account_id: &str, record: TransactionRecord) {
        let json = match serde_json::to_string(&record) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize transaction record: {}", e);
                return;
            }
        };
        if let Err(e) = self
            .store
            .push_front_trimmed(&Self::log_key(account_id), &json, MAX_LOG_ENTRIES)
            .await
        {
            warn!("Failed to append transaction record for {}: {}", account_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn ledger() -> CreditLedger {
        CreditLedger::new(Arc::new(MemoryStore::new()), 3)
    }

    #[tokio::test]
    async fn test_uninitialized_account_reads_zero() {
        let ledger = ledger();
        assert_eq!(ledger.balance("acct").await.unwrap(), 0);
        assert!(!ledger.has_sufficient("acct", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let ledger = ledger();
        ledger.initialize("acct").await.unwrap();
        ledger.initialize("acct").await.unwrap();

        assert_eq!(ledger.balance("acct").await.unwrap(), 3);
        let log = ledger.transactions("acct", 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, TransactionKind::SignupBonus);
        assert_eq!(log[0].amount, 3);
    }

    #[tokio::test]
    async fn test_deduct_decrements_and_logs() {
        let ledger = ledger();
        ledger.initialize("acct").await.unwrap();

        assert!(ledger.deduct("acct", 1, "chapter generation").await.unwrap());
        assert_eq!(ledger.balance("acct").await.unwrap(), 2);

        let log = ledger.transactions("acct", 10).await.unwrap();
        // Most recent first
        assert_eq!(log[0].amount, -1);
        assert_eq!(log[0].kind, TransactionKind::Deduction);
    }

    #[tokio::test]
    async fn test_deduct_refuses_without_mutation() {
        let ledger = ledger();
        ledger.initialize("acct").await.unwrap();

        assert!(!ledger.deduct("acct", 5, "too much").await.unwrap());
        assert_eq!(ledger.balance("acct").await.unwrap(), 3);
        // No deduction record was written
        let log = ledger.transactions("acct", 10).await.unwrap();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_add_rejects_non_positive_amounts() {
        let ledger = ledger();
        assert!(ledger
            .add("acct", 0, TransactionKind::Purchase, "zero")
            .await
            .is_err());
        assert!(ledger
            .add("acct", -5, TransactionKind::Purchase, "negative")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_add_increments_and_logs() {
        let ledger = ledger();
        ledger.initialize("acct").await.unwrap();

        let balance = ledger
            .add("acct", 10, TransactionKind::Purchase, "credit pack")
            .await
            .unwrap();
        assert_eq!(balance, 13);

        let log = ledger.transactions("acct", 10).await.unwrap();
        assert_eq!(log[0].kind, TransactionKind::Purchase);
        assert_eq!(log[0].amount, 10);
    }

    #[tokio::test]
    async fn test_has_sufficient_matches_balance_comparison() {
        let ledger = ledger();
        ledger.initialize("acct").await.unwrap();

        for amount in 0..6 {
            let expected = ledger.balance("acct").await.unwrap() >= amount;
            assert_eq!(
                ledger.has_sufficient("acct", amount).await.unwrap(),
                expected
            );
        }
    }
}
