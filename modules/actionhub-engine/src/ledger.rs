//! In-process `Ledger` implementation.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::traits::{Ledger, UserDirectory};

#[derive(Debug, Clone, PartialEq, Eq)]
struct LedgerRecord {
    login: String,
    points: i64,
}

/// Ledger held in memory. Every mutation happens under one lock, so
/// concurrent deltas from the executor and from accrual timers never lose
/// an update.
pub struct MemoryLedger {
    records: Mutex<HashMap<String, LedgerRecord>>,
    directory: Arc<dyn UserDirectory>,
}

impl MemoryLedger {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            directory,
        }
    }

    /// Make sure a record exists for `user_id`, resolving its login through
    /// the directory the first time it is seen.
    async fn ensure_record(&self, user_id: &str) -> Result<(), LedgerError> {
        if user_id.trim().is_empty() {
            return Err(LedgerError::EmptyUser);
        }
        if self.records.lock().await.contains_key(user_id) {
            return Ok(());
        }

        let login = self
            .directory
            .login_for_id(user_id)
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?
            .ok_or_else(|| LedgerError::UnknownUser(user_id.to_string()))?;

        let mut records = self.records.lock().await;
        records.entry(user_id.to_string()).or_insert_with(|| {
            info!(user_id, login = %login, "Provisioned ledger record");
            LedgerRecord { login, points: 0 }
        });
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance(&self, user_id: &str) -> Result<i64> {
        self.ensure_record(user_id).await?;
        let records = self.records.lock().await;
        Ok(records.get(user_id).map(|r| r.points).unwrap_or(0))
    }

    async fn add_points(&self, user_id: &str, delta: i64) -> Result<i64> {
        self.ensure_record(user_id).await?;
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::UnknownUser(user_id.to_string()))?;
        record.points = record.points.saturating_add(delta);
        debug!(user_id, delta, balance = record.points, "Ledger updated");
        Ok(record.points)
    }

    async fn set_points(&self, user_id: &str, points: i64) -> Result<()> {
        self.ensure_record(user_id).await?;
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(user_id) {
            record.points = points;
        }
        Ok(())
    }

    async fn all_points(&self) -> Result<Vec<(String, i64)>> {
        let records = self.records.lock().await;
        let mut all: Vec<(String, i64)> = records
            .values()
            .map(|r| (r.login.clone(), r.points))
            .collect();
        all.sort();
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticDirectory;

    fn ledger() -> MemoryLedger {
        MemoryLedger::new(Arc::new(
            StaticDirectory::new()
                .with_user("100", "alice")
                .with_user("200", "bob"),
        ))
    }

    #[tokio::test]
    async fn first_reference_provisions_with_zero_balance() {
        let ledger = ledger();
        assert_eq!(ledger.balance("100").await.unwrap(), 0);
        assert_eq!(ledger.all_points().await.unwrap(), vec![("alice".to_string(), 0)]);
    }

    #[tokio::test]
    async fn credit_and_debit_are_signed_deltas() {
        let ledger = ledger();
        assert_eq!(ledger.credit("100", 100).await.unwrap(), 100);
        assert_eq!(ledger.debit("100", 30).await.unwrap(), 70);
        assert_eq!(ledger.add_points("100", -80).await.unwrap(), -10);
        ledger.set_points("200", 7).await.unwrap();
        assert_eq!(
            ledger.all_points().await.unwrap(),
            vec![("alice".to_string(), -10), ("bob".to_string(), 7)]
        );
    }

    #[tokio::test]
    async fn unknown_or_empty_user_is_an_error() {
        let ledger = ledger();
        let err = ledger.credit("999", 5).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::UnknownUser(id)) if id == "999"
        ));
        assert!(ledger.balance("  ").await.is_err());
    }

    #[tokio::test]
    async fn concurrent_deltas_are_not_lost() {
        let ledger = Arc::new(ledger());
        let mut tasks = Vec::new();
        for _ in 0..50 {
            let ledger = Arc::clone(&ledger);
            tasks.push(tokio::spawn(async move {
                ledger.credit("100", 2).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(ledger.balance("100").await.unwrap(), 100);
    }
}
