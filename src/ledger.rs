//! Process-local credit ledger and analysis history.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::collaborators::{CreditLedger, HistoryEntry, HistoryStore};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub user_id: String,
    pub amount: i64,
    pub description: String,
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: RwLock<HashMap<String, i64>>,
    transactions: RwLock<Vec<LedgerTransaction>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed each user with the same starting balance.
    pub fn with_starting_credits<'a>(users: impl IntoIterator<Item = &'a str>, credits: i64) -> Self {
        let ledger = Self::new();
        if let Ok(mut balances) = ledger.balances.write() {
            for user in users {
                balances.insert(user.to_string(), credits);
            }
        }
        ledger
    }

    pub fn set_balance(&self, user_id: &str, credits: i64) -> Result<()> {
        self.balances
            .write()
            .map_err(|_| Error::Internal("Failed to acquire write lock on balances".to_string()))?
            .insert(user_id.to_string(), credits);
        Ok(())
    }

    pub fn transactions(&self) -> Vec<LedgerTransaction> {
        self.transactions
            .read()
            .map(|t| t.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CreditLedger for InMemoryLedger {
    async fn balance(&self, user_id: &str) -> Result<Option<i64>> {
        let balances = self
            .balances
            .read()
            .map_err(|_| Error::Internal("Failed to acquire read lock on balances".to_string()))?;
        Ok(balances.get(user_id).copied())
    }

    async fn deduct(&self, user_id: &str, amount: i64, description: &str) -> Result<()> {
        {
            let mut balances = self.balances.write().map_err(|_| {
                Error::Internal("Failed to acquire write lock on balances".to_string())
            })?;
            let balance = balances
                .get_mut(user_id)
                .ok_or_else(|| Error::Internal(format!("no balance record for {}", user_id)))?;
            if *balance < amount {
                return Err(Error::Internal("balance would go negative".to_string()));
            }
            *balance -= amount;
        }

        self.transactions
            .write()
            .map_err(|_| Error::Internal("Failed to acquire write lock on transactions".to_string()))?
            .push(LedgerTransaction {
                user_id: user_id.to_string(),
                amount: -amount,
                description: description.to_string(),
            });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryHistory {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries_for(&self, user_id: &str) -> Vec<HistoryEntry> {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.user_id == user_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn append(&self, entry: HistoryEntry) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| Error::Internal("Failed to acquire write lock on history".to_string()))?
            .push(entry);
        Ok(())
    }
}
