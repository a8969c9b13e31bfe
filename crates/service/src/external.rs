use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::error::{DaoError, Result};
use crate::parser::{Asset, FlexError, Name};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Default)]
pub struct SystemClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = match *last {
            Some(previous) if now <= previous => previous + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = match self.now.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = match self.now.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

pub trait VotingPower: Send + Sync {
    fn voting_power(&self, account: &Name) -> Result<Asset>;

    fn total_supply(&self) -> Result<Asset>;
}

pub trait BalanceLookup: Send + Sync {
    fn balance(&self, account: &Name, symbol: &str) -> Result<Asset>;
}

pub trait Treasury: BalanceLookup {
    /// Credits every amount or none of them.
    fn credit_all(&self, account: &Name, amounts: &[Asset]) -> Result<()>;

    /// Takes back what a successful `credit_all` paid.
    fn revert_all(&self, account: &Name, amounts: &[Asset]) -> Result<()>;
}

pub struct MemoryLedger {
    voting_symbol: String,
    precisions: DashMap<String, u8>,
    balances: DashMap<(Name, String), Asset>,
    transfers: Mutex<()>,
}

impl MemoryLedger {
    pub fn new(voting_symbol: &str, voting_precision: u8) -> Self {
        let precisions = DashMap::new();
        precisions.insert(voting_symbol.to_string(), voting_precision);
        Self {
            voting_symbol: voting_symbol.to_string(),
            precisions,
            balances: DashMap::new(),
            transfers: Mutex::new(()),
        }
    }

    pub fn register(&self, symbol: &str, precision: u8) {
        self.precisions.insert(symbol.to_string(), precision);
    }

    pub fn set_balance(&self, account: &Name, amount: Asset) {
        self.precisions.insert(amount.symbol().to_string(), amount.precision());
        self.balances.insert((account.clone(), amount.symbol().to_string()), amount);
    }

    fn zero(&self, symbol: &str) -> Result<Asset> {
        let precision = self
            .precisions
            .get(symbol)
            .map(|entry| *entry.value())
            .ok_or_else(|| DaoError::NotFound(format!("token {symbol}")))?;
        Ok(Asset::zero(precision, symbol)?)
    }
}

impl BalanceLookup for MemoryLedger {
    fn balance(&self, account: &Name, symbol: &str) -> Result<Asset> {
        match self.balances.get(&(account.clone(), symbol.to_string())) {
            Some(entry) => Ok(entry.value().clone()),
            None => self.zero(symbol),
        }
    }
}

impl MemoryLedger {
    fn transfer_all(
        &self,
        account: &Name,
        amounts: &[Asset],
        op: fn(&Asset, &Asset) -> std::result::Result<Asset, FlexError>,
    ) -> Result<()> {
        let _guard = self.transfers.lock().map_err(|_| DaoError::Poisoned)?;

        let mut updated: Vec<((Name, String), Asset)> = Vec::with_capacity(amounts.len());
        for amount in amounts {
            let key = (account.clone(), amount.symbol().to_string());
            let current = match updated.iter().find(|(staged, _)| *staged == key) {
                Some((_, staged)) => staged.clone(),
                None => match self.balances.get(&key) {
                    Some(entry) => entry.value().clone(),
                    None => Asset::zero(amount.precision(), amount.symbol())?,
                },
            };
            let next = op(&current, amount)?;
            updated.retain(|(staged, _)| *staged != key);
            updated.push((key, next));
        }

        for ((account, symbol), balance) in updated {
            self.precisions.entry(symbol.clone()).or_insert(balance.precision());
            debug!(account = %account, balance = %balance, "Balance updated");
            self.balances.insert((account, symbol), balance);
        }
        Ok(())
    }
}

impl Treasury for MemoryLedger {
    fn credit_all(&self, account: &Name, amounts: &[Asset]) -> Result<()> {
        self.transfer_all(account, amounts, Asset::checked_add)
    }

    fn revert_all(&self, account: &Name, amounts: &[Asset]) -> Result<()> {
        self.transfer_all(account, amounts, Asset::checked_sub)
    }
}

impl VotingPower for MemoryLedger {
    fn voting_power(&self, account: &Name) -> Result<Asset> {
        self.balance(account, &self.voting_symbol)
    }

    fn total_supply(&self) -> Result<Asset> {
        let mut total = self.zero(&self.voting_symbol)?;
        for entry in self.balances.iter() {
            if entry.key().1 == self.voting_symbol {
                total = total.checked_add(entry.value())?;
            }
        }
        Ok(total)
    }
}
