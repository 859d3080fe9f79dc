//! Economy gateway: the external currency ledger seen from the kernel.

use std::collections::BTreeMap;
use std::fmt;

use contracts::{ActorId, WorldId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EconomyError {
    UnknownAccount(ActorId),
    InsufficientBalance {
        actor: ActorId,
        balance: i64,
        required: i64,
    },
    InvalidAmount(i64),
}

impl fmt::Display for EconomyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EconomyError::UnknownAccount(actor) => write!(f, "unknown account: {actor}"),
            EconomyError::InsufficientBalance {
                actor,
                balance,
                required,
            } => write!(
                f,
                "insufficient balance for {actor}: has {balance}, needs {required}"
            ),
            EconomyError::InvalidAmount(amount) => write!(f, "invalid amount: {amount}"),
        }
    }
}

impl std::error::Error for EconomyError {}

/// External ledger service. Amounts are minor currency units. Absence of a
/// gateway is a valid configuration state the kernel detects; any priced
/// settlement is rejected while none is attached.
pub trait EconomyGateway: fmt::Debug {
    fn balance(&self, actor: &ActorId, world: &WorldId) -> Result<i64, EconomyError>;

    fn deposit(&mut self, actor: &ActorId, world: &WorldId, amount: i64)
        -> Result<(), EconomyError>;

    fn withdraw(
        &mut self,
        actor: &ActorId,
        world: &WorldId,
        amount: i64,
    ) -> Result<(), EconomyError>;

    /// Render an amount for user-facing text, currency name included.
    fn format(&self, amount: i64) -> String;

    fn currency_singular(&self) -> &str;

    fn currency_plural(&self) -> &str;
}

/// In-memory ledger with per-world accounts. Accounts are created on first
/// deposit; withdrawing from a missing account is an unknown-account error.
#[derive(Debug, Clone)]
pub struct MemoryEconomy {
    accounts: BTreeMap<(WorldId, ActorId), i64>,
    singular: String,
    plural: String,
}

impl MemoryEconomy {
    pub fn new(singular: impl Into<String>, plural: impl Into<String>) -> Self {
        Self {
            accounts: BTreeMap::new(),
            singular: singular.into(),
            plural: plural.into(),
        }
    }

    pub fn open_account(&mut self, actor: ActorId, world: WorldId, opening_balance: i64) {
        self.accounts.insert((world, actor), opening_balance.max(0));
    }

    fn account_key(actor: &ActorId, world: &WorldId) -> (WorldId, ActorId) {
        (world.clone(), actor.clone())
    }
}

impl Default for MemoryEconomy {
    fn default() -> Self {
        Self::new("coin", "coins")
    }
}

impl EconomyGateway for MemoryEconomy {
    fn balance(&self, actor: &ActorId, world: &WorldId) -> Result<i64, EconomyError> {
        self.accounts
            .get(&Self::account_key(actor, world))
            .copied()
            .ok_or_else(|| EconomyError::UnknownAccount(actor.clone()))
    }

    fn deposit(
        &mut self,
        actor: &ActorId,
        world: &WorldId,
        amount: i64,
    ) -> Result<(), EconomyError> {
        if amount <= 0 {
            return Err(EconomyError::InvalidAmount(amount));
        }
        *self
            .accounts
            .entry(Self::account_key(actor, world))
            .or_insert(0) += amount;
        Ok(())
    }

    fn withdraw(
        &mut self,
        actor: &ActorId,
        world: &WorldId,
        amount: i64,
    ) -> Result<(), EconomyError> {
        if amount <= 0 {
            return Err(EconomyError::InvalidAmount(amount));
        }
        let key = Self::account_key(actor, world);
        let balance = self
            .accounts
            .get(&key)
            .copied()
            .ok_or_else(|| EconomyError::UnknownAccount(actor.clone()))?;
        if balance < amount {
            return Err(EconomyError::InsufficientBalance {
                actor: actor.clone(),
                balance,
                required: amount,
            });
        }
        self.accounts.insert(key, balance - amount);
        Ok(())
    }

    fn format(&self, amount: i64) -> String {
        let name = if amount == 100 {
            &self.singular
        } else {
            &self.plural
        };
        format!("{}.{:02} {}", amount / 100, (amount % 100).abs(), name)
    }

    fn currency_singular(&self) -> &str {
        &self.singular
    }

    fn currency_plural(&self) -> &str {
        &self.plural
    }
}
