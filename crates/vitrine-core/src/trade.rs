//! Orders and the vocabulary of trade settlement. The settlement algorithm
//! itself lives on [`crate::kernel::ShowcaseWorld`], which owns every store
//! a settlement touches.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use contracts::{ActorId, ItemTemplate, OwnerNotice, ShowcaseKind, TradeDirection};

use crate::showcase::ShowcaseKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Open,
    Settled,
}

/// A transient intent to trade some amount of one showcase's item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub showcase: ShowcaseKey,
    pub amount: u32,
    pub state: OrderState,
}

/// What an actor is shown when an order opens: the item on offer and the
/// prices that apply to the showcase's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub item: ItemTemplate,
    pub amount: u32,
    pub buy_price: Option<i64>,
    pub sell_price: Option<i64>,
}

/// Outcome of a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReceipt {
    pub direction: TradeDirection,
    pub item: ItemTemplate,
    pub amount: u32,
    /// Currency moved; zero for free exchanges.
    pub total: i64,
    /// Present only when a finite-storage owner was reachable to notify.
    pub owner_notice: Option<OwnerNotice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeError {
    NoOpenOrder(ActorId),
    /// The ordered showcase no longer exists.
    UnknownShowcase(ShowcaseKey),
    NotAShop(ShowcaseKey),
    InvalidAmount(i64),
    WrongDirection {
        kind: ShowcaseKind,
        direction: TradeDirection,
    },
    /// A price is set but no economy gateway is configured.
    EconomyUnavailable,
    InsufficientStock {
        available: u64,
    },
    InsufficientItems {
        held: u64,
    },
    /// The receiving container cannot fit the settled amount.
    InventoryFull {
        free: u64,
    },
    InsufficientFunds {
        balance: i64,
        required: i64,
    },
    /// A currency leg was rejected by the gateway mid-settlement.
    SettlementFailed,
}

impl fmt::Display for TradeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeError::NoOpenOrder(actor) => write!(f, "{actor} has no open order"),
            TradeError::UnknownShowcase(key) => {
                write!(f, "the showcase at {key} no longer exists")
            }
            TradeError::NotAShop(key) => write!(f, "the showcase at {key} does not trade"),
            TradeError::InvalidAmount(amount) => {
                write!(f, "order amount must be a positive integer, got {amount}")
            }
            TradeError::WrongDirection { kind, direction } => {
                write!(f, "a {kind} showcase does not allow {direction} settlement")
            }
            TradeError::EconomyUnavailable => {
                write!(f, "no economy service is available for priced trades")
            }
            TradeError::InsufficientStock { available } => {
                write!(f, "not enough stock: {available} available")
            }
            TradeError::InsufficientItems { held } => {
                write!(f, "you only hold {held} of the ordered item")
            }
            TradeError::InventoryFull { free } => {
                write!(f, "not enough room: only space for {free} more")
            }
            TradeError::InsufficientFunds { balance, required } => {
                write!(f, "insufficient funds: balance {balance}, required {required}")
            }
            TradeError::SettlementFailed => write!(f, "the trade could not be completed"),
        }
    }
}

impl std::error::Error for TradeError {}

/// All live orders, one per acting party. Opening a new order replaces any
/// previous one; there is no queueing.
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: BTreeMap<ActorId, Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, actor: ActorId, showcase: ShowcaseKey) -> &Order {
        let order = Order {
            showcase,
            amount: 1,
            state: OrderState::Open,
        };
        match self.orders.entry(actor) {
            Entry::Occupied(mut existing) => {
                existing.insert(order);
                existing.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(order),
        }
    }

    pub fn set_amount(&mut self, actor: &ActorId, amount: i64) -> Result<u32, TradeError> {
        let order = self
            .orders
            .get_mut(actor)
            .filter(|order| order.state == OrderState::Open)
            .ok_or_else(|| TradeError::NoOpenOrder(actor.clone()))?;
        if amount < 1 || amount > i64::from(u32::MAX) {
            return Err(TradeError::InvalidAmount(amount));
        }
        order.amount = amount as u32;
        Ok(order.amount)
    }

    pub fn get(&self, actor: &ActorId) -> Option<&Order> {
        self.orders.get(actor)
    }

    pub fn open_order(&self, actor: &ActorId) -> Result<&Order, TradeError> {
        self.orders
            .get(actor)
            .filter(|order| order.state == OrderState::Open)
            .ok_or_else(|| TradeError::NoOpenOrder(actor.clone()))
    }

    /// Settlement closed the order; drop it.
    pub fn close(&mut self, actor: &ActorId) -> Option<Order> {
        self.orders.remove(actor).map(|mut order| {
            order.state = OrderState::Settled;
            order
        })
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
