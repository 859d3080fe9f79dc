//! The showcase kernel: one explicit context object owning the registry,
//! order book, reconcile schedule, actor inventories, and the optional
//! economy gateway. Every operation that needs world truth takes the world
//! runtime as a parameter; the kernel never owns the tick source.

use std::collections::BTreeMap;
use std::fmt;

use contracts::{
    ActorId, BlockPos, CoreConfig, ItemKey, ItemTemplate, Material, OwnerNotice, RegionPos,
    ShowcaseKind, ShowcaseRecord, StorageMode, TradeDirection, WorldId,
};

use crate::economy::EconomyGateway;
use crate::inventory::{Inventory, InventoryError};
use crate::reconciler;
use crate::registry::{RegistryError, ShowcaseRegistry};
use crate::scheduler::ReconcileScheduler;
use crate::showcase::{generate_marker, Showcase, ShowcaseKey};
use crate::trade::{OrderBook, OrderSummary, SettlementReceipt, TradeError};
use crate::world::WorldRuntime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifyError {
    UnknownShowcase(ShowcaseKey),
    NotAShop(ShowcaseKey),
    DirectionNotSupported {
        kind: ShowcaseKind,
        direction: TradeDirection,
    },
    InvalidPrice(i64),
}

impl fmt::Display for ModifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifyError::UnknownShowcase(key) => write!(f, "no showcase at {key}"),
            ModifyError::NotAShop(key) => write!(f, "the showcase at {key} is not a shop"),
            ModifyError::DirectionNotSupported { kind, direction } => {
                write!(f, "a {kind} showcase has no {direction} price")
            }
            ModifyError::InvalidPrice(price) => write!(f, "invalid price: {price}"),
        }
    }
}

impl std::error::Error for ModifyError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    UnknownShowcase(ShowcaseKey),
    NotAShop(ShowcaseKey),
    /// Infinite shops have no storage to open.
    InfiniteStorage(ShowcaseKey),
    Container(InventoryError),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::UnknownShowcase(key) => write!(f, "no showcase at {key}"),
            StorageError::NotAShop(key) => write!(f, "the showcase at {key} is not a shop"),
            StorageError::InfiniteStorage(key) => {
                write!(f, "the shop at {key} has infinite storage")
            }
            StorageError::Container(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<InventoryError> for StorageError {
    fn from(err: InventoryError) -> Self {
        StorageError::Container(err)
    }
}

/// Aggregate of what a `step` call did, mirroring the reconciler's
/// per-tick outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepMetrics {
    pub ticks_advanced: u64,
    pub tasks_run: u64,
    pub corrections: u64,
    pub suspended_ticks: u64,
}

#[derive(Debug)]
pub struct ShowcaseWorld {
    config: CoreConfig,
    registry: ShowcaseRegistry,
    orders: OrderBook,
    scheduler: ReconcileScheduler,
    inventories: BTreeMap<ActorId, Inventory>,
    economy: Option<Box<dyn EconomyGateway>>,
    current_tick: u64,
    next_marker_sequence: u64,
}

impl ShowcaseWorld {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            registry: ShowcaseRegistry::new(),
            orders: OrderBook::new(),
            scheduler: ReconcileScheduler::new(),
            inventories: BTreeMap::new(),
            economy: None,
            current_tick: 0,
            next_marker_sequence: 0,
        }
    }

    pub fn attach_economy(&mut self, economy: Box<dyn EconomyGateway>) {
        self.economy = Some(economy);
    }

    pub fn has_economy(&self) -> bool {
        self.economy.is_some()
    }

    pub fn economy(&self) -> Option<&dyn EconomyGateway> {
        self.economy.as_deref()
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn registry(&self) -> &ShowcaseRegistry {
        &self.registry
    }

    pub fn orders(&self) -> &OrderBook {
        &self.orders
    }

    pub fn inventory(&self, actor: &ActorId) -> Option<&Inventory> {
        self.inventories.get(actor)
    }

    /// The actor's personal inventory, created at the configured capacity
    /// on first touch.
    pub fn actor_inventory(&mut self, actor: &ActorId) -> &mut Inventory {
        let capacity = self.config.actor_inventory_capacity;
        self.inventories
            .entry(actor.clone())
            .or_insert_with(|| Inventory::with_capacity(capacity))
    }

    // -- lifecycle ----------------------------------------------------------

    /// Place a new showcase and start its reconcile task. The first
    /// reconciliation runs immediately, so the representative entity exists
    /// before the call returns whenever the region is loaded.
    pub fn place_showcase(
        &mut self,
        world: &mut dyn WorldRuntime,
        world_id: WorldId,
        position: BlockPos,
        owner: ActorId,
        material: Material,
        display_name: Option<String>,
    ) -> Result<ShowcaseKey, RegistryError> {
        let marker = generate_marker(
            self.config.seed,
            &world_id,
            position,
            self.next_marker_sequence,
        );
        self.next_marker_sequence += 1;
        let item = ItemTemplate {
            material,
            display_name,
            marker,
        };
        let region = RegionPos::containing(position);
        let showcase = Showcase::new(world_id, position, owner, item, region);
        let key = showcase.key();
        self.registry.place(showcase, world, &self.config)?;
        self.activate(world, &key);
        log::info!("placed showcase {key}");
        Ok(key)
    }

    /// Re-register a showcase loaded from persistence.
    pub fn adopt_record(
        &mut self,
        world: &mut dyn WorldRuntime,
        world_id: WorldId,
        position: BlockPos,
        record: &ShowcaseRecord,
    ) -> Result<ShowcaseKey, RegistryError> {
        let showcase = Showcase::from_record(world_id, position, record, &self.config);
        let key = showcase.key();
        self.registry.adopt(showcase)?;
        self.activate(world, &key);
        Ok(key)
    }

    /// Remove a showcase: cancel its task, despawn its representative, and
    /// hand the final state back for the persistence layer to delete.
    pub fn remove_showcase(
        &mut self,
        world: &mut dyn WorldRuntime,
        key: &ShowcaseKey,
    ) -> Result<Showcase, RegistryError> {
        let showcase = self.registry.remove(key)?;
        if let Some(handle) = &showcase.runtime.task {
            self.scheduler.cancel(handle);
        }
        if let Some(display) = showcase.runtime.display {
            world.remove_entity(&showcase.world, display);
        }
        log::info!("removed showcase {key}");
        Ok(showcase)
    }

    fn activate(&mut self, world: &mut dyn WorldRuntime, key: &ShowcaseKey) {
        let due = self.current_tick + self.config.reconcile_period_ticks.max(1);
        let handle = self.scheduler.start(key.clone(), due);
        if let Some(showcase) = self.registry.lookup_mut(key) {
            showcase.runtime.task = Some(handle);
            reconciler::reconcile(showcase, world, &self.config);
        }
    }

    /// Durable form of a showcase for the persistence gateway.
    pub fn record_of(&self, key: &ShowcaseKey) -> Option<ShowcaseRecord> {
        self.registry.lookup(key).map(Showcase::to_record)
    }

    // -- modification -------------------------------------------------------

    pub fn modify_kind(&mut self, key: &ShowcaseKey, kind: ShowcaseKind) -> Result<(), ModifyError> {
        let capacity = self.config.stock_capacity;
        let showcase = self
            .registry
            .lookup_mut(key)
            .ok_or_else(|| ModifyError::UnknownShowcase(key.clone()))?;
        showcase.kind = kind;
        normalize_stock(showcase, capacity);
        Ok(())
    }

    pub fn modify_storage(
        &mut self,
        key: &ShowcaseKey,
        storage: StorageMode,
    ) -> Result<(), ModifyError> {
        let capacity = self.config.stock_capacity;
        let showcase = self
            .registry
            .lookup_mut(key)
            .ok_or_else(|| ModifyError::UnknownShowcase(key.clone()))?;
        if !showcase.kind.is_shop() {
            return Err(ModifyError::NotAShop(key.clone()));
        }
        showcase.storage = storage;
        normalize_stock(showcase, capacity);
        Ok(())
    }

    pub fn modify_price(
        &mut self,
        key: &ShowcaseKey,
        direction: TradeDirection,
        price: i64,
    ) -> Result<(), ModifyError> {
        if price < 0 {
            return Err(ModifyError::InvalidPrice(price));
        }
        let showcase = self
            .registry
            .lookup_mut(key)
            .ok_or_else(|| ModifyError::UnknownShowcase(key.clone()))?;
        if !showcase.kind.is_shop() {
            return Err(ModifyError::NotAShop(key.clone()));
        }
        let supported = match direction {
            TradeDirection::Buy => showcase.kind.buys(),
            TradeDirection::Sell => showcase.kind.sells(),
        };
        if !supported {
            return Err(ModifyError::DirectionNotSupported {
                kind: showcase.kind,
                direction,
            });
        }
        match direction {
            TradeDirection::Buy => showcase.buy_price = price,
            TradeDirection::Sell => showcase.sell_price = price,
        }
        Ok(())
    }

    // -- shop storage -------------------------------------------------------

    /// Move items from the actor's inventory into a finite shop's stock.
    pub fn stock_deposit(
        &mut self,
        key: &ShowcaseKey,
        actor: &ActorId,
        amount: u64,
    ) -> Result<(), StorageError> {
        let capacity = self.config.stock_capacity;
        let actor_capacity = self.config.actor_inventory_capacity;
        let showcase = self
            .registry
            .lookup_mut(key)
            .ok_or_else(|| StorageError::UnknownShowcase(key.clone()))?;
        if !showcase.kind.is_shop() {
            return Err(StorageError::NotAShop(key.clone()));
        }
        if showcase.storage == StorageMode::Infinite {
            return Err(StorageError::InfiniteStorage(key.clone()));
        }
        let item = showcase.item.key();
        let stock = showcase
            .stock
            .get_or_insert_with(|| Inventory::with_capacity(capacity));
        let inventory = self
            .inventories
            .entry(actor.clone())
            .or_insert_with(|| Inventory::with_capacity(actor_capacity));

        let available = inventory.count(&item);
        if amount > available {
            return Err(InventoryError::Short {
                requested: amount,
                available,
            }
            .into());
        }
        if !stock.can_fit(amount) {
            return Err(InventoryError::Full {
                requested: amount,
                free: stock.free_space(),
            }
            .into());
        }
        inventory.take(&item, amount)?;
        stock.add(&item, amount)?;
        Ok(())
    }

    /// Move items from a finite shop's stock back to the actor.
    pub fn stock_withdraw(
        &mut self,
        key: &ShowcaseKey,
        actor: &ActorId,
        amount: u64,
    ) -> Result<(), StorageError> {
        let capacity = self.config.stock_capacity;
        let actor_capacity = self.config.actor_inventory_capacity;
        let showcase = self
            .registry
            .lookup_mut(key)
            .ok_or_else(|| StorageError::UnknownShowcase(key.clone()))?;
        if !showcase.kind.is_shop() {
            return Err(StorageError::NotAShop(key.clone()));
        }
        if showcase.storage == StorageMode::Infinite {
            return Err(StorageError::InfiniteStorage(key.clone()));
        }
        let item = showcase.item.key();
        let stock = showcase
            .stock
            .get_or_insert_with(|| Inventory::with_capacity(capacity));
        let inventory = self
            .inventories
            .entry(actor.clone())
            .or_insert_with(|| Inventory::with_capacity(actor_capacity));

        let available = stock.count(&item);
        if amount > available {
            return Err(InventoryError::Short {
                requested: amount,
                available,
            }
            .into());
        }
        if !inventory.can_fit(amount) {
            return Err(InventoryError::Full {
                requested: amount,
                free: inventory.free_space(),
            }
            .into());
        }
        stock.take(&item, amount)?;
        inventory.add(&item, amount)?;
        Ok(())
    }

    // -- orders and settlement ---------------------------------------------

    /// Open (or replace) the actor's order against a shop, at amount 1.
    pub fn open_order(
        &mut self,
        actor: ActorId,
        key: &ShowcaseKey,
    ) -> Result<OrderSummary, TradeError> {
        let showcase = self
            .registry
            .lookup(key)
            .ok_or_else(|| TradeError::UnknownShowcase(key.clone()))?;
        if !showcase.kind.is_shop() {
            return Err(TradeError::NotAShop(key.clone()));
        }
        let summary = OrderSummary {
            item: showcase.item.clone(),
            amount: 1,
            buy_price: showcase.kind.buys().then_some(showcase.buy_price),
            sell_price: showcase.kind.sells().then_some(showcase.sell_price),
        };
        self.orders.open(actor, key.clone());
        Ok(summary)
    }

    pub fn set_order_amount(&mut self, actor: &ActorId, amount: i64) -> Result<u32, TradeError> {
        self.orders.set_amount(actor, amount)
    }

    pub fn settle_buy(
        &mut self,
        world: &dyn WorldRuntime,
        actor: &ActorId,
    ) -> Result<SettlementReceipt, TradeError> {
        self.settle(world, actor, TradeDirection::Buy)
    }

    pub fn settle_sell(
        &mut self,
        world: &dyn WorldRuntime,
        actor: &ActorId,
    ) -> Result<SettlementReceipt, TradeError> {
        self.settle(world, actor, TradeDirection::Sell)
    }

    /// Atomic two-leg settlement. Preconditions run first and abort with no
    /// side effects; the stock/possession mutation commits only after both
    /// currency legs succeed. If the payer leg fails after the owner leg
    /// applied, the owner leg is reversed before the failure is reported.
    fn settle(
        &mut self,
        world: &dyn WorldRuntime,
        actor: &ActorId,
        direction: TradeDirection,
    ) -> Result<SettlementReceipt, TradeError> {
        let order = self.orders.open_order(actor)?.clone();
        let key = order.showcase.clone();
        let amount = order.amount;
        let quantity = u64::from(amount);

        let showcase = self
            .registry
            .lookup(&key)
            .ok_or_else(|| TradeError::UnknownShowcase(key.clone()))?;

        // 1. Direction must be allowed by the showcase kind.
        let allowed = match direction {
            TradeDirection::Buy => showcase.kind.buys(),
            TradeDirection::Sell => showcase.kind.sells(),
        };
        if !allowed {
            return Err(TradeError::WrongDirection {
                kind: showcase.kind,
                direction,
            });
        }

        let price = showcase.price_for(direction);
        let total = price
            .checked_mul(i64::from(amount))
            .ok_or(TradeError::InvalidAmount(i64::from(amount)))?;

        // 2. A priced trade needs a ledger to move currency through.
        if price > 0 && self.economy.is_none() {
            return Err(TradeError::EconomyUnavailable);
        }

        let item = showcase.item.clone();
        let item_key = item.key();
        let owner = showcase.owner.clone();
        let world_id = showcase.world.clone();
        let finite = showcase.storage == StorageMode::Finite;

        // 3. Buy: the shop must actually hold what is being bought.
        if direction == TradeDirection::Buy && finite {
            let available = showcase
                .stock
                .as_ref()
                .map(|stock| stock.count(&item_key))
                .unwrap_or(0);
            if quantity > available {
                return Err(TradeError::InsufficientStock { available });
            }
        }

        // 4. Sell: the actor must hold what is being sold.
        if direction == TradeDirection::Sell {
            let held = self
                .inventories
                .get(actor)
                .map(|inventory| inventory.count(&item_key))
                .unwrap_or(0);
            if quantity > held {
                return Err(TradeError::InsufficientItems { held });
            }
        }

        // 5. The receiving container must have room for the goods.
        match direction {
            TradeDirection::Buy => {
                let free = self
                    .inventories
                    .get(actor)
                    .map(Inventory::free_space)
                    .unwrap_or(self.config.actor_inventory_capacity);
                if quantity > free {
                    return Err(TradeError::InventoryFull { free });
                }
            }
            TradeDirection::Sell if finite => {
                let free = showcase
                    .stock
                    .as_ref()
                    .map(Inventory::free_space)
                    .unwrap_or(0);
                if quantity > free {
                    return Err(TradeError::InventoryFull { free });
                }
            }
            TradeDirection::Sell => {}
        }

        // Currency legs. Skipped entirely for free exchanges.
        if total > 0 {
            self.transfer_currency(&key, actor, &owner, &world_id, direction, finite, total)?;
        }

        // Commit the goods. Preconditions above make failure impossible in
        // a single-threaded driver; a breach is logged and surfaced as a
        // settlement failure rather than a panic.
        if let Err(err) = self.commit_goods(&key, actor, &item_key, quantity, direction, finite) {
            log::error!("goods commit failed after currency legs at {key}: {err}");
            return Err(TradeError::SettlementFailed);
        }

        self.orders.close(actor);

        // Only a finite shop has a counterparty with a stake worth telling.
        let owner_notice = (finite && world.is_actor_reachable(&owner)).then(|| OwnerNotice {
            owner: owner.clone(),
            actor: actor.clone(),
            item: item.clone(),
            amount,
            direction,
        });

        Ok(SettlementReceipt {
            direction,
            item,
            amount,
            total,
            owner_notice,
        })
    }

    /// Apply leg A (owner side, skipped for infinite storage) then leg B
    /// (actor side), verifying the payer's balance up front.
    fn transfer_currency(
        &mut self,
        key: &ShowcaseKey,
        actor: &ActorId,
        owner: &ActorId,
        world_id: &WorldId,
        direction: TradeDirection,
        finite: bool,
        total: i64,
    ) -> Result<(), TradeError> {
        let Some(economy) = self.economy.as_mut() else {
            return Err(TradeError::EconomyUnavailable);
        };

        let payer = match direction {
            TradeDirection::Buy => Some(actor),
            TradeDirection::Sell if finite => Some(owner),
            // Infinite sell shops mint the payout; nobody is debited.
            TradeDirection::Sell => None,
        };
        if let Some(payer) = payer {
            let balance = economy.balance(payer, world_id).unwrap_or(0);
            if balance < total {
                return Err(TradeError::InsufficientFunds {
                    balance,
                    required: total,
                });
            }
        }

        let leg_a = match direction {
            TradeDirection::Buy if finite => Some(economy.deposit(owner, world_id, total)),
            TradeDirection::Sell if finite => Some(economy.withdraw(owner, world_id, total)),
            _ => None,
        };
        let leg_a_applied = match leg_a {
            Some(Ok(())) => true,
            Some(Err(err)) => {
                log::warn!("owner leg rejected at {key}: {err}");
                return Err(TradeError::SettlementFailed);
            }
            None => false,
        };

        let leg_b = match direction {
            TradeDirection::Buy => economy.withdraw(actor, world_id, total),
            TradeDirection::Sell => economy.deposit(actor, world_id, total),
        };
        if let Err(err) = leg_b {
            log::warn!("actor leg rejected at {key}: {err}");
            if leg_a_applied {
                let reversal = match direction {
                    TradeDirection::Buy => economy.withdraw(owner, world_id, total),
                    TradeDirection::Sell => economy.deposit(owner, world_id, total),
                };
                match reversal {
                    Ok(()) => log::warn!("reversed owner leg after failed settlement at {key}"),
                    Err(err) => {
                        log::error!("could not reverse owner leg at {key}: {err}")
                    }
                }
            }
            return Err(TradeError::SettlementFailed);
        }

        Ok(())
    }

    fn commit_goods(
        &mut self,
        key: &ShowcaseKey,
        actor: &ActorId,
        item: &ItemKey,
        quantity: u64,
        direction: TradeDirection,
        finite: bool,
    ) -> Result<(), InventoryError> {
        let actor_capacity = self.config.actor_inventory_capacity;
        match direction {
            TradeDirection::Buy => {
                if finite {
                    if let Some(stock) = self
                        .registry
                        .lookup_mut(key)
                        .and_then(|showcase| showcase.stock.as_mut())
                    {
                        stock.take(item, quantity)?;
                    }
                }
                self.inventories
                    .entry(actor.clone())
                    .or_insert_with(|| Inventory::with_capacity(actor_capacity))
                    .add(item, quantity)?;
            }
            TradeDirection::Sell => {
                self.inventories
                    .entry(actor.clone())
                    .or_insert_with(|| Inventory::with_capacity(actor_capacity))
                    .take(item, quantity)?;
                if finite {
                    if let Some(stock) = self
                        .registry
                        .lookup_mut(key)
                        .and_then(|showcase| showcase.stock.as_mut())
                    {
                        stock.add(item, quantity)?;
                    }
                }
            }
        }
        Ok(())
    }

    // -- tick driving -------------------------------------------------------

    /// Advance the cooperative tick driver, running every reconcile task
    /// that comes due and re-arming it one period later.
    pub fn step(&mut self, world: &mut dyn WorldRuntime, ticks: u64) -> StepMetrics {
        let mut metrics = StepMetrics::default();
        let period = self.config.reconcile_period_ticks.max(1);
        for _ in 0..ticks {
            self.current_tick += 1;
            metrics.ticks_advanced += 1;
            while let Some(handle) = self.scheduler.pop_due(self.current_tick) {
                let Some(showcase) = self.registry.lookup_mut(handle.key()) else {
                    // Removed without a cancel; let the task die out.
                    continue;
                };
                let outcome = reconciler::reconcile(showcase, world, &self.config);
                metrics.tasks_run += 1;
                metrics.corrections += u64::from(outcome.corrections());
                if outcome.suspended {
                    metrics.suspended_ticks += 1;
                }
                self.scheduler.rearm(&handle, self.current_tick + period);
            }
        }
        metrics
    }
}

/// Stock exists exactly for finite shops; everything else carries none.
fn normalize_stock(showcase: &mut Showcase, capacity: u64) {
    if showcase.is_finite_shop() {
        if showcase.stock.is_none() {
            showcase.stock = Some(Inventory::with_capacity(capacity));
        }
    } else {
        showcase.stock = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MemoryWorld;

    fn overworld() -> WorldId {
        WorldId::new("overworld")
    }

    fn mira() -> ActorId {
        ActorId::new("mira")
    }

    fn setup() -> (ShowcaseWorld, MemoryWorld, BlockPos) {
        let config = CoreConfig::default();
        let pos = BlockPos::new(4, 64, 4);
        let mut world = MemoryWorld::new();
        world.add_world(overworld());
        world.set_block(&overworld(), pos, config.default_material().clone());
        (ShowcaseWorld::new(config), world, pos)
    }

    fn place(kernel: &mut ShowcaseWorld, world: &mut MemoryWorld, pos: BlockPos) -> ShowcaseKey {
        kernel
            .place_showcase(
                world,
                overworld(),
                pos,
                mira(),
                Material::new("emerald"),
                None,
            )
            .expect("placement succeeds")
    }

    #[test]
    fn placing_spawns_the_representative_immediately() {
        let (mut kernel, mut world, pos) = setup();
        let key = place(&mut kernel, &mut world, pos);

        assert_eq!(world.tagged_entities(&overworld(), pos).len(), 1);
        let showcase = kernel.registry().lookup(&key).expect("registered");
        assert!(showcase.runtime.display.is_some());
        assert!(showcase.runtime.task.is_some());
    }

    #[test]
    fn removal_despawns_and_stops_the_task() {
        let (mut kernel, mut world, pos) = setup();
        let key = place(&mut kernel, &mut world, pos);

        kernel
            .remove_showcase(&mut world, &key)
            .expect("removal succeeds");
        assert_eq!(world.entity_count(&overworld()), 0);

        // Many periods later, nothing comes back.
        let period = kernel.config().reconcile_period_ticks;
        kernel.step(&mut world, period * 4);
        assert_eq!(world.entity_count(&overworld()), 0);
        assert!(kernel.registry().is_empty());
    }

    #[test]
    fn step_runs_reconciliation_on_the_period() {
        let (mut kernel, mut world, pos) = setup();
        let key = place(&mut kernel, &mut world, pos);
        let display = kernel
            .registry()
            .lookup(&key)
            .and_then(|s| s.runtime.display)
            .expect("display bound");

        // Outside interference between ticks.
        world.remove_entity(&overworld(), display);
        let period = kernel.config().reconcile_period_ticks;

        let metrics = kernel.step(&mut world, period - 1);
        assert_eq!(metrics.tasks_run, 0);
        assert_eq!(world.entity_count(&overworld()), 0);

        let metrics = kernel.step(&mut world, 1);
        assert_eq!(metrics.tasks_run, 1);
        assert_eq!(world.entity_count(&overworld()), 1);
    }

    #[test]
    fn modify_kind_allocates_and_drops_stock() {
        let (mut kernel, mut world, pos) = setup();
        let key = place(&mut kernel, &mut world, pos);

        kernel
            .modify_kind(&key, ShowcaseKind::Buy)
            .expect("kind change");
        assert!(kernel
            .registry()
            .lookup(&key)
            .and_then(|s| s.stock.as_ref())
            .is_some());

        kernel
            .modify_kind(&key, ShowcaseKind::Display)
            .expect("kind change back");
        assert!(kernel
            .registry()
            .lookup(&key)
            .and_then(|s| s.stock.as_ref())
            .is_none());
    }

    #[test]
    fn modify_price_respects_kind_directions() {
        let (mut kernel, mut world, pos) = setup();
        let key = place(&mut kernel, &mut world, pos);

        let err = kernel
            .modify_price(&key, TradeDirection::Buy, 100)
            .expect_err("display has no prices");
        assert!(matches!(err, ModifyError::NotAShop(_)));

        kernel
            .modify_kind(&key, ShowcaseKind::Sell)
            .expect("kind change");
        let err = kernel
            .modify_price(&key, TradeDirection::Buy, 100)
            .expect_err("sell-only");
        assert!(matches!(err, ModifyError::DirectionNotSupported { .. }));
        kernel
            .modify_price(&key, TradeDirection::Sell, 100)
            .expect("sell price fits");

        let err = kernel
            .modify_price(&key, TradeDirection::Sell, -5)
            .expect_err("negative price");
        assert!(matches!(err, ModifyError::InvalidPrice(-5)));
    }

    #[test]
    fn storage_moves_between_actor_and_stock() {
        let (mut kernel, mut world, pos) = setup();
        let key = place(&mut kernel, &mut world, pos);
        kernel
            .modify_kind(&key, ShowcaseKind::Buy)
            .expect("kind change");

        let item = kernel
            .registry()
            .lookup(&key)
            .map(|s| s.item.key())
            .expect("item known");
        kernel
            .actor_inventory(&mira())
            .add(&item, 20)
            .expect("seed items");

        kernel
            .stock_deposit(&key, &mira(), 15)
            .expect("deposit fits");
        assert_eq!(kernel.inventory(&mira()).map(|i| i.count(&item)), Some(5));

        kernel
            .stock_withdraw(&key, &mira(), 10)
            .expect("withdraw fits");
        assert_eq!(kernel.inventory(&mira()).map(|i| i.count(&item)), Some(15));

        let err = kernel
            .stock_withdraw(&key, &mira(), 99)
            .expect_err("stock short");
        assert!(matches!(err, StorageError::Container(_)));
    }

    #[test]
    fn storage_rejects_infinite_shops() {
        let (mut kernel, mut world, pos) = setup();
        let key = place(&mut kernel, &mut world, pos);
        kernel
            .modify_kind(&key, ShowcaseKind::Buy)
            .expect("kind change");
        kernel
            .modify_storage(&key, StorageMode::Infinite)
            .expect("storage change");

        let err = kernel
            .stock_deposit(&key, &mira(), 1)
            .expect_err("infinite shops have no storage");
        assert!(matches!(err, StorageError::InfiniteStorage(_)));
    }

    #[test]
    fn orders_require_a_shop() {
        let (mut kernel, mut world, pos) = setup();
        let key = place(&mut kernel, &mut world, pos);
        let err = kernel
            .open_order(mira(), &key)
            .expect_err("display showcases do not trade");
        assert!(matches!(err, TradeError::NotAShop(_)));
    }

    #[test]
    fn order_summary_lists_applicable_prices() {
        let (mut kernel, mut world, pos) = setup();
        let key = place(&mut kernel, &mut world, pos);
        kernel
            .modify_kind(&key, ShowcaseKind::Buy)
            .expect("kind change");
        kernel
            .modify_price(&key, TradeDirection::Buy, 700)
            .expect("price set");

        let summary = kernel.open_order(mira(), &key).expect("order opens");
        assert_eq!(summary.amount, 1);
        assert_eq!(summary.buy_price, Some(700));
        assert_eq!(summary.sell_price, None);
    }
}
