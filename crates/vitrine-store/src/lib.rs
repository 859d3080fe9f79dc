//! Service facade over the showcase kernel with optional SQLite
//! persistence. Persistence failures are recoverable by design: the
//! in-memory state stays authoritative for the session, the error is
//! logged and exposed, and the write is retried on the next save trigger.

mod store;

use std::path::Path;

use contracts::{
    ActorId, BlockPos, Material, ShowcaseKind, StorageMode, TradeDirection, WorldId,
};
use vitrine_core::kernel::{ModifyError, StepMetrics, StorageError};
use vitrine_core::registry::RegistryError;
use vitrine_core::showcase::ShowcaseKey;
use vitrine_core::trade::{OrderSummary, SettlementReceipt, TradeError};
use vitrine_core::world::WorldRuntime;
use vitrine_core::ShowcaseWorld;

pub use store::{PersistenceError, WorldStore};

#[derive(Debug)]
pub struct ShopService {
    kernel: ShowcaseWorld,
    store: Option<WorldStore>,
    last_persistence_error: Option<String>,
}

impl ShopService {
    pub fn from_kernel(kernel: ShowcaseWorld) -> Self {
        Self {
            kernel,
            store: None,
            last_persistence_error: None,
        }
    }

    pub fn attach_sqlite_store(&mut self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        self.store = Some(WorldStore::open(path)?);
        Ok(())
    }

    pub fn attach_memory_store(&mut self) -> Result<(), PersistenceError> {
        self.store = Some(WorldStore::open_in_memory()?);
        Ok(())
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn kernel(&self) -> &ShowcaseWorld {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut ShowcaseWorld {
        &mut self.kernel
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.last_persistence_error.as_deref()
    }

    /// Adopt every persisted showcase from every world in the store.
    /// A record that cannot be adopted (e.g. a duplicate position) is
    /// skipped with a warning rather than aborting the load.
    pub fn load_worlds(&mut self, world: &mut dyn WorldRuntime) -> Result<usize, PersistenceError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(0);
        };

        let mut batches = Vec::new();
        for world_id in store.worlds()? {
            let records = store.load_world(&world_id)?;
            batches.push((world_id, records));
        }

        let mut adopted = 0;
        for (world_id, records) in batches {
            let total = records.len();
            for (pos, record) in records {
                match self
                    .kernel
                    .adopt_record(world, world_id.clone(), pos, &record)
                {
                    Ok(_) => adopted += 1,
                    Err(err) => {
                        log::warn!("skipped persisted showcase at {world_id}:{pos}: {err}")
                    }
                }
            }
            log::info!("loaded {total} showcase(s) for world {world_id}");
        }
        Ok(adopted)
    }

    // -- mutating operations, each followed by a save trigger ---------------

    pub fn create_showcase(
        &mut self,
        world: &mut dyn WorldRuntime,
        world_id: WorldId,
        position: BlockPos,
        owner: ActorId,
        material: Material,
        display_name: Option<String>,
    ) -> Result<ShowcaseKey, RegistryError> {
        let key = self.kernel.place_showcase(
            world,
            world_id,
            position,
            owner,
            material,
            display_name,
        )?;
        self.persist_save(&key);
        Ok(key)
    }

    pub fn destroy_showcase(
        &mut self,
        world: &mut dyn WorldRuntime,
        key: &ShowcaseKey,
    ) -> Result<(), RegistryError> {
        self.kernel.remove_showcase(world, key)?;
        self.persist_delete(key);
        Ok(())
    }

    pub fn modify_kind(&mut self, key: &ShowcaseKey, kind: ShowcaseKind) -> Result<(), ModifyError> {
        self.kernel.modify_kind(key, kind)?;
        self.persist_save(key);
        Ok(())
    }

    pub fn modify_storage(
        &mut self,
        key: &ShowcaseKey,
        storage: StorageMode,
    ) -> Result<(), ModifyError> {
        self.kernel.modify_storage(key, storage)?;
        self.persist_save(key);
        Ok(())
    }

    pub fn modify_price(
        &mut self,
        key: &ShowcaseKey,
        direction: TradeDirection,
        price: i64,
    ) -> Result<(), ModifyError> {
        self.kernel.modify_price(key, direction, price)?;
        self.persist_save(key);
        Ok(())
    }

    pub fn stock_deposit(
        &mut self,
        key: &ShowcaseKey,
        actor: &ActorId,
        amount: u64,
    ) -> Result<(), StorageError> {
        self.kernel.stock_deposit(key, actor, amount)?;
        self.persist_save(key);
        Ok(())
    }

    pub fn stock_withdraw(
        &mut self,
        key: &ShowcaseKey,
        actor: &ActorId,
        amount: u64,
    ) -> Result<(), StorageError> {
        self.kernel.stock_withdraw(key, actor, amount)?;
        self.persist_save(key);
        Ok(())
    }

    // -- orders -------------------------------------------------------------

    pub fn open_order(
        &mut self,
        actor: ActorId,
        key: &ShowcaseKey,
    ) -> Result<OrderSummary, TradeError> {
        self.kernel.open_order(actor, key)
    }

    pub fn set_order_amount(&mut self, actor: &ActorId, amount: i64) -> Result<u32, TradeError> {
        self.kernel.set_order_amount(actor, amount)
    }

    pub fn settle_buy(
        &mut self,
        world: &dyn WorldRuntime,
        actor: &ActorId,
    ) -> Result<SettlementReceipt, TradeError> {
        let order = self.kernel.orders().open_order(actor)?.clone();
        let receipt = self.kernel.settle_buy(world, actor)?;
        self.persist_save(&order.showcase);
        Ok(receipt)
    }

    pub fn settle_sell(
        &mut self,
        world: &dyn WorldRuntime,
        actor: &ActorId,
    ) -> Result<SettlementReceipt, TradeError> {
        let order = self.kernel.orders().open_order(actor)?.clone();
        let receipt = self.kernel.settle_sell(world, actor)?;
        self.persist_save(&order.showcase);
        Ok(receipt)
    }

    // -- ticking ------------------------------------------------------------

    pub fn step(&mut self, world: &mut dyn WorldRuntime, ticks: u64) -> StepMetrics {
        self.kernel.step(world, ticks)
    }

    /// Explicit save trigger: re-persist every live showcase. This is also
    /// the retry path after an earlier persistence failure.
    pub fn flush_all(&mut self) {
        let keys: Vec<ShowcaseKey> = self.kernel.registry().keys().cloned().collect();
        for key in keys {
            self.persist_save(&key);
        }
    }

    fn persist_save(&mut self, key: &ShowcaseKey) {
        let Some(record) = self.kernel.record_of(key) else {
            return;
        };
        let tick = self.kernel.current_tick();
        let Some(store) = self.store.as_mut() else {
            return;
        };
        match store.save(&key.world, key.position, &record, tick) {
            Ok(()) => self.last_persistence_error = None,
            Err(err) => {
                log::error!("failed to save showcase {key}: {err}");
                self.last_persistence_error = Some(err.to_string());
            }
        }
    }

    fn persist_delete(&mut self, key: &ShowcaseKey) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        match store.delete(&key.world, key.position) {
            Ok(_) => self.last_persistence_error = None,
            Err(err) => {
                log::error!("failed to delete showcase {key}: {err}");
                self.last_persistence_error = Some(err.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CoreConfig, ItemKey};
    use vitrine_core::MemoryWorld;

    fn overworld() -> WorldId {
        WorldId::new("overworld")
    }

    fn mira() -> ActorId {
        ActorId::new("mira")
    }

    fn temp_db_path(name: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();

        std::env::temp_dir().join(format!("vitrine_{name}_{nanos}.sqlite"))
    }

    fn cleanup(path: &std::path::Path) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("sqlite-wal"));
        let _ = std::fs::remove_file(path.with_extension("sqlite-shm"));
    }

    fn world_with_slab(config: &CoreConfig, pos: BlockPos) -> MemoryWorld {
        let mut world = MemoryWorld::new();
        world.add_world(overworld());
        world.set_block(&overworld(), pos, config.default_material().clone());
        world
    }

    #[test]
    fn showcases_survive_a_restart() {
        let config = CoreConfig::default();
        let pos = BlockPos::new(3, 64, 3);
        let db_path = temp_db_path("restart");

        {
            let mut world = world_with_slab(&config, pos);
            let mut service = ShopService::from_kernel(ShowcaseWorld::new(config.clone()));
            service
                .attach_sqlite_store(&db_path)
                .expect("store attaches");

            let key = service
                .create_showcase(
                    &mut world,
                    overworld(),
                    pos,
                    mira(),
                    Material::new("emerald"),
                    None,
                )
                .expect("creation succeeds");
            service
                .modify_kind(&key, ShowcaseKind::Buy)
                .expect("kind change");
            service
                .modify_price(&key, TradeDirection::Buy, 450)
                .expect("price set");
            service
                .kernel_mut()
                .actor_inventory(&mira())
                .add(
                    &ItemKey {
                        material: Material::new("emerald"),
                        display_name: None,
                    },
                    8,
                )
                .expect("items seeded");
            service.stock_deposit(&key, &mira(), 8).expect("stocked");
            assert!(service.last_persistence_error().is_none());
        }

        let mut world = world_with_slab(&config, pos);
        let mut service = ShopService::from_kernel(ShowcaseWorld::new(config));
        service
            .attach_sqlite_store(&db_path)
            .expect("store reattaches");
        let adopted = service.load_worlds(&mut world).expect("load succeeds");
        assert_eq!(adopted, 1);

        let key = ShowcaseKey::new(overworld(), pos);
        let showcase = service.kernel().registry().lookup(&key).expect("adopted");
        assert_eq!(showcase.kind, ShowcaseKind::Buy);
        assert_eq!(showcase.buy_price, 450);
        assert_eq!(
            showcase.stock.as_ref().map(|s| s.total()),
            Some(8),
            "stock container restored"
        );
        // The reconcile task restarted and respawned the representative.
        assert_eq!(world.tagged_entities(&overworld(), pos).len(), 1);

        cleanup(&db_path);
    }

    #[test]
    fn destroy_removes_the_persisted_record() {
        let config = CoreConfig::default();
        let pos = BlockPos::new(0, 64, 9);
        let db_path = temp_db_path("destroy");

        let mut world = world_with_slab(&config, pos);
        let mut service = ShopService::from_kernel(ShowcaseWorld::new(config.clone()));
        service
            .attach_sqlite_store(&db_path)
            .expect("store attaches");

        let key = service
            .create_showcase(
                &mut world,
                overworld(),
                pos,
                mira(),
                Material::new("emerald"),
                None,
            )
            .expect("creation succeeds");
        service
            .destroy_showcase(&mut world, &key)
            .expect("destroy succeeds");

        let mut service = ShopService::from_kernel(ShowcaseWorld::new(config));
        service
            .attach_sqlite_store(&db_path)
            .expect("store reattaches");
        let adopted = service.load_worlds(&mut world).expect("load succeeds");
        assert_eq!(adopted, 0);

        cleanup(&db_path);
    }

    #[test]
    fn operations_without_a_store_stay_in_memory() {
        let config = CoreConfig::default();
        let pos = BlockPos::new(5, 64, 5);
        let mut world = world_with_slab(&config, pos);
        let mut service = ShopService::from_kernel(ShowcaseWorld::new(config));

        service
            .create_showcase(
                &mut world,
                overworld(),
                pos,
                mira(),
                Material::new("emerald"),
                None,
            )
            .expect("creation succeeds");
        assert!(!service.has_store());
        assert!(service.last_persistence_error().is_none());
        assert_eq!(service.kernel().registry().len(), 1);
    }
}
