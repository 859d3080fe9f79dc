//! The showcase record: durable trade/display state plus runtime bindings.

use std::fmt;

use contracts::{
    ActorId, BlockPos, CoreConfig, EntityId, ItemTemplate, RegionPos, ShopRecord, ShowcaseKind,
    ShowcaseRecord, StorageMode, TradeDirection, Vec3, WorldId, SCHEMA_VERSION_V1,
};

use crate::inventory::Inventory;
use crate::scheduler::TaskHandle;

/// Namespace prefix of generated markers. An entity whose label is
/// `<prefix>:<token>` is treated as ours even when its tag metadata has
/// been lost.
pub const MARKER_PREFIX: &str = "vitrine";

/// Whether a display label follows the generated-marker naming convention.
pub fn is_marker_label(label: &str) -> bool {
    let mut parts = label.split(':');
    let namespace = parts.next();
    let token = parts.next();
    namespace == Some(MARKER_PREFIX) && token.is_some_and(|t| !t.is_empty()) && parts.next().is_none()
}

fn mix(value: u64, salt: u64) -> u64 {
    let mut mixed = value ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    mixed ^= mixed.rotate_left(29);
    mixed = mixed.wrapping_mul(0x517C_C1B7_2722_0A95);
    mixed ^ (mixed >> 31)
}

/// Generate the unique marker for a new showcase. Seeded hash mixing over
/// the identity key and an allocation sequence keeps markers unique per
/// showcase and stable across replays of the same session.
pub fn generate_marker(seed: u64, world: &WorldId, pos: BlockPos, sequence: u64) -> String {
    let mut hash = mix(seed, sequence);
    for byte in world.as_str().bytes() {
        hash = hash.rotate_left(7) ^ u64::from(byte);
        hash = hash.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    }
    hash = mix(hash, pos.x as u64 ^ ((pos.y as u64) << 20) ^ ((pos.z as u64) << 40));
    format!("{MARKER_PREFIX}:{hash:016x}")
}

/// Stable identity key of a showcase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShowcaseKey {
    pub world: WorldId,
    pub position: BlockPos,
}

impl ShowcaseKey {
    pub fn new(world: WorldId, position: BlockPos) -> Self {
        Self { world, position }
    }
}

impl fmt::Display for ShowcaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.world, self.position)
    }
}

/// Volatile bindings of a showcase. Never persisted.
#[derive(Debug, Clone)]
pub struct ShowcaseRuntime {
    /// The representative entity currently believed to be ours.
    pub display: Option<EntityId>,
    /// Region captured once at creation. Deriving it lazily from the
    /// position would load the region on every query and it would always
    /// appear loaded.
    pub region: RegionPos,
    /// Handle of the recurring reconcile task.
    pub task: Option<TaskHandle>,
}

#[derive(Debug, Clone)]
pub struct Showcase {
    pub world: WorldId,
    pub position: BlockPos,
    pub owner: ActorId,
    pub kind: ShowcaseKind,
    pub item: ItemTemplate,
    pub storage: StorageMode,
    /// Present only for finite-storage shops.
    pub stock: Option<Inventory>,
    pub buy_price: i64,
    pub sell_price: i64,
    pub runtime: ShowcaseRuntime,
}

impl Showcase {
    /// A fresh plain display: finite storage, no stock allocated until it
    /// becomes a shop, prices at zero.
    pub fn new(
        world: WorldId,
        position: BlockPos,
        owner: ActorId,
        item: ItemTemplate,
        region: RegionPos,
    ) -> Self {
        Self {
            world,
            position,
            owner,
            kind: ShowcaseKind::Display,
            item,
            storage: StorageMode::Finite,
            stock: None,
            buy_price: 0,
            sell_price: 0,
            runtime: ShowcaseRuntime {
                display: None,
                region,
                task: None,
            },
        }
    }

    pub fn key(&self) -> ShowcaseKey {
        ShowcaseKey::new(self.world.clone(), self.position)
    }

    /// Canonical point the representative entity should rest at: block
    /// centre, raised by the configured display height.
    pub fn spawn_point(&self, config: &CoreConfig) -> Vec3 {
        self.position.centered_at_height(config.display_height_offset)
    }

    pub fn price_for(&self, direction: TradeDirection) -> i64 {
        match direction {
            TradeDirection::Buy => self.buy_price,
            TradeDirection::Sell => self.sell_price,
        }
    }

    pub fn is_finite_shop(&self) -> bool {
        self.kind.is_shop() && self.storage == StorageMode::Finite
    }

    pub fn to_record(&self) -> ShowcaseRecord {
        let shop = if self.kind.is_shop() {
            Some(ShopRecord {
                storage: self.storage,
                stock: self.stock.as_ref().map(Inventory::to_record),
                buy_price: self.kind.buys().then_some(self.buy_price),
                sell_price: self.kind.sells().then_some(self.sell_price),
            })
        } else {
            None
        };

        ShowcaseRecord {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            kind: self.kind,
            owner: self.owner.clone(),
            item: self.item.clone(),
            shop,
        }
    }

    /// Rebuild from a persisted record. A finite shop whose record carries
    /// no stock (old or hand-edited saves) gets an empty container at the
    /// configured capacity.
    pub fn from_record(
        world: WorldId,
        position: BlockPos,
        record: &ShowcaseRecord,
        config: &CoreConfig,
    ) -> Self {
        let region = RegionPos::containing(position);
        let mut showcase = Self::new(world, position, record.owner.clone(), record.item.clone(), region);
        showcase.kind = record.kind;

        if let Some(shop) = &record.shop {
            showcase.storage = shop.storage;
            showcase.buy_price = shop.buy_price.unwrap_or(0);
            showcase.sell_price = shop.sell_price.unwrap_or(0);
            if shop.storage == StorageMode::Finite {
                showcase.stock = Some(match &shop.stock {
                    Some(stock) => Inventory::from_record(stock),
                    None => Inventory::with_capacity(config.stock_capacity),
                });
            }
        }

        showcase
    }
}
