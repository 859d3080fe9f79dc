//! v1 cross-boundary contracts for the showcase kernel, store, and CLI.

use std::fmt;

use serde::{Deserialize, Serialize};

mod serde_u64_string;

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// World ticks per real-time second in the host runtime.
pub const TICKS_PER_SECOND: u64 = 20;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Name of a world (dimension) in the shared runtime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorldId(pub String);

impl WorldId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of an acting or owning party.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A block material name, e.g. `stone_slab`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Material(pub String);

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runtime-assigned identity of a spawned item entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Integer block coordinates. `(WorldId, BlockPos)` is the stable identity
/// key of a showcase; comparisons are always by value, never by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Point centred on the block in x/z, raised `height` above the block's
    /// base.
    pub fn centered_at_height(&self, height: f64) -> Vec3 {
        Vec3 {
            x: f64::from(self.x) + 0.5,
            y: f64::from(self.y) + height,
            z: f64::from(self.z) + 0.5,
        }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.x, self.y, self.z)
    }
}

/// Continuous world-space position or velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Coarse spatial unit (chunk) that loads and unloads independently.
/// 16x16 blocks on the horizontal plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub fn containing(pos: BlockPos) -> Self {
        Self {
            x: pos.x >> 4,
            z: pos.z >> 4,
        }
    }
}

impl fmt::Display for RegionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region:{},{}", self.x, self.z)
    }
}

// ---------------------------------------------------------------------------
// Showcase vocabulary
// ---------------------------------------------------------------------------

/// Which trade directions a showcase supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowcaseKind {
    Display,
    Buy,
    Sell,
    BuyAndSell,
}

impl ShowcaseKind {
    /// The showcase sells to actors (actors buy from it).
    pub fn buys(self) -> bool {
        matches!(self, ShowcaseKind::Buy | ShowcaseKind::BuyAndSell)
    }

    /// The showcase buys from actors (actors sell to it).
    pub fn sells(self) -> bool {
        matches!(self, ShowcaseKind::Sell | ShowcaseKind::BuyAndSell)
    }

    pub fn is_shop(self) -> bool {
        !matches!(self, ShowcaseKind::Display)
    }
}

impl fmt::Display for ShowcaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ShowcaseKind::Display => "display",
            ShowcaseKind::Buy => "buy",
            ShowcaseKind::Sell => "sell",
            ShowcaseKind::BuyAndSell => "buy_and_sell",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    Finite,
    Infinite,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StorageMode::Finite => "finite",
            StorageMode::Infinite => "infinite",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TradeDirection::Buy => "buy",
            TradeDirection::Sell => "sell",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Value identity of an item: two stacks merge if their keys are equal.
/// The marker string is deliberately excluded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub material: Material,
    pub display_name: Option<String>,
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{} ({})", name, self.material),
            None => self.material.fmt(f),
        }
    }
}

/// Immutable template of the single item a showcase represents.
///
/// `marker` is the generated unique string used to recognise the
/// representative entity in the world; it also serves as the entity's
/// display label so that leftovers from a prior run (tag metadata lost)
/// remain recognisable by naming convention alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub material: Material,
    pub display_name: Option<String>,
    pub marker: String,
}

impl ItemTemplate {
    pub fn key(&self) -> ItemKey {
        ItemKey {
            material: self.material.clone(),
            display_name: self.display_name.clone(),
        }
    }

    /// Human-facing name: the custom display name when present, the
    /// material name otherwise.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or_else(|| self.material.as_str())
    }
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// One stack-count line of a serialized stock container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub item: ItemKey,
    pub quantity: u64,
}

/// Serialized form of a bounded item container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub capacity: u64,
    pub entries: Vec<StockEntry>,
}

/// Shop-only section of a persisted showcase. Absent for plain displays.
/// `stock` is present only for finite storage; each price is present only
/// when the kind trades in that direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopRecord {
    pub storage: StorageMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<StockRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_price: Option<i64>,
}

/// Durable form of a showcase, keyed externally by `(world, x, y, z)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowcaseRecord {
    pub schema_version: String,
    pub kind: ShowcaseKind,
    pub owner: ActorId,
    pub item: ItemTemplate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop: Option<ShopRecord>,
}

// ---------------------------------------------------------------------------
// Settlement notices
// ---------------------------------------------------------------------------

/// Structured notification for the owner of a finite-storage shop after a
/// settlement touched their stock. Delivery is the command surface's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerNotice {
    pub owner: ActorId,
    pub actor: ActorId,
    pub item: ItemTemplate,
    pub amount: u32,
    pub direction: TradeDirection,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Core configuration. Loaded by the outer surface from a JSON file; every
/// field has a serviceable default so a missing file is only fatal when the
/// operator explicitly pointed at one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    pub schema_version: String,
    #[serde(with = "serde_u64_string")]
    pub seed: u64,
    /// Block materials a showcase may stand on. The first entry is the
    /// default a damaged anchor block is reset to.
    pub valid_materials: Vec<Material>,
    /// Reconciliation cadence per showcase, in world ticks.
    pub reconcile_period_ticks: u64,
    /// Half-extent of the axis-aligned box scanned for entities around the
    /// canonical spawn point.
    pub scan_radius: f64,
    /// Height above the anchor block's base at which the representative
    /// entity is spawned.
    pub display_height_offset: f64,
    /// Maximum horizontal distance the representative may sit from the
    /// canonical spawn point before it is teleported back.
    pub drift_tolerance: f64,
    /// Item capacity of a finite shop's stock container.
    pub stock_capacity: u64,
    /// Item capacity of an actor's personal inventory.
    pub actor_inventory_capacity: u64,
    /// Order expiry horizon carried in configuration data. No expiry is
    /// enforced by the trade engine; see DESIGN.md.
    pub order_timeout_ticks: u64,
}

impl CoreConfig {
    /// The material a broken anchor block is reset to.
    pub fn default_material(&self) -> &Material {
        &self.valid_materials[0]
    }

    pub fn is_valid_material(&self, material: &Material) -> bool {
        self.valid_materials.iter().any(|m| m == material)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            seed: 1337,
            valid_materials: vec![
                Material::new("stone_slab"),
                Material::new("smooth_stone_slab"),
                Material::new("oak_slab"),
            ],
            reconcile_period_ticks: 10 * TICKS_PER_SECOND,
            scan_radius: 5.0,
            display_height_offset: 1.5,
            drift_tolerance: 0.05,
            stock_capacity: 54 * 64,
            actor_inventory_capacity: 36 * 64,
            order_timeout_ticks: 60 * TICKS_PER_SECOND,
        }
    }
}
