//! World-runtime interface and an in-memory implementation.
//!
//! The kernel never subscribes to runtime events: everything it needs is
//! sampled through this interface at tick time, so any host that can answer
//! these queries can drive the kernel.

use std::collections::{BTreeMap, BTreeSet};

use contracts::{ActorId, BlockPos, EntityId, ItemTemplate, Material, RegionPos, Vec3, WorldId};

/// Point-in-time view of one item entity, as seen by a census scan.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub id: EntityId,
    /// Display label; representative entities carry their marker here.
    pub label: String,
    /// Showcase-position metadata, if this entity was tagged by us.
    pub tag: Option<BlockPos>,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// The mutable shared world, as far as the showcase kernel is concerned.
///
/// Implementations are expected to answer from current state; the kernel
/// re-samples every tick instead of listening for load/unload events.
pub trait WorldRuntime {
    fn is_region_loaded(&self, world: &WorldId, region: RegionPos) -> bool;

    /// Material of the block at `pos`, or `None` for empty/unknown space.
    fn block_material(&self, world: &WorldId, pos: BlockPos) -> Option<Material>;

    fn set_block_material(&mut self, world: &WorldId, pos: BlockPos, material: Material);

    /// Drop an item entity into the world. The runtime may hand it an
    /// arbitrary initial velocity, exactly like a thrown item; callers that
    /// need it stationary must zero the velocity afterwards.
    fn spawn_item_entity(&mut self, world: &WorldId, at: Vec3, item: &ItemTemplate) -> EntityId;

    /// Remove an entity. Returns false if it was already gone.
    fn remove_entity(&mut self, world: &WorldId, id: EntityId) -> bool;

    fn entity(&self, world: &WorldId, id: EntityId) -> Option<EntitySnapshot>;

    fn set_entity_tag(&mut self, world: &WorldId, id: EntityId, tag: BlockPos);

    fn set_entity_velocity(&mut self, world: &WorldId, id: EntityId, velocity: Vec3);

    fn teleport_entity(&mut self, world: &WorldId, id: EntityId, to: Vec3);

    /// All entities within an axis-aligned box of half-extent `radius`
    /// around `center`, in deterministic id order.
    fn entities_near(&self, world: &WorldId, center: Vec3, radius: f64) -> Vec<EntitySnapshot>;

    /// Whether the actor can currently receive a notice.
    fn is_actor_reachable(&self, actor: &ActorId) -> bool;
}

// ---------------------------------------------------------------------------
// In-memory world
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredEntity {
    label: String,
    tag: Option<BlockPos>,
    position: Vec3,
    velocity: Vec3,
}

#[derive(Debug, Clone, Default)]
struct WorldState {
    blocks: BTreeMap<BlockPos, Material>,
    entities: BTreeMap<EntityId, StoredEntity>,
    /// Regions default to loaded; this set holds the exceptions.
    unloaded: BTreeSet<RegionPos>,
}

/// Deterministic in-memory [`WorldRuntime`], used by the kernel tests and
/// the CLI demo. Spawned items receive a small id-derived scatter velocity
/// to mirror how a real runtime tosses dropped items.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorld {
    worlds: BTreeMap<WorldId, WorldState>,
    reachable: BTreeSet<ActorId>,
    next_entity: u64,
}

fn scatter_component(id: u64, stream: u64) -> f64 {
    let mut value = id ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    value ^= value.rotate_left(23);
    value = value.wrapping_mul(0x517C_C1B7_2722_0A95);
    ((value % 21) as f64 - 10.0) / 100.0
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_world(&mut self, world: WorldId) {
        self.worlds.entry(world).or_default();
    }

    pub fn set_block(&mut self, world: &WorldId, pos: BlockPos, material: Material) {
        self.worlds
            .entry(world.clone())
            .or_default()
            .blocks
            .insert(pos, material);
    }

    pub fn set_region_loaded(&mut self, world: &WorldId, region: RegionPos, loaded: bool) {
        let state = self.worlds.entry(world.clone()).or_default();
        if loaded {
            state.unloaded.remove(&region);
        } else {
            state.unloaded.insert(region);
        }
    }

    pub fn set_actor_reachable(&mut self, actor: ActorId, reachable: bool) {
        if reachable {
            self.reachable.insert(actor);
        } else {
            self.reachable.remove(&actor);
        }
    }

    /// Drop an arbitrary labelled entity, bypassing the item-template path.
    /// Test hook for modelling third-party interference and stale leftovers.
    pub fn spawn_raw_entity(
        &mut self,
        world: &WorldId,
        at: Vec3,
        label: impl Into<String>,
        tag: Option<BlockPos>,
    ) -> EntityId {
        let id = self.allocate_entity_id();
        self.worlds.entry(world.clone()).or_default().entities.insert(
            id,
            StoredEntity {
                label: label.into(),
                tag,
                position: at,
                velocity: Vec3::ZERO,
            },
        );
        id
    }

    pub fn entity_count(&self, world: &WorldId) -> usize {
        self.worlds
            .get(world)
            .map(|state| state.entities.len())
            .unwrap_or(0)
    }

    /// Ids of entities tagged for the given showcase position.
    pub fn tagged_entities(&self, world: &WorldId, pos: BlockPos) -> Vec<EntityId> {
        self.worlds
            .get(world)
            .map(|state| {
                state
                    .entities
                    .iter()
                    .filter(|(_, entity)| entity.tag == Some(pos))
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn allocate_entity_id(&mut self) -> EntityId {
        self.next_entity += 1;
        EntityId(self.next_entity)
    }

    fn snapshot(id: EntityId, entity: &StoredEntity) -> EntitySnapshot {
        EntitySnapshot {
            id,
            label: entity.label.clone(),
            tag: entity.tag,
            position: entity.position,
            velocity: entity.velocity,
        }
    }
}

impl WorldRuntime for MemoryWorld {
    fn is_region_loaded(&self, world: &WorldId, region: RegionPos) -> bool {
        match self.worlds.get(world) {
            Some(state) => !state.unloaded.contains(&region),
            None => false,
        }
    }

    fn block_material(&self, world: &WorldId, pos: BlockPos) -> Option<Material> {
        self.worlds
            .get(world)
            .and_then(|state| state.blocks.get(&pos).cloned())
    }

    fn set_block_material(&mut self, world: &WorldId, pos: BlockPos, material: Material) {
        self.set_block(world, pos, material);
    }

    fn spawn_item_entity(&mut self, world: &WorldId, at: Vec3, item: &ItemTemplate) -> EntityId {
        let id = self.allocate_entity_id();
        let velocity = Vec3::new(
            scatter_component(id.0, 1),
            scatter_component(id.0, 2).abs(),
            scatter_component(id.0, 3),
        );
        self.worlds.entry(world.clone()).or_default().entities.insert(
            id,
            StoredEntity {
                label: item.marker.clone(),
                tag: None,
                position: at,
                velocity,
            },
        );
        id
    }

    fn remove_entity(&mut self, world: &WorldId, id: EntityId) -> bool {
        self.worlds
            .get_mut(world)
            .map(|state| state.entities.remove(&id).is_some())
            .unwrap_or(false)
    }

    fn entity(&self, world: &WorldId, id: EntityId) -> Option<EntitySnapshot> {
        self.worlds
            .get(world)
            .and_then(|state| state.entities.get(&id))
            .map(|entity| Self::snapshot(id, entity))
    }

    fn set_entity_tag(&mut self, world: &WorldId, id: EntityId, tag: BlockPos) {
        if let Some(entity) = self
            .worlds
            .get_mut(world)
            .and_then(|state| state.entities.get_mut(&id))
        {
            entity.tag = Some(tag);
        }
    }

    fn set_entity_velocity(&mut self, world: &WorldId, id: EntityId, velocity: Vec3) {
        if let Some(entity) = self
            .worlds
            .get_mut(world)
            .and_then(|state| state.entities.get_mut(&id))
        {
            entity.velocity = velocity;
        }
    }

    fn teleport_entity(&mut self, world: &WorldId, id: EntityId, to: Vec3) {
        if let Some(entity) = self
            .worlds
            .get_mut(world)
            .and_then(|state| state.entities.get_mut(&id))
        {
            entity.position = to;
        }
    }

    fn entities_near(&self, world: &WorldId, center: Vec3, radius: f64) -> Vec<EntitySnapshot> {
        let Some(state) = self.worlds.get(world) else {
            return Vec::new();
        };
        state
            .entities
            .iter()
            .filter(|(_, entity)| {
                (entity.position.x - center.x).abs() <= radius
                    && (entity.position.y - center.y).abs() <= radius
                    && (entity.position.z - center.z).abs() <= radius
            })
            .map(|(id, entity)| Self::snapshot(*id, entity))
            .collect()
    }

    fn is_actor_reachable(&self, actor: &ActorId) -> bool {
        self.reachable.contains(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overworld() -> WorldId {
        WorldId::new("overworld")
    }

    fn apple() -> ItemTemplate {
        ItemTemplate {
            material: Material::new("golden_apple"),
            display_name: None,
            marker: "vitrine:00ff".to_string(),
        }
    }

    #[test]
    fn regions_default_to_loaded_until_unloaded() {
        let mut world = MemoryWorld::new();
        world.add_world(overworld());
        let region = RegionPos { x: 0, z: 0 };
        assert!(world.is_region_loaded(&overworld(), region));
        world.set_region_loaded(&overworld(), region, false);
        assert!(!world.is_region_loaded(&overworld(), region));
        world.set_region_loaded(&overworld(), region, true);
        assert!(world.is_region_loaded(&overworld(), region));
    }

    #[test]
    fn unknown_world_is_never_loaded() {
        let world = MemoryWorld::new();
        assert!(!world.is_region_loaded(&overworld(), RegionPos { x: 0, z: 0 }));
    }

    #[test]
    fn spawned_items_carry_scatter_velocity() {
        let mut world = MemoryWorld::new();
        world.add_world(overworld());
        let id = world.spawn_item_entity(&overworld(), Vec3::new(0.5, 65.5, 0.5), &apple());
        let snapshot = world.entity(&overworld(), id).expect("entity exists");
        assert_eq!(snapshot.label, "vitrine:00ff");
        assert_eq!(snapshot.tag, None);
        world.set_entity_velocity(&overworld(), id, Vec3::ZERO);
        let snapshot = world.entity(&overworld(), id).expect("entity exists");
        assert_eq!(snapshot.velocity, Vec3::ZERO);
    }

    #[test]
    fn census_box_is_axis_aligned() {
        let mut world = MemoryWorld::new();
        world.add_world(overworld());
        let center = Vec3::new(0.5, 65.5, 0.5);
        let near = world.spawn_raw_entity(&overworld(), Vec3::new(4.0, 65.5, 0.5), "a", None);
        let far = world.spawn_raw_entity(&overworld(), Vec3::new(6.5, 65.5, 0.5), "b", None);
        let found = world.entities_near(&overworld(), center, 5.0);
        let ids: Vec<EntityId> = found.iter().map(|e| e.id).collect();
        assert!(ids.contains(&near));
        assert!(!ids.contains(&far));
    }

    #[test]
    fn remove_entity_reports_prior_existence() {
        let mut world = MemoryWorld::new();
        world.add_world(overworld());
        let id = world.spawn_raw_entity(&overworld(), Vec3::ZERO, "x", None);
        assert!(world.remove_entity(&overworld(), id));
        assert!(!world.remove_entity(&overworld(), id));
    }
}
