//! In-memory catalog of active showcases; single source of truth for
//! "does a showcase exist here".

use std::collections::BTreeMap;
use std::fmt;

use contracts::{CoreConfig, Material};

use crate::showcase::{Showcase, ShowcaseKey};
use crate::world::WorldRuntime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    PositionOccupied(ShowcaseKey),
    UnknownShowcase(ShowcaseKey),
    /// The block at the target position is not a configured valid surface.
    InvalidSurface {
        key: ShowcaseKey,
        found: Option<Material>,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::PositionOccupied(key) => {
                write!(f, "a showcase already exists at {key}")
            }
            RegistryError::UnknownShowcase(key) => write!(f, "no showcase at {key}"),
            RegistryError::InvalidSurface { key, found } => match found {
                Some(material) => {
                    write!(f, "block {material} at {key} is not a valid showcase surface")
                }
                None => write!(f, "no block at {key} to anchor a showcase"),
            },
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Debug, Default)]
pub struct ShowcaseRegistry {
    showcases: BTreeMap<ShowcaseKey, Showcase>,
}

impl ShowcaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly placed showcase. Enforces position uniqueness and
    /// that the anchor block is one of the configured valid materials.
    pub fn place(
        &mut self,
        showcase: Showcase,
        world: &dyn WorldRuntime,
        config: &CoreConfig,
    ) -> Result<&mut Showcase, RegistryError> {
        let key = showcase.key();
        if self.showcases.contains_key(&key) {
            return Err(RegistryError::PositionOccupied(key));
        }

        let surface = world.block_material(&showcase.world, showcase.position);
        let valid = surface
            .as_ref()
            .is_some_and(|material| config.is_valid_material(material));
        if !valid {
            return Err(RegistryError::InvalidSurface {
                key,
                found: surface,
            });
        }

        Ok(self.showcases.entry(key).or_insert(showcase))
    }

    /// Register a showcase rebuilt from persistence. Uniqueness is still
    /// enforced; the surface is not checked, since the reconciler's first
    /// tick resets a damaged anchor anyway.
    pub fn adopt(&mut self, showcase: Showcase) -> Result<&mut Showcase, RegistryError> {
        let key = showcase.key();
        if self.showcases.contains_key(&key) {
            return Err(RegistryError::PositionOccupied(key));
        }
        Ok(self.showcases.entry(key).or_insert(showcase))
    }

    /// Remove and return a showcase. Removing an unknown key is an error
    /// result, never a fault, so double-removal stays harmless.
    pub fn remove(&mut self, key: &ShowcaseKey) -> Result<Showcase, RegistryError> {
        self.showcases
            .remove(key)
            .ok_or_else(|| RegistryError::UnknownShowcase(key.clone()))
    }

    pub fn lookup(&self, key: &ShowcaseKey) -> Option<&Showcase> {
        self.showcases.get(key)
    }

    pub fn lookup_mut(&mut self, key: &ShowcaseKey) -> Option<&mut Showcase> {
        self.showcases.get_mut(key)
    }

    pub fn contains(&self, key: &ShowcaseKey) -> bool {
        self.showcases.contains_key(key)
    }

    pub fn all(&self) -> impl Iterator<Item = &Showcase> {
        self.showcases.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ShowcaseKey> {
        self.showcases.keys()
    }

    pub fn len(&self) -> usize {
        self.showcases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.showcases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MemoryWorld;
    use contracts::{ActorId, BlockPos, ItemTemplate, RegionPos, WorldId};

    fn overworld() -> WorldId {
        WorldId::new("overworld")
    }

    fn showcase_at(pos: BlockPos) -> Showcase {
        Showcase::new(
            overworld(),
            pos,
            ActorId::new("mira"),
            ItemTemplate {
                material: Material::new("emerald"),
                display_name: None,
                marker: "vitrine:feed".to_string(),
            },
            RegionPos::containing(pos),
        )
    }

    fn world_with_slab_at(pos: BlockPos, config: &CoreConfig) -> MemoryWorld {
        let mut world = MemoryWorld::new();
        world.add_world(overworld());
        world.set_block(&overworld(), pos, config.default_material().clone());
        world
    }

    #[test]
    fn place_rejects_second_showcase_at_same_position() {
        let config = CoreConfig::default();
        let pos = BlockPos::new(0, 64, 0);
        let world = world_with_slab_at(pos, &config);
        let mut registry = ShowcaseRegistry::new();

        registry
            .place(showcase_at(pos), &world, &config)
            .expect("first placement");
        let err = registry
            .place(showcase_at(pos), &world, &config)
            .expect_err("occupied");
        assert!(matches!(err, RegistryError::PositionOccupied(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn place_rejects_invalid_surface() {
        let config = CoreConfig::default();
        let pos = BlockPos::new(0, 64, 0);
        let mut world = world_with_slab_at(pos, &config);
        world.set_block(&overworld(), pos, Material::new("dirt"));
        let mut registry = ShowcaseRegistry::new();

        let err = registry
            .place(showcase_at(pos), &world, &config)
            .expect_err("bad surface");
        assert!(matches!(err, RegistryError::InvalidSurface { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn place_rejects_missing_block() {
        let config = CoreConfig::default();
        let mut world = MemoryWorld::new();
        world.add_world(overworld());
        let mut registry = ShowcaseRegistry::new();

        let err = registry
            .place(showcase_at(BlockPos::new(3, 70, 3)), &world, &config)
            .expect_err("no block");
        assert!(matches!(
            err,
            RegistryError::InvalidSurface { found: None, .. }
        ));
    }

    #[test]
    fn remove_is_idempotent_safe() {
        let config = CoreConfig::default();
        let pos = BlockPos::new(0, 64, 0);
        let world = world_with_slab_at(pos, &config);
        let mut registry = ShowcaseRegistry::new();
        registry
            .place(showcase_at(pos), &world, &config)
            .expect("placement");

        let key = ShowcaseKey::new(overworld(), pos);
        registry.remove(&key).expect("first removal");
        let err = registry.remove(&key).expect_err("second removal");
        assert!(matches!(err, RegistryError::UnknownShowcase(_)));
    }

    #[test]
    fn adopt_skips_surface_validation() {
        let mut registry = ShowcaseRegistry::new();
        // No world consulted at all: the anchor may be damaged while a
        // record is loaded, and reconciliation repairs it later.
        registry
            .adopt(showcase_at(BlockPos::new(9, 64, 9)))
            .expect("adopted");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_finds_by_value_key() {
        let config = CoreConfig::default();
        let pos = BlockPos::new(5, 64, -2);
        let world = world_with_slab_at(pos, &config);
        let mut registry = ShowcaseRegistry::new();
        registry
            .place(showcase_at(pos), &world, &config)
            .expect("placement");

        let key = ShowcaseKey::new(overworld(), pos);
        assert!(registry.lookup(&key).is_some());
        assert!(registry
            .lookup(&ShowcaseKey::new(overworld(), BlockPos::new(5, 64, 2)))
            .is_none());
    }
}
