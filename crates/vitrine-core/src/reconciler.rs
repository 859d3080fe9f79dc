//! Audit-and-repair of a showcase's representative entity against world
//! truth. One call is one reconciliation tick for one showcase.
//!
//! A tick never surfaces an error: anything inconsistent is corrected in
//! place and summarised in the returned [`TickOutcome`].

use contracts::{CoreConfig, Vec3};

use crate::showcase::{is_marker_label, Showcase};
use crate::world::{EntitySnapshot, WorldRuntime};

/// What one reconciliation tick did. Used by tests and debug logging;
/// user-facing flows never see it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// The showcase's captured region was unloaded; nothing was inspected.
    pub suspended: bool,
    pub surface_reset: bool,
    pub orphans_removed: u32,
    pub duplicates_removed: u32,
    pub respawned: bool,
    /// The remembered representative reference was stale and re-bound.
    pub rebound: bool,
    pub drift_corrected: bool,
}

impl TickOutcome {
    pub fn corrections(&self) -> u32 {
        u32::from(self.surface_reset)
            + self.orphans_removed
            + self.duplicates_removed
            + u32::from(self.respawned)
            + u32::from(self.drift_corrected)
    }

    /// True when the world already matched the invariant.
    pub fn is_clean(&self) -> bool {
        !self.suspended && self.corrections() == 0
    }
}

/// Run one reconciliation tick.
pub fn reconcile(
    showcase: &mut Showcase,
    world: &mut dyn WorldRuntime,
    config: &CoreConfig,
) -> TickOutcome {
    let mut outcome = TickOutcome::default();

    // Suspended while the captured region is out: every query below would
    // otherwise force it to load.
    if !world.is_region_loaded(&showcase.world, showcase.runtime.region) {
        outcome.suspended = true;
        return outcome;
    }

    // 1. The anchor must stay a legal surface even if terrain changed.
    let surface = world.block_material(&showcase.world, showcase.position);
    let surface_ok = surface
        .as_ref()
        .is_some_and(|material| config.is_valid_material(material));
    if !surface_ok {
        world.set_block_material(
            &showcase.world,
            showcase.position,
            config.default_material().clone(),
        );
        outcome.surface_reset = true;
    }

    // 2. Census of everything near the canonical spawn point.
    let spawn_point = showcase.spawn_point(config);
    let nearby = world.entities_near(&showcase.world, spawn_point, config.scan_radius);
    let mut candidates: Vec<EntitySnapshot> = Vec::new();
    for entity in nearby {
        match entity.tag {
            Some(tag) if tag == showcase.position => candidates.push(entity),
            // Another showcase's representative; its own tick handles it.
            Some(_) => {}
            None => {
                if is_marker_label(&entity.label) {
                    // Marker-labelled but untagged: leftover from a prior
                    // run whose metadata was lost. Always deleted.
                    world.remove_entity(&showcase.world, entity.id);
                    outcome.orphans_removed += 1;
                }
            }
        }
    }

    // 3. Tie-break duplicates: prefer the remembered representative, fall
    // back to the lowest id so the choice is deterministic.
    let remembered = showcase.runtime.display;
    let kept = candidates
        .iter()
        .find(|entity| Some(entity.id) == remembered)
        .or_else(|| candidates.first())
        .map(|entity| entity.id);
    if let Some(kept_id) = kept {
        for entity in &candidates {
            if entity.id != kept_id {
                world.remove_entity(&showcase.world, entity.id);
                outcome.duplicates_removed += 1;
            }
        }
        outcome.rebound = remembered != Some(kept_id);
        showcase.runtime.display = Some(kept_id);
    }

    // 4. Nothing of ours nearby: spawn a fresh representative, pinned to
    // the spawn point with zero velocity so physics cannot scatter it.
    if candidates.is_empty() {
        let id = world.spawn_item_entity(&showcase.world, spawn_point, &showcase.item);
        world.set_entity_tag(&showcase.world, id, showcase.position);
        world.set_entity_velocity(&showcase.world, id, Vec3::ZERO);
        showcase.runtime.display = Some(id);
        outcome.respawned = true;
    }

    // 5. Put a displaced representative back on its anchor.
    if let Some(id) = showcase.runtime.display {
        if let Some(entity) = world.entity(&showcase.world, id) {
            if drifted(entity.position, spawn_point, showcase.position.y, config) {
                world.teleport_entity(&showcase.world, id, spawn_point);
                outcome.drift_corrected = true;
            }
        }
    }

    if !outcome.is_clean() {
        log::debug!(
            "reconciled {}: surface_reset={} orphans={} duplicates={} respawned={} drift={}",
            showcase.key(),
            outcome.surface_reset,
            outcome.orphans_removed,
            outcome.duplicates_removed,
            outcome.respawned,
            outcome.drift_corrected,
        );
    }

    outcome
}

/// An item may settle up to one block below its spawn height (onto the
/// anchor's top face) without counting as drifted; anything outside that
/// band, or horizontally off-centre, gets teleported back.
fn drifted(at: Vec3, spawn: Vec3, anchor_y: i32, config: &CoreConfig) -> bool {
    let tolerance = config.drift_tolerance;
    if (at.x - spawn.x).abs() > tolerance || (at.z - spawn.z).abs() > tolerance {
        return true;
    }
    let rest_floor = f64::from(anchor_y) + 1.0;
    at.y < rest_floor - tolerance || at.y > spawn.y + tolerance
}
