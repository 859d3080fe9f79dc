//! Properties of the audit-and-repair loop: whatever the interference,
//! a loaded tick converges to exactly one correctly placed representative.

use contracts::{ActorId, BlockPos, CoreConfig, Material, Vec3, WorldId};
use proptest::prelude::*;
use vitrine_core::showcase::ShowcaseKey;
use vitrine_core::world::{MemoryWorld, WorldRuntime};
use vitrine_core::ShowcaseWorld;

fn overworld() -> WorldId {
    WorldId::new("overworld")
}

fn anchor() -> BlockPos {
    BlockPos::new(16, 64, -16)
}

fn fixture() -> (ShowcaseWorld, MemoryWorld, ShowcaseKey) {
    let config = CoreConfig::default();
    let mut world = MemoryWorld::new();
    world.add_world(overworld());
    world.set_block(&overworld(), anchor(), config.default_material().clone());

    let mut kernel = ShowcaseWorld::new(config);
    let key = kernel
        .place_showcase(
            &mut world,
            overworld(),
            anchor(),
            ActorId::new("mira"),
            Material::new("emerald"),
            None,
        )
        .expect("placement succeeds");
    (kernel, world, key)
}

fn run_one_period(kernel: &mut ShowcaseWorld, world: &mut MemoryWorld) {
    let period = kernel.config().reconcile_period_ticks;
    kernel.step(world, period);
}

fn representative_count(world: &MemoryWorld) -> usize {
    world.tagged_entities(&overworld(), anchor()).len()
}

#[test]
fn property_idempotent_reconciliation_without_interference() {
    let (mut kernel, mut world, key) = fixture();
    let spawn = kernel
        .registry()
        .lookup(&key)
        .expect("registered")
        .spawn_point(kernel.config());

    for _ in 0..4 {
        run_one_period(&mut kernel, &mut world);
        assert_eq!(representative_count(&world), 1);
        let id = world.tagged_entities(&overworld(), anchor())[0];
        let entity = world.entity(&overworld(), id).expect("entity exists");
        assert_eq!(entity.position, spawn);
    }
}

#[test]
fn property_respawn_after_external_deletion() {
    let (mut kernel, mut world, key) = fixture();
    let first = kernel
        .registry()
        .lookup(&key)
        .and_then(|s| s.runtime.display)
        .expect("display bound");

    // An anti-abuse sweep kills the entity between ticks.
    world.remove_entity(&overworld(), first);
    assert_eq!(representative_count(&world), 0);

    run_one_period(&mut kernel, &mut world);
    assert_eq!(representative_count(&world), 1);
    let id = world.tagged_entities(&overworld(), anchor())[0];
    let entity = world.entity(&overworld(), id).expect("entity exists");
    assert_eq!(entity.velocity, Vec3::ZERO);
    assert_ne!(id, first);
}

#[test]
fn property_unloaded_region_suspends_and_resumes() {
    let (mut kernel, mut world, key) = fixture();
    let region = kernel
        .registry()
        .lookup(&key)
        .expect("registered")
        .runtime
        .region;
    let display = kernel
        .registry()
        .lookup(&key)
        .and_then(|s| s.runtime.display)
        .expect("display bound");

    world.set_region_loaded(&overworld(), region, false);
    world.remove_entity(&overworld(), display);

    // Several suspended periods: each tick is a cheap no-op that re-arms.
    let metrics = {
        let period = kernel.config().reconcile_period_ticks;
        kernel.step(&mut world, period * 3)
    };
    assert_eq!(metrics.suspended_ticks, 3);
    assert_eq!(representative_count(&world), 0);

    world.set_region_loaded(&overworld(), region, true);
    run_one_period(&mut kernel, &mut world);
    assert_eq!(representative_count(&world), 1);
}

#[test]
fn property_removal_cancels_the_task_for_good() {
    let (mut kernel, mut world, key) = fixture();
    kernel
        .remove_showcase(&mut world, &key)
        .expect("removal succeeds");
    assert_eq!(world.entity_count(&overworld()), 0);

    for _ in 0..5 {
        run_one_period(&mut kernel, &mut world);
        assert_eq!(world.entity_count(&overworld()), 0);
    }
}

#[test]
fn property_surface_repair_restores_the_default_material() {
    let (mut kernel, mut world, _key) = fixture();
    world.set_block(&overworld(), anchor(), Material::new("gravel"));

    run_one_period(&mut kernel, &mut world);
    assert_eq!(
        world.block_material(&overworld(), anchor()),
        Some(kernel.config().default_material().clone())
    );
}

#[test]
fn property_generated_markers_are_unique_across_sequences() {
    use std::collections::BTreeSet;

    let world = overworld();
    let markers: BTreeSet<String> = (0..512)
        .map(|seq| vitrine_core::generate_marker(1337, &world, anchor(), seq))
        .collect();
    assert_eq!(markers.len(), 512);
    assert!(markers
        .iter()
        .all(|marker| vitrine_core::is_marker_label(marker)));
}

proptest! {
    /// However many impostors appear, whether or not the remembered entity
    /// survived, and wherever it drifted, one loaded tick restores exactly
    /// one representative at the canonical spawn point.
    #[test]
    fn property_one_tick_restores_exactly_one_representative(
        impostors in 0_u32..6,
        kill_remembered in any::<bool>(),
        drift in -3.0_f64..3.0,
    ) {
        let (mut kernel, mut world, key) = fixture();
        let showcase_spawn = kernel
            .registry()
            .lookup(&key)
            .expect("registered")
            .spawn_point(kernel.config());
        let remembered = kernel
            .registry()
            .lookup(&key)
            .and_then(|s| s.runtime.display)
            .expect("display bound");
        let marker = kernel
            .registry()
            .lookup(&key)
            .map(|s| s.item.marker.clone())
            .expect("marker known");

        for _ in 0..impostors {
            world.spawn_raw_entity(&overworld(), showcase_spawn, marker.clone(), Some(anchor()));
        }
        if kill_remembered {
            world.remove_entity(&overworld(), remembered);
        } else if drift.abs() > 0.0 {
            world.teleport_entity(
                &overworld(),
                remembered,
                Vec3::new(showcase_spawn.x + drift, showcase_spawn.y, showcase_spawn.z),
            );
        }

        run_one_period(&mut kernel, &mut world);

        let survivors = world.tagged_entities(&overworld(), anchor());
        prop_assert_eq!(survivors.len(), 1);
        let entity = world
            .entity(&overworld(), survivors[0])
            .expect("entity exists");
        // Either teleported home or already inside tolerance of it.
        let tolerance = kernel.config().drift_tolerance;
        prop_assert!((entity.position.x - showcase_spawn.x).abs() <= tolerance);
        prop_assert!((entity.position.z - showcase_spawn.z).abs() <= tolerance);

        // And the fixpoint holds: a second tick changes nothing.
        run_one_period(&mut kernel, &mut world);
        prop_assert_eq!(world.tagged_entities(&overworld(), anchor()).len(), 1);
    }

    /// The remembered representative always wins the dedup tie-break.
    #[test]
    fn property_dedup_retains_the_remembered_entity(impostors in 1_u32..8) {
        let (mut kernel, mut world, key) = fixture();
        let remembered = kernel
            .registry()
            .lookup(&key)
            .and_then(|s| s.runtime.display)
            .expect("display bound");
        let spawn = kernel
            .registry()
            .lookup(&key)
            .expect("registered")
            .spawn_point(kernel.config());
        let marker = kernel
            .registry()
            .lookup(&key)
            .map(|s| s.item.marker.clone())
            .expect("marker known");

        for _ in 0..impostors {
            world.spawn_raw_entity(&overworld(), spawn, marker.clone(), Some(anchor()));
        }

        run_one_period(&mut kernel, &mut world);
        prop_assert_eq!(
            world.tagged_entities(&overworld(), anchor()),
            vec![remembered]
        );
    }
}
