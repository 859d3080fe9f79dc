use std::env;
use std::process;

use contracts::{ActorId, BlockPos, CoreConfig, Material, ShowcaseKind, StorageMode, TradeDirection, WorldId};
use vitrine_core::economy::MemoryEconomy;
use vitrine_core::showcase::ShowcaseKey;
use vitrine_core::world::{MemoryWorld, WorldRuntime};
use vitrine_core::ShowcaseWorld;
use vitrine_store::ShopService;

fn print_usage() {
    println!("vitrine-cli <command>");
    println!("commands:");
    println!("  status [--db <sqlite>]");
    println!("  create <world> <x> <y> <z> <material> --actor <name> [--db <sqlite>]");
    println!("  destroy <world> <x> <y> <z> --actor <name> [--admin] [--db <sqlite>]");
    println!("  modify <world> <x> <y> <z> <flag> <value> --actor <name> [--admin] [--db <sqlite>]");
    println!("    flags: kind [display|buy|sell|buy_and_sell]");
    println!("           storage [finite|infinite]");
    println!("           buy_price <n> / sell_price <n>");
    println!("  storage <world> <x> <y> <z> [deposit|withdraw] <n> --actor <name> [--admin] [--db <sqlite>]");
    println!("  order <world> <x> <y> <z> [buy|sell] [amount] --actor <name>");
    println!("        [--funds <n>] [--owner-funds <n>] [--held <n>] [--db <sqlite>]");
    println!("  demo [ticks]");
    println!("common: [--config <json>] loads core configuration; the harness");
    println!("world anchors adopted showcases itself, so only live entities");
    println!("and balances are simulated per invocation.");
}

// -- argv helpers ------------------------------------------------------------

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| arg == flag)
}

fn required_actor(args: &[String]) -> Result<ActorId, String> {
    flag_value(args, "--actor")
        .map(ActorId::new)
        .ok_or_else(|| "missing --actor <name>".to_string())
}

fn parse_i32(value: Option<&String>, label: &str) -> Result<i32, String> {
    let raw = value.ok_or_else(|| format!("missing {label}"))?;
    raw.parse::<i32>()
        .map_err(|_| format!("invalid {label}: {raw}"))
}

fn parse_i64(raw: &str, label: &str) -> Result<i64, String> {
    raw.parse::<i64>()
        .map_err(|_| format!("invalid {label}: {raw}"))
}

fn parse_position(args: &[String], from: usize) -> Result<(WorldId, BlockPos), String> {
    let world = args
        .get(from)
        .cloned()
        .ok_or_else(|| "missing world".to_string())?;
    let x = parse_i32(args.get(from + 1), "x")?;
    let y = parse_i32(args.get(from + 2), "y")?;
    let z = parse_i32(args.get(from + 3), "z")?;
    Ok((WorldId::new(world), BlockPos::new(x, y, z)))
}

fn load_config(args: &[String]) -> Result<CoreConfig, String> {
    match flag_value(args, "--config") {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|err| format!("failed to read config {path}: {err}"))?;
            serde_json::from_str(&raw).map_err(|err| format!("invalid config {path}: {err}"))
        }
        None => Ok(CoreConfig::default()),
    }
}

// -- session -----------------------------------------------------------------

struct Session {
    config: CoreConfig,
    service: ShopService,
    world: MemoryWorld,
}

/// Build the per-invocation harness: kernel, optional sqlite store, and an
/// in-memory world that the reconciler re-anchors from persisted records.
fn open_session(args: &[String]) -> Result<Session, String> {
    let config = load_config(args)?;
    let mut service = ShopService::from_kernel(ShowcaseWorld::new(config.clone()));
    if let Some(db) = flag_value(args, "--db") {
        service
            .attach_sqlite_store(&db)
            .map_err(|err| format!("failed to open store {db}: {err}"))?;
    }
    let mut world = MemoryWorld::new();
    service
        .load_worlds(&mut world)
        .map_err(|err| format!("failed to load showcases: {err}"))?;
    Ok(Session {
        config,
        service,
        world,
    })
}

/// Resolve a live showcase or print the invalid-location message. A miss is
/// a handled user error, not a CLI failure.
fn lookup_key(session: &Session, world_id: &WorldId, pos: BlockPos) -> Option<ShowcaseKey> {
    let key = ShowcaseKey::new(world_id.clone(), pos);
    if session.service.kernel().registry().contains(&key) {
        Some(key)
    } else {
        println!("no showcase at {key}");
        None
    }
}

/// Ownership gate shared by destroy/modify/storage: the acting party must
/// own the showcase unless --admin overrides.
fn check_owner(session: &Session, key: &ShowcaseKey, actor: &ActorId, admin: bool) -> Result<(), String> {
    let owner = session
        .service
        .kernel()
        .registry()
        .lookup(key)
        .map(|showcase| showcase.owner.clone())
        .ok_or_else(|| format!("no showcase at {key}"))?;
    if owner != *actor && !admin {
        return Err(format!("{actor} does not own the showcase at {key}"));
    }
    Ok(())
}

// -- commands ----------------------------------------------------------------

fn cmd_status(args: &[String]) -> Result<(), String> {
    let session = open_session(args)?;
    let registry = session.service.kernel().registry();
    if registry.is_empty() {
        println!("no showcases");
        return Ok(());
    }
    for showcase in registry.all() {
        let prices = match (showcase.kind.buys(), showcase.kind.sells()) {
            (true, true) => format!(" buy={} sell={}", showcase.buy_price, showcase.sell_price),
            (true, false) => format!(" buy={}", showcase.buy_price),
            (false, true) => format!(" sell={}", showcase.sell_price),
            (false, false) => String::new(),
        };
        let stock = showcase
            .stock
            .as_ref()
            .map(|stock| format!(" stock={}", stock.total()))
            .unwrap_or_default();
        println!(
            "{} kind={} storage={} owner={} item={}{}{}",
            showcase.key(),
            showcase.kind,
            showcase.storage,
            showcase.owner,
            showcase.item.label(),
            prices,
            stock,
        );
    }
    Ok(())
}

fn cmd_create(args: &[String]) -> Result<(), String> {
    let (world_id, pos) = parse_position(args, 2)?;
    let material = args
        .get(6)
        .cloned()
        .ok_or_else(|| "missing material".to_string())?;
    let actor = required_actor(args)?;

    let mut session = open_session(args)?;
    // The harness provides a valid anchor at the target position.
    session.world.set_block(
        &world_id,
        pos,
        session.config.default_material().clone(),
    );

    match session.service.create_showcase(
        &mut session.world,
        world_id,
        pos,
        actor,
        Material::new(material),
        None,
    ) {
        Ok(key) => println!("created showcase {key}"),
        Err(err) => println!("cannot create: {err}"),
    }
    report_persistence(&session);
    Ok(())
}

fn cmd_destroy(args: &[String]) -> Result<(), String> {
    let (world_id, pos) = parse_position(args, 2)?;
    let actor = required_actor(args)?;
    let admin = has_flag(args, "--admin");

    let mut session = open_session(args)?;
    let Some(key) = lookup_key(&session, &world_id, pos) else {
        return Ok(());
    };
    if let Err(message) = check_owner(&session, &key, &actor, admin) {
        println!("{message}");
        return Ok(());
    }

    match session.service.destroy_showcase(&mut session.world, &key) {
        Ok(()) => println!("destroyed showcase {key}"),
        Err(err) => println!("cannot destroy: {err}"),
    }
    report_persistence(&session);
    Ok(())
}

fn cmd_modify(args: &[String]) -> Result<(), String> {
    let (world_id, pos) = parse_position(args, 2)?;
    let flag = args
        .get(6)
        .cloned()
        .ok_or_else(|| "missing modify flag".to_string())?;
    let value = args
        .get(7)
        .cloned()
        .ok_or_else(|| "missing modify value".to_string())?;
    let actor = required_actor(args)?;
    let admin = has_flag(args, "--admin");

    let mut session = open_session(args)?;
    let Some(key) = lookup_key(&session, &world_id, pos) else {
        return Ok(());
    };
    if let Err(message) = check_owner(&session, &key, &actor, admin) {
        println!("{message}");
        return Ok(());
    }

    let result = match flag.as_str() {
        "kind" => {
            let kind = match value.as_str() {
                "display" => ShowcaseKind::Display,
                "buy" => ShowcaseKind::Buy,
                "sell" => ShowcaseKind::Sell,
                "buy_and_sell" => ShowcaseKind::BuyAndSell,
                other => return Err(format!("invalid kind: {other}")),
            };
            session.service.modify_kind(&key, kind)
        }
        "storage" => {
            let storage = match value.as_str() {
                "finite" => StorageMode::Finite,
                "infinite" => StorageMode::Infinite,
                other => return Err(format!("invalid storage mode: {other}")),
            };
            session.service.modify_storage(&key, storage)
        }
        "buy_price" => {
            let price = parse_i64(&value, "buy_price")?;
            session
                .service
                .modify_price(&key, TradeDirection::Buy, price)
        }
        "sell_price" => {
            let price = parse_i64(&value, "sell_price")?;
            session
                .service
                .modify_price(&key, TradeDirection::Sell, price)
        }
        other => return Err(format!("unknown modify flag: {other}")),
    };

    match result {
        Ok(()) => println!("modified showcase {key}"),
        Err(err) => println!("cannot modify: {err}"),
    }
    report_persistence(&session);
    Ok(())
}

fn cmd_storage(args: &[String]) -> Result<(), String> {
    let (world_id, pos) = parse_position(args, 2)?;
    let operation = args
        .get(6)
        .cloned()
        .ok_or_else(|| "missing storage operation".to_string())?;
    let amount = args
        .get(7)
        .map(|raw| parse_i64(raw, "amount"))
        .transpose()?
        .ok_or_else(|| "missing amount".to_string())?;
    if amount < 1 {
        return Err(format!("invalid amount: {amount}"));
    }
    let actor = required_actor(args)?;
    let admin = has_flag(args, "--admin");

    let mut session = open_session(args)?;
    let Some(key) = lookup_key(&session, &world_id, pos) else {
        return Ok(());
    };
    if let Err(message) = check_owner(&session, &key, &actor, admin) {
        println!("{message}");
        return Ok(());
    }

    // Harness affordance: seed the acting party's held items for deposits.
    if let Some(held) = flag_value(args, "--held") {
        let held = parse_i64(&held, "--held")?.max(0) as u64;
        seed_held_items(&mut session, &key, &actor, held);
    }

    let result = match operation.as_str() {
        "deposit" => session.service.stock_deposit(&key, &actor, amount as u64),
        "withdraw" => session.service.stock_withdraw(&key, &actor, amount as u64),
        other => return Err(format!("unknown storage operation: {other}")),
    };

    match result {
        Ok(()) => println!("storage updated at {key}"),
        Err(err) => println!("cannot update storage: {err}"),
    }
    report_persistence(&session);
    Ok(())
}

fn cmd_order(args: &[String]) -> Result<(), String> {
    let (world_id, pos) = parse_position(args, 2)?;
    let direction = match args.get(6).map(String::as_str) {
        Some("buy") => TradeDirection::Buy,
        Some("sell") => TradeDirection::Sell,
        Some(other) => return Err(format!("unknown order direction: {other}")),
        None => return Err("missing order direction".to_string()),
    };
    let amount = args
        .get(7)
        .map(|raw| parse_i64(raw, "amount"))
        .transpose()?;
    let actor = required_actor(args)?;

    let mut session = open_session(args)?;
    let Some(key) = lookup_key(&session, &world_id, pos) else {
        return Ok(());
    };

    // Per-invocation ledger: balances exist only for this order.
    let owner = session
        .service
        .kernel()
        .registry()
        .lookup(&key)
        .map(|showcase| showcase.owner.clone())
        .ok_or_else(|| format!("no showcase at {key}"))?;
    let funds = flag_value(args, "--funds")
        .map(|raw| parse_i64(&raw, "--funds"))
        .transpose()?
        .unwrap_or(0);
    let owner_funds = flag_value(args, "--owner-funds")
        .map(|raw| parse_i64(&raw, "--owner-funds"))
        .transpose()?
        .unwrap_or(0);
    let mut economy = MemoryEconomy::default();
    economy.open_account(actor.clone(), world_id.clone(), funds.max(0));
    economy.open_account(owner, world_id.clone(), owner_funds.max(0));
    session.service.kernel_mut().attach_economy(Box::new(economy));

    if let Some(held) = flag_value(args, "--held") {
        let held = parse_i64(&held, "--held")?.max(0) as u64;
        seed_held_items(&mut session, &key, &actor, held);
    }

    let summary = match session.service.open_order(actor.clone(), &key) {
        Ok(summary) => summary,
        Err(err) => {
            println!("cannot order: {err}");
            return Ok(());
        }
    };
    println!("---------- order ----------");
    println!("item: {}", summary.item.label());
    if let Some(price) = summary.buy_price {
        println!("buy price: {price}");
    }
    if let Some(price) = summary.sell_price {
        println!("sell price: {price}");
    }

    if let Some(amount) = amount {
        match session.service.set_order_amount(&actor, amount) {
            Ok(set) => println!("amount: {set}"),
            Err(err) => {
                println!("cannot order: {err}");
                return Ok(());
            }
        }
    }

    let settled = match direction {
        TradeDirection::Buy => session.service.settle_buy(&session.world, &actor),
        TradeDirection::Sell => session.service.settle_sell(&session.world, &actor),
    };
    match settled {
        Ok(receipt) => {
            println!(
                "settled {} x{} for {}",
                receipt.item.label(),
                receipt.amount,
                receipt.total
            );
            if let Some(notice) = receipt.owner_notice {
                println!(
                    "owner {} notified: {} {} x{}",
                    notice.owner, notice.direction, notice.item.label(), notice.amount
                );
            }
        }
        Err(err) => println!("trade failed: {err}"),
    }
    report_persistence(&session);
    Ok(())
}

fn seed_held_items(session: &mut Session, key: &ShowcaseKey, actor: &ActorId, held: u64) {
    let item = session
        .service
        .kernel()
        .registry()
        .lookup(key)
        .map(|showcase| showcase.item.key());
    if let Some(item) = item {
        if let Err(err) = session
            .service
            .kernel_mut()
            .actor_inventory(actor)
            .add(&item, held)
        {
            println!("could not seed held items: {err}");
        }
    }
}

fn report_persistence(session: &Session) {
    if let Some(error) = session.service.last_persistence_error() {
        println!("warning: persistence degraded, memory is authoritative: {error}");
    }
}

// -- demo --------------------------------------------------------------------

/// A scripted session on the in-memory world: place a shop, let hostile
/// forces interfere, and show the reconciler and trade engine holding the
/// line.
fn cmd_demo(args: &[String]) -> Result<(), String> {
    let ticks = args
        .get(2)
        .map(|raw| parse_i64(raw, "ticks"))
        .transpose()?
        .unwrap_or(1_200)
        .max(1) as u64;

    let config = CoreConfig::default();
    let world_id = WorldId::new("overworld");
    let pos = BlockPos::new(12, 64, -5);
    let owner = ActorId::new("mira");
    let customer = ActorId::new("oren");

    let mut world = MemoryWorld::new();
    world.add_world(world_id.clone());
    world.set_block(&world_id, pos, config.default_material().clone());
    world.set_actor_reachable(owner.clone(), true);

    let mut kernel = ShowcaseWorld::new(config);
    let mut economy = MemoryEconomy::new("crown", "crowns");
    economy.open_account(owner.clone(), world_id.clone(), 0);
    economy.open_account(customer.clone(), world_id.clone(), 10_000);
    kernel.attach_economy(Box::new(economy));
    let mut service = ShopService::from_kernel(kernel);

    let key = service
        .create_showcase(
            &mut world,
            world_id.clone(),
            pos,
            owner.clone(),
            Material::new("emerald"),
            None,
        )
        .map_err(|err| format!("demo setup failed: {err}"))?;
    service
        .modify_kind(&key, ShowcaseKind::BuyAndSell)
        .map_err(|err| format!("demo setup failed: {err}"))?;
    service
        .modify_price(&key, TradeDirection::Buy, 500)
        .map_err(|err| format!("demo setup failed: {err}"))?;
    service
        .modify_price(&key, TradeDirection::Sell, 300)
        .map_err(|err| format!("demo setup failed: {err}"))?;

    let item = service
        .kernel()
        .registry()
        .lookup(&key)
        .map(|showcase| showcase.item.key())
        .ok_or_else(|| "demo setup failed: showcase missing".to_string())?;
    service
        .kernel_mut()
        .actor_inventory(&owner)
        .add(&item, 32)
        .map_err(|err| format!("demo setup failed: {err}"))?;
    service
        .stock_deposit(&key, &owner, 32)
        .map_err(|err| format!("demo setup failed: {err}"))?;
    println!("placed shop {key} with stock 32, buy 500, sell 300");

    // Hostile interference: the representative is killed, impostors appear,
    // and a leftover from a lost run sits nearby.
    let display = service
        .kernel()
        .registry()
        .lookup(&key)
        .and_then(|showcase| showcase.runtime.display)
        .ok_or_else(|| "demo setup failed: no display entity".to_string())?;
    let spawn = pos.centered_at_height(1.5);
    world.remove_entity(&world_id, display);
    world.spawn_raw_entity(&world_id, spawn, "vitrine:0123456789abcdef", None);
    println!("interference: display killed, stale leftover dropped");

    let metrics = service.step(&mut world, ticks);
    println!(
        "ran {} tick(s): {} reconcile task(s), {} correction(s)",
        metrics.ticks_advanced, metrics.tasks_run, metrics.corrections
    );
    println!(
        "representatives at {}: {}",
        key,
        world.tagged_entities(&world_id, pos).len()
    );

    // A customer buys six, then sells two back.
    service
        .open_order(customer.clone(), &key)
        .map_err(|err| format!("demo order failed: {err}"))?;
    service
        .set_order_amount(&customer, 6)
        .map_err(|err| format!("demo order failed: {err}"))?;
    let receipt = service
        .settle_buy(&world, &customer)
        .map_err(|err| format!("demo buy failed: {err}"))?;
    println!(
        "{} bought {} x{} for {}",
        customer,
        receipt.item.label(),
        receipt.amount,
        receipt.total
    );
    if let Some(notice) = receipt.owner_notice {
        println!("owner notice: {} {} x{}", notice.actor, notice.direction, notice.amount);
    }

    service
        .open_order(customer.clone(), &key)
        .map_err(|err| format!("demo order failed: {err}"))?;
    service
        .set_order_amount(&customer, 2)
        .map_err(|err| format!("demo order failed: {err}"))?;
    let receipt = service
        .settle_sell(&world, &customer)
        .map_err(|err| format!("demo sell failed: {err}"))?;
    println!(
        "{} sold {} x{} for {}",
        customer,
        receipt.item.label(),
        receipt.amount,
        receipt.total
    );

    let stock = service
        .kernel()
        .registry()
        .lookup(&key)
        .and_then(|showcase| showcase.stock.as_ref())
        .map(|stock| stock.total())
        .unwrap_or(0);
    println!("final stock: {stock}");
    if let Some(economy) = service.kernel().economy() {
        let owner_balance = economy.balance(&owner, &world_id).unwrap_or(0);
        let customer_balance = economy.balance(&customer, &world_id).unwrap_or(0);
        println!(
            "balances: {}={} {}={}",
            owner,
            economy.format(owner_balance),
            customer,
            economy.format(customer_balance)
        );
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    let result = match command {
        Some("status") => cmd_status(&args),
        Some("create") => cmd_create(&args),
        Some("destroy") => cmd_destroy(&args),
        Some("modify") => cmd_modify(&args),
        Some("storage") => cmd_storage(&args),
        Some("order") => cmd_order(&args),
        Some("demo") => cmd_demo(&args),
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(err) = result {
        log::error!("{err}");
        eprintln!("error: {err}");
        print_usage();
        process::exit(2);
    }
}
