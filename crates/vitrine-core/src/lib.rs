//! Self-healing showcase kernel: a registry of position-bound display
//! cases, the reconciliation loop that keeps their representative entities
//! alive against a hostile world, and the trade engine that settles orders
//! across stock and currency.

pub mod economy;
pub mod inventory;
pub mod kernel;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod showcase;
pub mod trade;
pub mod world;

pub use economy::{EconomyError, EconomyGateway, MemoryEconomy};
pub use inventory::{Inventory, InventoryError};
pub use kernel::{ModifyError, ShowcaseWorld, StepMetrics, StorageError};
pub use reconciler::{reconcile, TickOutcome};
pub use registry::{RegistryError, ShowcaseRegistry};
pub use scheduler::{ReconcileScheduler, TaskHandle};
pub use showcase::{generate_marker, is_marker_label, Showcase, ShowcaseKey, MARKER_PREFIX};
pub use trade::{Order, OrderBook, OrderState, OrderSummary, SettlementReceipt, TradeError};
pub use world::{EntitySnapshot, MemoryWorld, WorldRuntime};
