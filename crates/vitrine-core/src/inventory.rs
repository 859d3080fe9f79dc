//! Bounded item containers: shop stock and actor possessions.

use std::collections::BTreeMap;
use std::fmt;

use contracts::{ItemKey, StockEntry, StockRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Not enough free capacity for the requested deposit.
    Full { requested: u64, free: u64 },
    /// Not enough of the item on hand for the requested withdrawal.
    Short { requested: u64, available: u64 },
}

impl fmt::Display for InventoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryError::Full { requested, free } => {
                write!(f, "container full: requested {requested}, free {free}")
            }
            InventoryError::Short {
                requested,
                available,
            } => {
                write!(
                    f,
                    "not enough items: requested {requested}, available {available}"
                )
            }
        }
    }
}

impl std::error::Error for InventoryError {}

/// A bounded multiset of items. Quantities are tracked per [`ItemKey`];
/// the capacity bounds the total quantity across all keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    capacity: u64,
    quantities: BTreeMap<ItemKey, u64>,
}

impl Inventory {
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            capacity,
            quantities: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn count(&self, item: &ItemKey) -> u64 {
        self.quantities.get(item).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.quantities.values().sum()
    }

    pub fn free_space(&self) -> u64 {
        self.capacity.saturating_sub(self.total())
    }

    pub fn can_fit(&self, quantity: u64) -> bool {
        quantity <= self.free_space()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn add(&mut self, item: &ItemKey, quantity: u64) -> Result<(), InventoryError> {
        let free = self.free_space();
        if quantity > free {
            return Err(InventoryError::Full {
                requested: quantity,
                free,
            });
        }
        *self.quantities.entry(item.clone()).or_insert(0) += quantity;
        Ok(())
    }

    pub fn take(&mut self, item: &ItemKey, quantity: u64) -> Result<(), InventoryError> {
        let available = self.count(item);
        if quantity > available {
            return Err(InventoryError::Short {
                requested: quantity,
                available,
            });
        }
        let remaining = available - quantity;
        if remaining == 0 {
            self.quantities.remove(item);
        } else {
            self.quantities.insert(item.clone(), remaining);
        }
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ItemKey, u64)> {
        self.quantities.iter().map(|(key, qty)| (key, *qty))
    }

    pub fn to_record(&self) -> StockRecord {
        StockRecord {
            capacity: self.capacity,
            entries: self
                .quantities
                .iter()
                .map(|(item, quantity)| StockEntry {
                    item: item.clone(),
                    quantity: *quantity,
                })
                .collect(),
        }
    }

    /// Rebuild from a persisted record. Entries beyond capacity are clamped
    /// rather than rejected: a shrunk capacity in config must not make old
    /// saves unloadable.
    pub fn from_record(record: &StockRecord) -> Self {
        let mut inventory = Self::with_capacity(record.capacity);
        for entry in &record.entries {
            let free = inventory.free_space();
            let quantity = entry.quantity.min(free);
            if quantity > 0 {
                *inventory.quantities.entry(entry.item.clone()).or_insert(0) += quantity;
            }
        }
        inventory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Material;

    fn iron() -> ItemKey {
        ItemKey {
            material: Material::new("iron_ingot"),
            display_name: None,
        }
    }

    fn coal() -> ItemKey {
        ItemKey {
            material: Material::new("coal"),
            display_name: None,
        }
    }

    #[test]
    fn add_and_take_round_trip() {
        let mut inv = Inventory::with_capacity(10);
        inv.add(&iron(), 6).expect("add fits");
        assert_eq!(inv.count(&iron()), 6);
        inv.take(&iron(), 4).expect("take available");
        assert_eq!(inv.count(&iron()), 2);
        assert_eq!(inv.total(), 2);
    }

    #[test]
    fn add_rejects_overflow_without_mutation() {
        let mut inv = Inventory::with_capacity(5);
        inv.add(&iron(), 3).expect("add fits");
        let err = inv.add(&coal(), 3).expect_err("overflow");
        assert_eq!(
            err,
            InventoryError::Full {
                requested: 3,
                free: 2
            }
        );
        assert_eq!(inv.count(&coal()), 0);
        assert_eq!(inv.total(), 3);
    }

    #[test]
    fn take_rejects_shortfall_without_mutation() {
        let mut inv = Inventory::with_capacity(5);
        inv.add(&iron(), 2).expect("add fits");
        let err = inv.take(&iron(), 3).expect_err("shortfall");
        assert_eq!(
            err,
            InventoryError::Short {
                requested: 3,
                available: 2
            }
        );
        assert_eq!(inv.count(&iron()), 2);
    }

    #[test]
    fn take_to_zero_drops_the_entry() {
        let mut inv = Inventory::with_capacity(5);
        inv.add(&iron(), 2).expect("add fits");
        inv.take(&iron(), 2).expect("take all");
        assert!(inv.is_empty());
        assert_eq!(inv.entries().count(), 0);
    }

    #[test]
    fn record_round_trip() {
        let mut inv = Inventory::with_capacity(64);
        inv.add(&iron(), 40).expect("add fits");
        inv.add(&coal(), 8).expect("add fits");
        let rebuilt = Inventory::from_record(&inv.to_record());
        assert_eq!(rebuilt, inv);
    }

    #[test]
    fn from_record_clamps_to_capacity() {
        let record = StockRecord {
            capacity: 10,
            entries: vec![
                StockEntry {
                    item: iron(),
                    quantity: 8,
                },
                StockEntry {
                    item: coal(),
                    quantity: 8,
                },
            ],
        };
        let inv = Inventory::from_record(&record);
        assert_eq!(inv.count(&iron()), 8);
        assert_eq!(inv.count(&coal()), 2);
        assert_eq!(inv.total(), 10);
    }
}
