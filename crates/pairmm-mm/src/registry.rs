//! Resting-order registry.
//!
//! Mirrors the strategy's own live ladder orders on the tradeable instrument.
//! Each side owns its orders in an id-keyed map; a price-ordered index holds
//! only ids, one order per price level. Every removal goes through
//! [`SideRegistry::remove`] so both views always describe the same set.

use std::collections::{BTreeMap, HashMap};

use pairmm_core::{OrderId, Price, Side, Volume};
use pairmm_telemetry::Metrics;
use thiserror::Error;
use tracing::warn;

/// Registry lookup and update failures. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{side} order {existing} already rests at {price}")]
    PriceOccupied {
        side: Side,
        price: Price,
        existing: OrderId,
    },

    #[error("order {0} is already registered")]
    DuplicateOrder(OrderId),

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("{side} price index entry at {price} has no matching order")]
    DanglingPrice { side: Side, price: Price },

    #[error("{side} order {order_id} is missing from the price index")]
    Unindexed { side: Side, order_id: OrderId },
}

/// A resting ladder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    /// Remaining volume.
    pub volume: Volume,
    /// A cancel has been sent and not yet confirmed.
    pub cancel_requested: bool,
}

/// Live orders on one side of the book.
#[derive(Debug)]
pub struct SideRegistry {
    side: Side,
    orders: HashMap<OrderId, Order>,
    by_price: BTreeMap<Price, OrderId>,
}

impl SideRegistry {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            orders: HashMap::new(),
            by_price: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Register a new order. Fails if the price level or id is taken.
    pub fn insert(
        &mut self,
        order_id: OrderId,
        price: Price,
        volume: Volume,
    ) -> Result<(), RegistryError> {
        if let Some(&existing) = self.by_price.get(&price) {
            return Err(RegistryError::PriceOccupied {
                side: self.side,
                price,
                existing,
            });
        }
        if self.orders.contains_key(&order_id) {
            return Err(RegistryError::DuplicateOrder(order_id));
        }

        self.by_price.insert(price, order_id);
        self.orders.insert(
            order_id,
            Order {
                order_id,
                side: self.side,
                price,
                volume,
                cancel_requested: false,
            },
        );
        Ok(())
    }

    /// Remove an order from every view.
    pub fn remove(&mut self, order_id: OrderId) -> Result<Order, RegistryError> {
        let order = self
            .orders
            .remove(&order_id)
            .ok_or(RegistryError::UnknownOrder(order_id))?;

        match self.by_price.get(&order.price) {
            Some(&indexed) if indexed == order_id => {
                self.by_price.remove(&order.price);
            }
            other => {
                warn!(
                    side = %self.side,
                    order_id = %order_id,
                    price = %order.price,
                    indexed = ?other,
                    "Removed order was not indexed at its price"
                );
                Metrics::registry_fault("unindexed");
            }
        }
        Ok(order)
    }

    /// Set remaining volume after a partial fill or amend.
    pub fn adjust_volume(&mut self, order_id: OrderId, volume: Volume) -> Result<(), RegistryError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(RegistryError::UnknownOrder(order_id))?;
        order.volume = volume;
        Ok(())
    }

    /// Flag an order as having a cancel in flight.
    ///
    /// Returns `false` if the flag was already set.
    pub fn mark_cancel_requested(&mut self, order_id: OrderId) -> Result<bool, RegistryError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(RegistryError::UnknownOrder(order_id))?;
        let newly = !order.cancel_requested;
        order.cancel_requested = true;
        Ok(newly)
    }

    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.orders.contains_key(&order_id)
    }

    /// Order resting at `price`.
    pub fn order_at(&self, price: Price) -> Result<Option<&Order>, RegistryError> {
        match self.by_price.get(&price) {
            None => Ok(None),
            Some(id) => self.orders.get(id).map(Some).ok_or(RegistryError::DanglingPrice {
                side: self.side,
                price,
            }),
        }
    }

    /// True if any order (including one with a cancel in flight) rests at `price`.
    pub fn is_occupied(&self, price: Price) -> bool {
        self.by_price.contains_key(&price)
    }

    /// Highest buy or lowest sell.
    pub fn best_price(&self) -> Option<Price> {
        match self.side {
            Side::Buy => self.by_price.keys().next_back().copied(),
            Side::Sell => self.by_price.keys().next().copied(),
        }
    }

    /// Orders in ascending price order.
    ///
    /// Skips index entries without an owning order; `check_consistency`
    /// reports those.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Order> + '_ {
        self.by_price.values().filter_map(|id| self.orders.get(id))
    }

    /// Orders nearest the market first.
    pub fn best_first(&self) -> Vec<&Order> {
        match self.side {
            Side::Buy => self.iter().rev().collect(),
            Side::Sell => self.iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Remaining volume of every order, pending cancels included.
    pub fn total_volume(&self) -> Volume {
        self.orders
            .values()
            .fold(Volume::ZERO, |acc, order| acc + order.volume)
    }

    /// Verify both views describe the same order set.
    pub fn check_consistency(&self) -> Result<(), RegistryError> {
        for (&price, id) in &self.by_price {
            match self.orders.get(id) {
                Some(order) if order.price == price => {}
                _ => {
                    return Err(RegistryError::DanglingPrice {
                        side: self.side,
                        price,
                    })
                }
            }
        }
        for (&order_id, order) in &self.orders {
            if self.by_price.get(&order.price) != Some(&order_id) {
                return Err(RegistryError::Unindexed {
                    side: self.side,
                    order_id,
                });
            }
        }
        Ok(())
    }

    /// Bring the price index back in line with the owned orders.
    ///
    /// Drops index entries that do not point at an order resting at that
    /// price, then indexes orders that are missing. An unindexed order whose
    /// price is taken by another order is dropped. Returns the number of
    /// fixes applied.
    pub fn repair(&mut self) -> usize {
        let mut fixes = 0;

        let orders = &self.orders;
        let before = self.by_price.len();
        self.by_price
            .retain(|price, id| orders.get(id).is_some_and(|o| o.price == *price));
        fixes += before - self.by_price.len();

        let unindexed: Vec<OrderId> = self
            .orders
            .values()
            .filter(|o| self.by_price.get(&o.price) != Some(&o.order_id))
            .map(|o| o.order_id)
            .collect();

        for order_id in unindexed {
            fixes += 1;
            let Some(price) = self.orders.get(&order_id).map(|o| o.price) else {
                continue;
            };
            if self.by_price.contains_key(&price) {
                warn!(side = %self.side, order_id = %order_id, price = %price,
                    "Dropping order shadowed at its price level");
                self.orders.remove(&order_id);
            } else {
                self.by_price.insert(price, order_id);
            }
        }

        if fixes > 0 {
            warn!(side = %self.side, fixes, "Registry repaired");
            Metrics::registry_fault("repaired");
        }
        fixes
    }

    #[cfg(test)]
    fn corrupt_index(&mut self, price: Price, order_id: OrderId) {
        self.by_price.insert(price, order_id);
    }
}

/// Both sides of the strategy's resting orders.
#[derive(Debug)]
pub struct OrderRegistry {
    pub bids: SideRegistry,
    pub asks: SideRegistry,
}

impl Default for OrderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderRegistry {
    pub fn new() -> Self {
        Self {
            bids: SideRegistry::new(Side::Buy),
            asks: SideRegistry::new(Side::Sell),
        }
    }

    pub fn side(&self, side: Side) -> &SideRegistry {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut SideRegistry {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    pub fn insert(
        &mut self,
        side: Side,
        order_id: OrderId,
        price: Price,
        volume: Volume,
    ) -> Result<(), RegistryError> {
        self.side_mut(side).insert(order_id, price, volume)
    }

    /// Which side holds `order_id`, if any.
    pub fn side_of(&self, order_id: OrderId) -> Option<Side> {
        if self.bids.contains(order_id) {
            Some(Side::Buy)
        } else if self.asks.contains(order_id) {
            Some(Side::Sell)
        } else {
            None
        }
    }

    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.bids.get(order_id).or_else(|| self.asks.get(order_id))
    }

    pub fn remove_by_order_id(&mut self, order_id: OrderId) -> Result<Order, RegistryError> {
        let side = self
            .side_of(order_id)
            .ok_or(RegistryError::UnknownOrder(order_id))?;
        self.side_mut(side).remove(order_id)
    }

    pub fn adjust_volume(&mut self, order_id: OrderId, volume: Volume) -> Result<(), RegistryError> {
        let side = self
            .side_of(order_id)
            .ok_or(RegistryError::UnknownOrder(order_id))?;
        self.side_mut(side).adjust_volume(order_id, volume)
    }

    pub fn best_price(&self, side: Side) -> Option<Price> {
        self.side(side).best_price()
    }

    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn check_consistency(&self) -> Result<(), RegistryError> {
        self.bids.check_consistency()?;
        self.asks.check_consistency()
    }

    pub fn repair(&mut self) -> usize {
        self.bids.repair() + self.asks.repair()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> OrderId {
        OrderId::new(raw).unwrap()
    }

    fn p(v: u64) -> Price {
        Price::new(v)
    }

    #[test]
    fn test_insert_rejects_occupied_price() {
        let mut reg = OrderRegistry::new();
        reg.insert(Side::Buy, id(1), p(9_900), Volume::new(10)).unwrap();

        let err = reg
            .insert(Side::Buy, id(2), p(9_900), Volume::new(10))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::PriceOccupied {
                side: Side::Buy,
                price: p(9_900),
                existing: id(1)
            }
        );
        // Same price on the other side is independent.
        reg.insert(Side::Sell, id(2), p(9_900), Volume::new(10)).unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_best_price_and_best_first() {
        let mut reg = OrderRegistry::new();
        for (i, price) in [9_700, 9_900, 9_800].into_iter().enumerate() {
            reg.insert(Side::Buy, id(i as u64 + 1), p(price), Volume::new(10))
                .unwrap();
        }
        for (i, price) in [10_400, 10_200, 10_300].into_iter().enumerate() {
            reg.insert(Side::Sell, id(i as u64 + 10), p(price), Volume::new(10))
                .unwrap();
        }

        assert_eq!(reg.best_price(Side::Buy), Some(p(9_900)));
        assert_eq!(reg.best_price(Side::Sell), Some(p(10_200)));

        let bid_prices: Vec<Price> = reg.bids.best_first().iter().map(|o| o.price).collect();
        assert_eq!(bid_prices, vec![p(9_900), p(9_800), p(9_700)]);
        let ask_prices: Vec<Price> = reg.asks.best_first().iter().map(|o| o.price).collect();
        assert_eq!(ask_prices, vec![p(10_200), p(10_300), p(10_400)]);
    }

    #[test]
    fn test_remove_unknown_is_typed_miss() {
        let mut reg = OrderRegistry::new();
        assert_eq!(
            reg.remove_by_order_id(id(42)),
            Err(RegistryError::UnknownOrder(id(42)))
        );
        assert_eq!(
            reg.adjust_volume(id(42), Volume::new(1)),
            Err(RegistryError::UnknownOrder(id(42)))
        );
    }

    #[test]
    fn test_views_stay_consistent_through_lifecycle() {
        let mut reg = OrderRegistry::new();
        reg.insert(Side::Buy, id(1), p(9_900), Volume::new(10)).unwrap();
        reg.insert(Side::Buy, id(2), p(9_800), Volume::new(10)).unwrap();
        reg.insert(Side::Sell, id(3), p(10_200), Volume::new(10)).unwrap();
        assert!(reg.check_consistency().is_ok());

        reg.adjust_volume(id(1), Volume::new(4)).unwrap();
        assert_eq!(reg.get(id(1)).unwrap().volume, Volume::new(4));
        assert!(reg.check_consistency().is_ok());

        assert!(reg.bids.mark_cancel_requested(id(2)).unwrap());
        assert!(!reg.bids.mark_cancel_requested(id(2)).unwrap());

        let removed = reg.remove_by_order_id(id(2)).unwrap();
        assert_eq!(removed.price, p(9_800));
        assert!(!reg.bids.is_occupied(p(9_800)));
        reg.remove_by_order_id(id(3)).unwrap();
        assert!(reg.check_consistency().is_ok());

        // The freed level can be reused.
        reg.insert(Side::Buy, id(4), p(9_800), Volume::new(10)).unwrap();
        assert_eq!(reg.bids.total_volume(), Volume::new(14));
        assert!(reg.check_consistency().is_ok());
    }

    #[test]
    fn test_dangling_index_detected_and_repaired() {
        let mut side = SideRegistry::new(Side::Buy);
        side.insert(id(1), p(9_900), Volume::new(10)).unwrap();
        side.corrupt_index(p(9_800), id(99));

        assert_eq!(
            side.check_consistency(),
            Err(RegistryError::DanglingPrice {
                side: Side::Buy,
                price: p(9_800)
            })
        );
        assert_eq!(
            side.order_at(p(9_800)),
            Err(RegistryError::DanglingPrice {
                side: Side::Buy,
                price: p(9_800)
            })
        );
        // Iteration never yields the dangling entry.
        assert_eq!(side.iter().count(), 1);

        assert_eq!(side.repair(), 1);
        assert!(side.check_consistency().is_ok());
        assert_eq!(side.order_at(p(9_800)), Ok(None));
        assert_eq!(side.order_at(p(9_900)).unwrap().map(|o| o.order_id), Some(id(1)));
    }

    #[test]
    fn test_repair_reindexes_orphaned_order() {
        let mut side = SideRegistry::new(Side::Sell);
        side.insert(id(1), p(10_200), Volume::new(10)).unwrap();
        // Point the level at another id: order 1 becomes unindexed.
        side.corrupt_index(p(10_200), id(7));
        assert!(side.check_consistency().is_err());

        assert_eq!(side.repair(), 2);
        assert!(side.check_consistency().is_ok());
        assert!(side.is_occupied(p(10_200)));
        assert_eq!(side.best_price(), Some(p(10_200)));
    }
}
