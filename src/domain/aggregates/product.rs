//! Product Aggregate
//!
//! Only the slice of the catalog that checkout needs: the live sell price and
//! the stock level.

use serde::Serialize;

use crate::domain::value_objects::Quantity;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub sell_price: i64,
    pub quantity: i32,
}

impl Product {
    pub fn new(id: i64, name: impl Into<String>, sell_price: i64, quantity: i32) -> Self {
        Self { id, name: name.into(), sell_price, quantity }
    }

    pub fn has_stock_for(&self, qty: Quantity) -> bool { self.quantity >= qty.value() }

    pub fn remove_inventory(&mut self, qty: Quantity) -> Result<(), ProductError> {
        if !self.has_stock_for(qty) {
            return Err(ProductError::InsufficientInventory { requested: qty.value(), available: self.quantity });
        }
        self.quantity -= qty.value();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductError { InsufficientInventory { requested: i32, available: i32 } }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientInventory { requested, available } => write!(f, "Insufficient inventory: requested {requested}, available {available}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_inventory() {
        let mut p = Product::new(1, "Kettle", 300_000, 10);
        p.remove_inventory(Quantity::new(4).unwrap()).unwrap();
        assert_eq!(p.quantity, 6);
        assert!(p.remove_inventory(Quantity::new(7).unwrap()).is_err());
        assert_eq!(p.quantity, 6);
    }
}
