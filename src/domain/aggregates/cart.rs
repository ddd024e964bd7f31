//! Cart lines and checkout pricing

use serde::Serialize;

use crate::domain::aggregates::order::NewOrderLine;
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::Quantity;
use crate::EcommerceError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i32,
}

impl CartLine {
    pub fn new(product_id: i64, quantity: i32) -> Self { Self { product_id, quantity } }

    /// Prices the line from the live product record, never from any cached
    /// cart price, and checks that the product can cover it.
    pub fn price(&self, product: &Product) -> Result<NewOrderLine, EcommerceError> {
        let qty = Quantity::new(self.quantity).map_err(|e| EcommerceError::Validation(format!("product {}: {e}", self.product_id)))?;
        if !product.has_stock_for(qty) {
            return Err(EcommerceError::InsufficientStock { product: product.name.clone() });
        }
        let line_total = qty.line_total(product.sell_price)
            .ok_or_else(|| EcommerceError::Validation(format!("line total for product {} overflows", product.id)))?;
        Ok(NewOrderLine {
            product_id: product.id, product_name: product.name.clone(),
            unit_price: product.sell_price, quantity: qty.value(), line_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_price_uses_live_product_price() {
        let product = Product::new(9, "Lamp", 120_000, 5);
        let line = CartLine::new(9, 2).price(&product).unwrap();
        assert_eq!(line.unit_price, 120_000);
        assert_eq!(line.line_total, 240_000);
    }

    #[test]
    fn test_price_rejects_short_stock_and_bad_quantity() {
        let product = Product::new(9, "Lamp", 120_000, 1);
        assert_matches!(CartLine::new(9, 2).price(&product), Err(EcommerceError::InsufficientStock { product }) if product == "Lamp");
        assert_matches!(CartLine::new(9, 0).price(&product), Err(EcommerceError::Validation(_)));
    }
}
