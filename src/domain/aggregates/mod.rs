//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod user;

pub use product::{Product, ProductError};
pub use order::{NewOrder, NewOrderLine, Order, OrderError, OrderLine, OrderStatus, PaymentLinkRecord, PaymentMethod, PaymentOutcome, PaymentStatus};
pub use cart::CartLine;
pub use user::CurrentUser;
