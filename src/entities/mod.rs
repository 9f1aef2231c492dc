//! sea-orm entities for the settlement schema.

pub mod cart;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod payment_settlement;
pub mod product;
pub mod user;

pub use order::PaymentMethod;
pub use user::UserRole;
