pub use super::orders::Entity as Orders;
pub use super::products::Entity as Products;
pub use super::sales::Entity as Sales;
