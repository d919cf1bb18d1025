pub mod audit_logs;
pub mod customers;
pub mod order_items;
pub mod orders;
pub mod product_images;
pub mod products;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use customers::Entity as Customers;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_images::Entity as ProductImages;
pub use products::Entity as Products;
pub use users::Entity as Users;
