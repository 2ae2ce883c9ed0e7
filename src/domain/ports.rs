use uuid::Uuid;

use super::catalog::{CategoryView, ProductView};
use super::errors::DomainError;
use super::order::{ListResult, OrderView, RemoveOutcome};

/// Read access to the product catalog.
pub trait CatalogRepository: Send + Sync + 'static {
    fn list_categories(&self) -> Result<Vec<CategoryView>, DomainError>;
    fn list_active_products(&self) -> Result<Vec<ProductView>, DomainError>;
    fn find_active_product(&self, id: Uuid) -> Result<Option<ProductView>, DomainError>;
}

/// Carts, checkout and order reads. Every cart operation addresses the
/// single open cart of `user_id`, creating it on first use.
pub trait OrderRepository: Send + Sync + 'static {
    fn get_or_create_cart(&self, user_id: Uuid) -> Result<OrderView, DomainError>;
    fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<OrderView, DomainError>;
    fn set_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<OrderView, DomainError>;
    fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<RemoveOutcome, DomainError>;
    fn checkout(&self, user_id: Uuid, shipping_address: &str) -> Result<OrderView, DomainError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError>;
    fn list(&self, owner: Option<Uuid>, page: i64, limit: i64)
        -> Result<ListResult, DomainError>;
}
