use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{ListResult, OrderView, RemoveOutcome};
use crate::domain::ports::OrderRepository;
use crate::domain::principal::Principal;

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Input validation and ownership rules in front of an [`OrderRepository`].
/// Nothing reaches storage until the request is known to be well formed.
pub struct OrderService<R> {
    repo: R,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn my_cart(&self, principal: &Principal) -> Result<OrderView, DomainError> {
        self.repo.get_or_create_cart(principal.user_id)
    }

    pub fn add_item(
        &self,
        principal: &Principal,
        product_id: Option<Uuid>,
        quantity: i32,
    ) -> Result<OrderView, DomainError> {
        let product_id = match product_id {
            Some(id) if quantity > 0 => id,
            _ => {
                return Err(DomainError::Validation(
                    "product_id and quantity (> 0) are required.".to_string(),
                ))
            }
        };
        self.repo.add_item(principal.user_id, product_id, quantity)
    }

    /// A quantity of zero or less removes the line.
    pub fn set_item(
        &self,
        principal: &Principal,
        product_id: Option<Uuid>,
        quantity: i32,
    ) -> Result<OrderView, DomainError> {
        let product_id = require_product_id(product_id)?;
        self.repo.set_item(principal.user_id, product_id, quantity)
    }

    pub fn remove_item(
        &self,
        principal: &Principal,
        product_id: Option<Uuid>,
    ) -> Result<RemoveOutcome, DomainError> {
        let product_id = require_product_id(product_id)?;
        self.repo.remove_item(principal.user_id, product_id)
    }

    pub fn checkout(
        &self,
        principal: &Principal,
        shipping_address: Option<&str>,
    ) -> Result<OrderView, DomainError> {
        let address = shipping_address.unwrap_or_default().trim();
        if address.is_empty() {
            return Err(DomainError::Validation(
                "shipping_address is required.".to_string(),
            ));
        }
        self.repo.checkout(principal.user_id, address)
    }

    /// Orders the caller may not see are reported as missing.
    pub fn get_order(&self, principal: &Principal, id: Uuid) -> Result<OrderView, DomainError> {
        self.repo
            .find_by_id(id)?
            .filter(|order| principal.can_view(order))
            .ok_or_else(|| DomainError::NotFound("Order".to_string()))
    }

    pub fn list_orders(
        &self,
        principal: &Principal,
        page: i64,
        limit: i64,
    ) -> Result<ListResult, DomainError> {
        let (page, limit) = normalize_page(page, limit);
        self.repo.list(principal.order_scope(), page, limit)
    }
}

fn require_product_id(product_id: Option<Uuid>) -> Result<Uuid, DomainError> {
    product_id.ok_or_else(|| DomainError::Validation("product_id is required.".to_string()))
}

/// Clamp a 1-based page and a page size into the accepted range.
pub fn normalize_page(page: i64, limit: i64) -> (i64, i64) {
    (page.max(1), limit.clamp(1, MAX_PAGE_LIMIT))
}
