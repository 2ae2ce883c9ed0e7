use uuid::Uuid;

use crate::domain::catalog::{CategoryView, ProductView};
use crate::domain::errors::DomainError;
use crate::domain::ports::CatalogRepository;

pub struct CatalogService<R> {
    repo: R,
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn list_categories(&self) -> Result<Vec<CategoryView>, DomainError> {
        self.repo.list_categories()
    }

    pub fn list_products(&self) -> Result<Vec<ProductView>, DomainError> {
        self.repo.list_active_products()
    }

    /// Inactive products are indistinguishable from missing ones.
    pub fn get_product(&self, id: Uuid) -> Result<ProductView, DomainError> {
        self.repo
            .find_active_product(id)?
            .ok_or_else(|| DomainError::NotFound("Product".to_string()))
    }
}
