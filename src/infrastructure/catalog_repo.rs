use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::catalog::{CategoryView, ProductView};
use crate::domain::errors::DomainError;
use crate::domain::ports::CatalogRepository;
use crate::schema::{categories, products};

use super::models::{CategoryRow, ProductRow};

pub struct DieselCatalogRepository {
    pool: DbPool,
}

impl DieselCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn product_view((product, category_name): (ProductRow, String)) -> ProductView {
    ProductView {
        id: product.id,
        sku: product.sku,
        name: product.name,
        price: product.price,
        stock: product.stock,
        is_active: product.is_active,
        category_id: product.category_id,
        category_name,
    }
}

impl CatalogRepository for DieselCatalogRepository {
    fn list_categories(&self) -> Result<Vec<CategoryView>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = categories::table
            .order(categories::name.asc())
            .select(CategoryRow::as_select())
            .load(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|c| CategoryView {
                id: c.id,
                name: c.name,
            })
            .collect())
    }

    fn list_active_products(&self) -> Result<Vec<ProductView>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = products::table
            .inner_join(categories::table)
            .filter(products::is_active.eq(true))
            .order((products::created_at.desc(), products::id.asc()))
            .select((ProductRow::as_select(), categories::name))
            .load::<(ProductRow, String)>(&mut conn)?;

        Ok(rows.into_iter().map(product_view).collect())
    }

    fn find_active_product(&self, id: Uuid) -> Result<Option<ProductView>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = products::table
            .inner_join(categories::table)
            .filter(products::id.eq(id))
            .filter(products::is_active.eq(true))
            .select((ProductRow::as_select(), categories::name))
            .first::<(ProductRow, String)>(&mut conn)
            .optional()?;

        Ok(row.map(product_view))
    }
}
