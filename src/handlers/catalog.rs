use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::blocking;
use super::orders::money;
use crate::application::catalog_service::CatalogService;
use crate::domain::catalog::{CategoryView, ProductView};
use crate::errors::AppError;
use crate::infrastructure::catalog_repo::DieselCatalogRepository;

pub type Catalog = CatalogService<DieselCatalogRepository>;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: String,
    pub stock: i32,
    pub is_active: bool,
    pub category_id: Uuid,
    pub category_name: String,
}

impl From<CategoryView> for CategoryResponse {
    fn from(c: CategoryView) -> Self {
        Self {
            id: c.id,
            name: c.name,
        }
    }
}

impl From<ProductView> for ProductResponse {
    fn from(p: ProductView) -> Self {
        Self {
            price: money(&p.price),
            id: p.id,
            sku: p.sku,
            name: p.name,
            stock: p.stock,
            is_active: p.is_active,
            category_id: p.category_id,
            category_name: p.category_name,
        }
    }
}

/// GET /api/catalog/categories/
#[utoipa::path(
    get,
    path = "/api/catalog/categories/",
    responses(
        (status = 200, description = "All categories by name", body = [CategoryResponse]),
    ),
    tag = "catalog"
)]
pub async fn list_categories(catalog: web::Data<Catalog>) -> Result<HttpResponse, AppError> {
    let categories = blocking(move || catalog.list_categories()).await?;
    let body: Vec<CategoryResponse> = categories.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /api/catalog/products/
///
/// Only active products are listed.
#[utoipa::path(
    get,
    path = "/api/catalog/products/",
    responses(
        (status = 200, description = "Active products, newest first", body = [ProductResponse]),
    ),
    tag = "catalog"
)]
pub async fn list_products(catalog: web::Data<Catalog>) -> Result<HttpResponse, AppError> {
    let products = blocking(move || catalog.list_products()).await?;
    let body: Vec<ProductResponse> = products.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /api/catalog/products/{id}/
#[utoipa::path(
    get,
    path = "/api/catalog/products/{id}/",
    params(
        ("id" = Uuid, Path, description = "Product UUID"),
    ),
    responses(
        (status = 200, description = "Product found", body = ProductResponse),
        (status = 404, description = "Product missing or inactive"),
    ),
    tag = "catalog"
)]
pub async fn get_product(
    catalog: web::Data<Catalog>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();
    let product = blocking(move || catalog.get_product(product_id)).await?;
    Ok(HttpResponse::Ok().json(ProductResponse::from(product)))
}
