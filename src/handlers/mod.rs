pub mod catalog;
pub mod orders;

use actix_web::{web, HttpResponse};
use utoipa::OpenApi;

use crate::domain::errors::DomainError;
use crate::errors::AppError;

/// Run blocking diesel work on actix's thread pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, DomainError> + Send + 'static,
    T: Send + 'static,
{
    web::block(f)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(AppError::from)
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Catalog & Orders API", version = "1.0.0"),
    paths(
        orders::my_cart,
        orders::add_item,
        orders::set_item,
        orders::remove_item,
        orders::checkout,
        orders::get_order,
        orders::list_orders,
        catalog::list_categories,
        catalog::list_products,
        catalog::get_product,
    ),
    tags(
        (name = "orders", description = "Cart and checkout for the authenticated user"),
        (name = "catalog", description = "Public, read-only product catalog"),
    )
)]
pub struct ApiDoc;

/// GET /api/schema/
pub async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// GET /healthz/
pub async fn healthz() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
