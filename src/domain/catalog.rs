use bigdecimal::BigDecimal;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CategoryView {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: BigDecimal,
    pub stock: i32,
    pub is_active: bool,
    pub category_id: Uuid,
    pub category_name: String,
}
