use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::DomainError;

/// Lifecycle of an order. A cart is simply an order in `Cart` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Cart,
    Pending,
    Paid,
    Shipped,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Cart => "CART",
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CART" => Ok(OrderStatus::Cart),
            "PENDING" => Ok(OrderStatus::Pending),
            "PAID" => Ok(OrderStatus::Paid),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::Internal(format!("unknown order status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub quantity: i32,
    /// Price captured when the line was created.
    pub unit_price: BigDecimal,
}

impl OrderItemView {
    pub fn line_total(&self) -> BigDecimal {
        line_total(&self.unit_price, self.quantity)
    }
}

#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: BigDecimal,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub items: Vec<OrderView>,
    pub total: i64,
}

#[derive(Debug, Clone)]
pub struct RemoveOutcome {
    pub removed: bool,
    pub cart: OrderView,
}

pub fn line_total(unit_price: &BigDecimal, quantity: i32) -> BigDecimal {
    unit_price.clone() * BigDecimal::from(quantity)
}

/// Sum of `unit_price * quantity` over every line, at cent precision.
pub fn order_total<'a, I>(lines: I) -> BigDecimal
where
    I: IntoIterator<Item = (&'a BigDecimal, i32)>,
{
    lines
        .into_iter()
        .fold(BigDecimal::from(0), |acc, (price, qty)| {
            acc + line_total(price, qty)
        })
        .with_scale(2)
}
