use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use chrono::Utc;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::upsert::excluded;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    order_total, ListResult, OrderItemView, OrderStatus, OrderView, RemoveOutcome,
};
use crate::domain::ports::OrderRepository;
use crate::schema::{order_items, orders, products};

use super::models::{NewOrderItemRow, NewOrderRow, OrderItemRow, OrderRow, ProductRow};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<DieselError> for DomainError {
    fn from(e: DieselError) -> Self {
        match &e {
            DieselError::DatabaseError(
                DatabaseErrorKind::SerializationFailure | DatabaseErrorKind::UniqueViolation,
                info,
            ) => DomainError::Conflict(info.message().to_string()),
            DieselError::DatabaseError(_, info) if is_lock_failure(info.message()) => {
                DomainError::Conflict(info.message().to_string())
            }
            _ => DomainError::Internal(e.to_string()),
        }
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

/// Postgres reports deadlocks and lock timeouts without a dedicated diesel kind.
fn is_lock_failure(message: &str) -> bool {
    message.contains("deadlock detected")
        || message.contains("lock timeout")
        || message.contains("could not obtain lock")
}

// ── Repository ────────────────────────────────────────────────────────────────

/// A cart that changes status between our insert and our lock is retried this
/// many times before giving up with a conflict.
const CART_LOCK_ATTEMPTS: usize = 3;

pub struct DieselOrderRepository {
    pool: DbPool,
    lock_timeout_ms: Option<u64>,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            lock_timeout_ms: None,
        }
    }

    /// Bound how long checkout waits for product row locks.
    pub fn with_lock_timeout(mut self, lock_timeout_ms: Option<u64>) -> Self {
        self.lock_timeout_ms = lock_timeout_ms;
        self
    }
}

/// Lock the user's open cart row, creating the cart first if needed.
///
/// Creation goes through `ON CONFLICT DO NOTHING` against the partial unique
/// index on `(user_id) WHERE status = 'CART'`, so racing first requests end
/// up sharing one row.
fn lock_cart(conn: &mut PgConnection, user_id: Uuid) -> Result<OrderRow, DomainError> {
    for _ in 0..CART_LOCK_ATTEMPTS {
        let cart = orders::table
            .filter(orders::user_id.eq(user_id))
            .filter(orders::status.eq(OrderStatus::Cart.as_str()))
            .select(OrderRow::as_select())
            .for_update()
            .first(conn)
            .optional()?;
        if let Some(cart) = cart {
            return Ok(cart);
        }

        let inserted = diesel::insert_into(orders::table)
            .values(&NewOrderRow {
                id: Uuid::new_v4(),
                user_id,
                status: OrderStatus::Cart.as_str().to_string(),
            })
            .on_conflict_do_nothing()
            .execute(conn)?;
        if inserted > 0 {
            log::debug!("created cart for user {}", user_id);
        }
    }
    Err(DomainError::Conflict(
        "cart was modified concurrently".to_string(),
    ))
}

fn find_active_product(conn: &mut PgConnection, product_id: Uuid) -> Result<ProductRow, DomainError> {
    products::table
        .filter(products::id.eq(product_id))
        .filter(products::is_active.eq(true))
        .select(ProductRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| DomainError::NotFound("Product".to_string()))
}

type ItemWithNames = (OrderItemRow, (String, String));

fn item_view((item, (sku, product_name)): ItemWithNames) -> OrderItemView {
    OrderItemView {
        id: item.id,
        product_id: item.product_id,
        sku,
        product_name,
        quantity: item.quantity,
        unit_price: item.unit_price,
    }
}

fn load_items(conn: &mut PgConnection, order_id: Uuid) -> Result<Vec<OrderItemView>, DomainError> {
    let rows = order_items::table
        .inner_join(products::table)
        .filter(order_items::order_id.eq(order_id))
        .order((order_items::created_at.asc(), order_items::id.asc()))
        .select((OrderItemRow::as_select(), (products::sku, products::name)))
        .load::<ItemWithNames>(conn)?;
    Ok(rows.into_iter().map(item_view).collect())
}

/// Recompute `total_amount` from the current lines and persist it together
/// with `updated_at`. Returns the lines it summed.
fn recalc_total(
    conn: &mut PgConnection,
    cart: &mut OrderRow,
) -> Result<Vec<OrderItemView>, DomainError> {
    let items = load_items(conn, cart.id)?;
    let total = order_total(items.iter().map(|i| (&i.unit_price, i.quantity)));
    *cart = diesel::update(orders::table.find(cart.id))
        .set((
            orders::total_amount.eq(total),
            orders::updated_at.eq(Utc::now()),
        ))
        .returning(OrderRow::as_returning())
        .get_result(conn)?;
    Ok(items)
}

fn to_view(order: OrderRow, items: Vec<OrderItemView>) -> Result<OrderView, DomainError> {
    Ok(OrderView {
        id: order.id,
        user_id: order.user_id,
        status: OrderStatus::from_str(&order.status)?,
        total_amount: order.total_amount,
        shipping_address: order.shipping_address,
        created_at: order.created_at,
        updated_at: order.updated_at,
        items,
    })
}

fn scoped_orders(owner: Option<Uuid>) -> orders::BoxedQuery<'static, Pg> {
    let query = orders::table.into_boxed();
    match owner {
        Some(user_id) => query.filter(orders::user_id.eq(user_id)),
        None => query,
    }
}

impl OrderRepository for DieselOrderRepository {
    fn get_or_create_cart(&self, user_id: Uuid) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let cart = lock_cart(conn, user_id)?;
            let items = load_items(conn, cart.id)?;
            to_view(cart, items)
        })
    }

    fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let mut cart = lock_cart(conn, user_id)?;
            let product = find_active_product(conn, product_id)?;

            let current: Option<i32> = order_items::table
                .filter(order_items::order_id.eq(cart.id))
                .filter(order_items::product_id.eq(product_id))
                .select(order_items::quantity)
                .first(conn)
                .optional()?;
            if current.is_some_and(|c| c.checked_add(quantity).is_none()) {
                return Err(DomainError::Validation("Quantity is too large.".to_string()));
            }

            // A new line snapshots the current price; an existing one only
            // grows its quantity and keeps the price it was created with.
            diesel::insert_into(order_items::table)
                .values(&NewOrderItemRow {
                    id: Uuid::new_v4(),
                    order_id: cart.id,
                    product_id,
                    quantity,
                    unit_price: product.price,
                })
                .on_conflict((order_items::order_id, order_items::product_id))
                .do_update()
                .set(
                    order_items::quantity
                        .eq(order_items::quantity + excluded(order_items::quantity)),
                )
                .execute(conn)?;

            let items = recalc_total(conn, &mut cart)?;
            to_view(cart, items)
        })
    }

    fn set_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let mut cart = lock_cart(conn, user_id)?;

            if quantity <= 0 {
                diesel::delete(
                    order_items::table
                        .filter(order_items::order_id.eq(cart.id))
                        .filter(order_items::product_id.eq(product_id)),
                )
                .execute(conn)?;
            } else {
                let product = find_active_product(conn, product_id)?;
                diesel::insert_into(order_items::table)
                    .values(&NewOrderItemRow {
                        id: Uuid::new_v4(),
                        order_id: cart.id,
                        product_id,
                        quantity,
                        unit_price: product.price,
                    })
                    .on_conflict((order_items::order_id, order_items::product_id))
                    .do_update()
                    .set(order_items::quantity.eq(excluded(order_items::quantity)))
                    .execute(conn)?;
            }

            let items = recalc_total(conn, &mut cart)?;
            to_view(cart, items)
        })
    }

    fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<RemoveOutcome, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let mut cart = lock_cart(conn, user_id)?;
            let deleted = diesel::delete(
                order_items::table
                    .filter(order_items::order_id.eq(cart.id))
                    .filter(order_items::product_id.eq(product_id)),
            )
            .execute(conn)?;

            let items = recalc_total(conn, &mut cart)?;
            Ok(RemoveOutcome {
                removed: deleted > 0,
                cart: to_view(cart, items)?,
            })
        })
    }

    fn checkout(&self, user_id: Uuid, shipping_address: &str) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            if let Some(ms) = self.lock_timeout_ms {
                diesel::sql_query(format!("SET LOCAL lock_timeout = {ms}")).execute(conn)?;
            }

            // 1. Lock the cart so its lines cannot change underneath us.
            let cart = lock_cart(conn, user_id)?;
            let lines = order_items::table
                .filter(order_items::order_id.eq(cart.id))
                .select(OrderItemRow::as_select())
                .load(conn)?;
            if lines.is_empty() {
                return Err(DomainError::Validation("Cart is empty.".to_string()));
            }

            // 2. Lock exactly the referenced products, in id order so that
            //    overlapping checkouts queue up instead of deadlocking.
            let product_ids: Vec<Uuid> = lines
                .iter()
                .map(|l| l.product_id)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let locked: HashMap<Uuid, ProductRow> = products::table
                .filter(products::id.eq_any(&product_ids))
                .order(products::id.asc())
                .select(ProductRow::as_select())
                .for_update()
                .load(conn)?
                .into_iter()
                .map(|p| (p.id, p))
                .collect();

            // 3. Validate every line before mutating anything.
            for line in &lines {
                let product = locked.get(&line.product_id).ok_or_else(|| {
                    DomainError::Internal(format!("product {} vanished", line.product_id))
                })?;
                if line.quantity > product.stock {
                    log::warn!(
                        "checkout of cart {} rejected: {} requested {} of {}",
                        cart.id,
                        product.sku,
                        line.quantity,
                        product.stock
                    );
                    return Err(DomainError::InsufficientStock {
                        product_id: product.id,
                        product_name: product.name.clone(),
                        available: product.stock,
                        requested: line.quantity,
                    });
                }
            }

            // 4. Decrement stock.
            let now = Utc::now();
            for line in &lines {
                diesel::update(products::table.find(line.product_id))
                    .set((
                        products::stock.eq(products::stock - line.quantity),
                        products::updated_at.eq(now),
                    ))
                    .execute(conn)?;
            }

            // 5. Finalize the order.
            let items = load_items(conn, cart.id)?;
            let total = order_total(items.iter().map(|i| (&i.unit_price, i.quantity)));
            let order = diesel::update(orders::table.find(cart.id))
                .set((
                    orders::shipping_address.eq(shipping_address),
                    orders::status.eq(OrderStatus::Pending.as_str()),
                    orders::total_amount.eq(total),
                    orders::updated_at.eq(now),
                ))
                .returning(OrderRow::as_returning())
                .get_result(conn)?;

            log::info!(
                "order {} checked out by user {} ({} lines, total {})",
                order.id,
                user_id,
                items.len(),
                order.total_amount
            );
            to_view(order, items)
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let order = orders::table
            .filter(orders::id.eq(id))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?;

        let Some(order) = order else {
            return Ok(None);
        };

        let items = load_items(&mut conn, order.id)?;
        to_view(order, items).map(Some)
    }

    fn list(
        &self,
        owner: Option<Uuid>,
        page: i64,
        limit: i64,
    ) -> Result<ListResult, DomainError> {
        let mut conn = self.pool.get()?;

        let offset = (page.max(1) - 1)
            .checked_mul(limit)
            .ok_or_else(|| DomainError::Validation("Page is out of range.".to_string()))?;
        conn.transaction::<_, DomainError, _>(|conn| {
            let total: i64 = scoped_orders(owner).count().get_result(conn)?;

            let rows = scoped_orders(owner)
                .select(OrderRow::as_select())
                .order((orders::created_at.desc(), orders::id.desc()))
                .limit(limit)
                .offset(offset)
                .load(conn)?;

            let ids: Vec<Uuid> = rows.iter().map(|o| o.id).collect();
            let mut items_by_order: HashMap<Uuid, Vec<OrderItemView>> = HashMap::new();
            let item_rows = order_items::table
                .inner_join(products::table)
                .filter(order_items::order_id.eq_any(&ids))
                .order((order_items::created_at.asc(), order_items::id.asc()))
                .select((OrderItemRow::as_select(), (products::sku, products::name)))
                .load::<ItemWithNames>(conn)?;
            for row in item_rows {
                items_by_order
                    .entry(row.0.order_id)
                    .or_default()
                    .push(item_view(row));
            }

            let items = rows
                .into_iter()
                .map(|o| {
                    let lines = items_by_order.remove(&o.id).unwrap_or_default();
                    to_view(o, lines)
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(ListResult { items, total })
        })
    }
}
