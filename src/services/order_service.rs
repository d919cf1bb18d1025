use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::{Expr, LockType, Query, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CreateOrderRequest, OrderList, UpdateOrderRequest},
    entity::{
        customers::Entity as Customers,
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    state::AppState,
};

pub async fn list_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let condition = order_filter(&query)?;

    let finder = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::OrderDate)
        .order_by_asc(OrderCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_items(&state.orm, orders).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::paged("Orders", OrderList { items }, meta))
}

pub async fn get_order(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Order>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    let items = load_items(&state.orm, order.id).await?;
    Ok(ApiResponse::single("OK", order_from_entity(order, items)))
}

/// Create an order, checking and decrementing stock inside one transaction.
///
/// Product rows are locked `FOR UPDATE` in id order. Lines naming the same
/// product are checked against stock as a sum.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    payload.validate()?;
    let txn = state.orm.begin().await?;

    if Customers::find_by_id(payload.customer_id).one(&txn).await?.is_none() {
        return Err(AppError::not_found(format!("Customer {}", payload.customer_id)));
    }

    let mut requested: BTreeMap<Uuid, i64> = BTreeMap::new();
    for item in &payload.items {
        *requested.entry(item.product_id).or_default() += i64::from(item.quantity);
    }

    let products: HashMap<Uuid, _> = Products::find()
        .filter(ProdCol::Id.is_in(requested.keys().copied()))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    for item in &payload.items {
        if !products.contains_key(&item.product_id) {
            return Err(AppError::not_found(format!("Product {}", item.product_id)));
        }
    }
    for (product_id, quantity) in &requested {
        let stock = products.get(product_id).map(|p| i64::from(p.stock)).unwrap_or(0);
        if stock < *quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for product {product_id}"
            )));
        }
    }

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        customer_id: Set(payload.customer_id),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        order_date: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(payload.items.len());
    for line in payload.items {
        let Some(product) = products.get(&line.product_id) else {
            continue;
        };
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price.unwrap_or(product.sale_price)),
            section: Set(line.section.or_else(|| Some(product.section.clone()))),
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));
    }

    for (product_id, quantity) in &requested {
        // bounded by the stock check above
        let quantity = *quantity as i32;
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity))
            .col_expr(ProdCol::UpdatedAt, SimpleExpr::from(Expr::current_timestamp()))
            .filter(ProdCol::Id.eq(*product_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "customer_id": order.customer_id }),
    )
    .await;

    Ok(ApiResponse::single("Order created", order_from_entity(order, items)))
}

/// Only the status changes. Cancelling returns the items to stock; a cancelled
/// order stays cancelled.
pub async fn update_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, id).await?;
    let current = parse_status(&order.status)?;
    let next = payload.status;

    if current == OrderStatus::Cancelled && next != OrderStatus::Cancelled {
        return Err(AppError::BadRequest("Cancelled orders cannot be reopened".into()));
    }
    if next == OrderStatus::Cancelled && current != OrderStatus::Cancelled {
        restore_stock(&txn, order.id).await?;
    }

    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    let items = load_items(&txn, order.id).await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": current.as_str(), "to": next.as_str() }),
    )
    .await;

    Ok(ApiResponse::single("Order updated", order_from_entity(order, items)))
}

/// Remove an order and its items. Stock is returned unless the order was
/// already cancelled.
pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, id).await?;

    if parse_status(&order.status)? != OrderStatus::Cancelled {
        restore_stock(&txn, order.id).await?;
    }
    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .exec(&txn)
        .await?;
    Orders::delete_by_id(order.id).exec(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_delete",
        "orders",
        serde_json::json!({ "order_id": id }),
    )
    .await;

    Ok(ApiResponse::single("Deleted", serde_json::json!({})))
}

fn order_filter(query: &OrderListQuery) -> AppResult<Condition> {
    let mut condition = Condition::all();

    if let Some(start) = query.start_date {
        condition = condition.add(OrderCol::OrderDate.gte(start_of_day(start)));
    }
    if let Some(end) = query.end_date {
        let next_day = end
            .succ_opt()
            .ok_or_else(|| AppError::BadRequest("end_date is out of range".into()))?;
        condition = condition.add(OrderCol::OrderDate.lt(start_of_day(next_day)));
    }
    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if start > end {
            return Err(AppError::BadRequest("start_date must not be after end_date".into()));
        }
    }
    if let Some(order_id) = query.order_id {
        condition = condition.add(OrderCol::Id.eq(order_id));
    }
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status = parse_status(status).map_err(|_| {
            AppError::BadRequest(format!("Invalid order status: {status}"))
        })?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }
    if let Some(customer_id) = query.customer_id {
        condition = condition.add(OrderCol::CustomerId.eq(customer_id));
    }
    if let Some(section) = query.section.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(
            OrderCol::Id.in_subquery(
                Query::select()
                    .column(OrderItemCol::OrderId)
                    .from(OrderItems)
                    .and_where(OrderItemCol::Section.eq(section.clone()))
                    .to_owned(),
            ),
        );
    }

    Ok(condition)
}

fn start_of_day(date: NaiveDate) -> chrono::DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn parse_status(raw: &str) -> AppResult<OrderStatus> {
    raw.parse::<OrderStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
}

async fn lock_order(txn: &DatabaseTransaction, id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

async fn restore_stock(txn: &DatabaseTransaction, order_id: Uuid) -> AppResult<()> {
    for item in load_item_models(txn, order_id).await? {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
            .col_expr(ProdCol::UpdatedAt, SimpleExpr::from(Expr::current_timestamp()))
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(txn)
            .await?;
    }
    Ok(())
}

async fn load_item_models<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItemModel>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::Id)
        .all(conn)
        .await?)
}

async fn load_items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    Ok(load_item_models(conn, order_id)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect())
}

async fn with_items<C: ConnectionTrait>(conn: &C, orders: Vec<OrderModel>) -> AppResult<Vec<Order>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(ids))
        .order_by_asc(OrderItemCol::Id)
        .all(conn)
        .await?
    {
        items
            .entry(item.order_id)
            .or_default()
            .push(order_item_from_entity(item));
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let lines = items.remove(&order.id).unwrap_or_default();
            order_from_entity(order, lines)
        })
        .collect())
}

fn order_from_entity(model: OrderModel, items: Vec<OrderItem>) -> Order {
    Order {
        id: model.id,
        customer_id: model.customer_id,
        status: model.status.parse().unwrap_or(OrderStatus::Pending),
        order_date: model.order_date.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
        items,
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        product_id: model.product_id,
        quantity: model.quantity,
        unit_price: model.unit_price,
        section: model.section,
    }
}
