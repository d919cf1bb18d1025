use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    audit,
    dto::customers::{CreateCustomerRequest, CustomerList, UpdateCustomerRequest},
    entity::{
        customers::{ActiveModel, Column, Entity as Customers, Model as CustomerModel},
        orders::{Column as OrderCol, Entity as Orders},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Customer,
    response::{ApiResponse, Meta},
    routes::params::CustomerQuery,
    services::user_service::normalize_email,
    state::AppState,
};

pub async fn list_customers(
    state: &AppState,
    query: CustomerQuery,
) -> AppResult<ApiResponse<CustomerList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(name) = query.name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(Column::Name).ilike(contains_pattern(name)));
    }
    if let Some(email) = query.email.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(Column::Email).ilike(contains_pattern(email)));
    }

    let finder = Customers::find()
        .filter(condition)
        .order_by_asc(Column::Name)
        .order_by_asc(Column::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(customer_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::paged("Customers", CustomerList { items }, meta))
}

pub async fn get_customer(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Customer>> {
    let customer = find_customer(state, id).await?;
    Ok(ApiResponse::single("Customer", customer_from_entity(customer)))
}

pub async fn create_customer(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    let cpf = payload.validate()?;
    let email = normalize_email(&payload.email);

    ensure_unique(state, None, Some(&email), Some(&cpf)).await?;

    let customer = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        email: Set(email),
        cpf: Set(cpf),
        phone: Set(payload.phone),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "customer_create",
        "customers",
        serde_json::json!({ "customer_id": customer.id }),
    )
    .await;

    Ok(ApiResponse::single("Customer created", customer_from_entity(customer)))
}

pub async fn update_customer(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    let cpf = payload.validate()?;
    let existing = find_customer(state, id).await?;

    let email = payload
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| *e != existing.email);
    let cpf = cpf.filter(|c| *c != existing.cpf);
    ensure_unique(state, Some(id), email.as_deref(), cpf.as_deref()).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(email) = email {
        active.email = Set(email);
    }
    if let Some(cpf) = cpf {
        active.cpf = Set(cpf);
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(phone);
    }
    active.updated_at = Set(Utc::now().into());
    let customer = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "customer_update",
        "customers",
        serde_json::json!({ "customer_id": customer.id }),
    )
    .await;

    Ok(ApiResponse::single("Updated", customer_from_entity(customer)))
}

pub async fn delete_customer(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    find_customer(state, id).await?;

    let orders = Orders::find()
        .filter(OrderCol::CustomerId.eq(id))
        .count(&state.orm)
        .await?;
    if orders > 0 {
        return Err(AppError::Conflict(
            "Customer has orders and cannot be deleted".into(),
        ));
    }

    Customers::delete_by_id(id).exec(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "customer_delete",
        "customers",
        serde_json::json!({ "customer_id": id }),
    )
    .await;

    Ok(ApiResponse::single("Deleted", serde_json::json!({})))
}

async fn find_customer(state: &AppState, id: Uuid) -> AppResult<CustomerModel> {
    Customers::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Customer"))
}

/// Reject an email or CPF already held by a customer other than `except`.
async fn ensure_unique(
    state: &AppState,
    except: Option<Uuid>,
    email: Option<&str>,
    cpf: Option<&str>,
) -> AppResult<()> {
    let others = || {
        let mut finder = Customers::find();
        if let Some(id) = except {
            finder = finder.filter(Column::Id.ne(id));
        }
        finder
    };

    if let Some(email) = email {
        if others().filter(Column::Email.eq(email)).one(&state.orm).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".into()));
        }
    }
    if let Some(cpf) = cpf {
        if others().filter(Column::Cpf.eq(cpf)).one(&state.orm).await?.is_some() {
            return Err(AppError::Conflict("CPF already registered".into()));
        }
    }
    Ok(())
}

/// `%term%` for `ILIKE`, with `\`, `%` and `_` in `term` matched literally.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn customer_from_entity(model: CustomerModel) -> Customer {
    Customer {
        id: model.id,
        name: model.name,
        email: model.email,
        cpf: model.cpf,
        phone: model.phone,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
