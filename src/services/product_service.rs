use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        product_images::{ActiveModel as ImageActive, Column as ImageCol, Entity as ProductImages},
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(category) = query.category.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Category.eq(category.clone()));
    }
    if let Some(section) = query.section.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Section.eq(section.clone()));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::SalePrice.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::SalePrice.lte(max_price));
    }
    match query.available {
        Some(true) => condition = condition.add(Column::Stock.gt(0)),
        Some(false) => condition = condition.add(Column::Stock.lte(0)),
        None => {}
    }

    let finder = Products::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .order_by_asc(Column::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_images(&state.orm, models).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::paged("Products", ProductList { items }, meta))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let model = find_product(state, id).await?;
    let product = single_with_images(&state.orm, model).await?;
    Ok(ApiResponse::single("Product", product))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    payload.validate()?;
    ensure_barcode_free(state, None, &payload.barcode).await?;

    let txn = state.orm.begin().await?;
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        barcode: Set(payload.barcode),
        section: Set(payload.section),
        category: Set(payload.category),
        sale_price: Set(payload.sale_price),
        stock: Set(payload.stock),
        expiration_date: Set(payload.expiration_date),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;
    insert_images(&txn, product.id, &payload.images).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::single(
        "Product created",
        product_from_entity(product, payload.images),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    payload.validate()?;
    let existing = find_product(state, id).await?;

    if let Some(barcode) = payload.barcode.as_ref().filter(|b| **b != existing.barcode) {
        ensure_barcode_free(state, Some(id), barcode).await?;
    }

    let txn = state.orm.begin().await?;
    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(barcode) = payload.barcode {
        active.barcode = Set(barcode);
    }
    if let Some(section) = payload.section {
        active.section = Set(section);
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(sale_price) = payload.sale_price {
        active.sale_price = Set(sale_price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(expiration_date) = payload.expiration_date {
        active.expiration_date = Set(expiration_date);
    }
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    if let Some(images) = &payload.images {
        ProductImages::delete_many()
            .filter(ImageCol::ProductId.eq(id))
            .exec(&txn)
            .await?;
        insert_images(&txn, id, images).await?;
    }
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    let product = single_with_images(&state.orm, product).await?;
    Ok(ApiResponse::single("Updated", product))
}

/// Products that appear on any order line cannot be deleted; their images go
/// with them otherwise.
pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    find_product(state, id).await?;

    let references = OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(id))
        .count(&state.orm)
        .await?;
    if references > 0 {
        return Err(AppError::Conflict(
            "Product is referenced by existing orders and cannot be deleted".into(),
        ));
    }

    let result = Products::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Product"));
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::single("Deleted", serde_json::json!({})))
}

async fn find_product(state: &AppState, id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))
}

async fn ensure_barcode_free(state: &AppState, except: Option<Uuid>, barcode: &str) -> AppResult<()> {
    let mut finder = Products::find().filter(Column::Barcode.eq(barcode));
    if let Some(id) = except {
        finder = finder.filter(Column::Id.ne(id));
    }
    if finder.one(&state.orm).await?.is_some() {
        return Err(AppError::Conflict("Barcode already in use".into()));
    }
    Ok(())
}

async fn insert_images<C: ConnectionTrait>(conn: &C, product_id: Uuid, urls: &[String]) -> AppResult<()> {
    if urls.is_empty() {
        return Ok(());
    }
    let rows = urls.iter().enumerate().map(|(position, url)| ImageActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        url: Set(url.clone()),
        position: Set(position as i32),
        created_at: NotSet,
    });
    ProductImages::insert_many(rows).exec(conn).await?;
    Ok(())
}

async fn single_with_images<C: ConnectionTrait>(conn: &C, model: ProductModel) -> AppResult<Product> {
    with_images(conn, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("product vanished while loading images")))
}

async fn with_images<C: ConnectionTrait>(conn: &C, models: Vec<ProductModel>) -> AppResult<Vec<Product>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let mut images: HashMap<Uuid, Vec<String>> = HashMap::new();
    for image in ProductImages::find()
        .filter(ImageCol::ProductId.is_in(ids))
        .order_by_asc(ImageCol::Position)
        .all(conn)
        .await?
    {
        images.entry(image.product_id).or_default().push(image.url);
    }

    Ok(models
        .into_iter()
        .map(|model| {
            let urls = images.remove(&model.id).unwrap_or_default();
            product_from_entity(model, urls)
        })
        .collect())
}

fn product_from_entity(model: ProductModel, images: Vec<String>) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        barcode: model.barcode,
        section: model.section,
        category: model.category,
        sale_price: model.sale_price,
        stock: model.stock,
        available: model.stock > 0,
        expiration_date: model.expiration_date,
        images,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
