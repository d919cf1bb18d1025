mod common;

use retail_api::{
    dto::{
        auth::{LoginRequest, RegisterRequest, TokenKind},
        orders::{CreateOrderRequest, OrderItemRequest, UpdateOrderRequest},
        products::UpdateProductRequest,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{OrderStatus, UserRole},
    routes::params::{CustomerQuery, OrderListQuery},
    security::decode_token,
    services::{auth_service, customer_service, order_service, product_service},
    state::AppState,
};
use uuid::Uuid;

macro_rules! db_or_skip {
    () => {
        match common::db_state().await {
            Some(state) => state,
            None => {
                common::skip_notice();
                return Ok(());
            }
        }
    };
}

async fn stock_of(state: &AppState, id: Uuid) -> anyhow::Result<i32> {
    let product = product_service::get_product(state, id).await?;
    Ok(product.data.expect("product").stock)
}

fn line(product_id: Uuid, quantity: i32) -> OrderItemRequest {
    OrderItemRequest {
        product_id,
        quantity,
        unit_price: None,
        section: None,
    }
}

#[tokio::test]
async fn registering_the_same_email_twice_conflicts() -> anyhow::Result<()> {
    let state = db_or_skip!();
    let email = common::unique_email("dup");
    let request = || RegisterRequest {
        email: email.clone(),
        password: "password-123".into(),
        full_name: Some("Dup".into()),
    };

    let created = auth_service::register_user(&state, request()).await?;
    assert_eq!(created.data.expect("user").role, UserRole::User);

    let second = auth_service::register_user(&state, request()).await;
    assert!(matches!(second, Err(AppError::Conflict(_))));
    Ok(())
}

#[tokio::test]
async fn login_returns_tokens_for_the_registered_user() -> anyhow::Result<()> {
    let state = db_or_skip!();
    let email = common::unique_email("login");
    let user = auth_service::register_user(
        &state,
        RegisterRequest {
            email: email.to_uppercase(),
            password: "password-123".into(),
            full_name: None,
        },
    )
    .await?
    .data
    .expect("user");

    let wrong = auth_service::login_user(
        &state,
        LoginRequest {
            email: email.clone(),
            password: "password-999".into(),
        },
    )
    .await;
    assert!(matches!(wrong, Err(AppError::Unauthorized(_))));

    let tokens = auth_service::login_user(
        &state,
        LoginRequest {
            email,
            password: "password-123".into(),
        },
    )
    .await?
    .data
    .expect("tokens");
    assert_eq!(tokens.token_type, "bearer");

    let claims = decode_token(&state.jwt, &tokens.access_token, TokenKind::Access)?;
    assert_eq!(claims.sub, user.id.to_string());
    assert!(decode_token(&state.jwt, &tokens.access_token, TokenKind::Refresh).is_err());
    Ok(())
}

#[tokio::test]
async fn orders_check_and_decrement_stock() -> anyhow::Result<()> {
    let state = db_or_skip!();
    let admin = common::admin(&state).await;
    let customer = common::customer(&state, &admin, common::unique_email("buyer")).await;
    let product = common::product(&state, &admin, 1_250, 5).await;

    let too_many = order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            customer_id: customer.id,
            items: vec![line(product.id, 6)],
        },
    )
    .await;
    assert!(matches!(too_many, Err(AppError::BadRequest(_))));
    assert_eq!(stock_of(&state, product.id).await?, 5);

    // two lines of the same product count against stock together
    let split = order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            customer_id: customer.id,
            items: vec![line(product.id, 3), line(product.id, 3)],
        },
    )
    .await;
    assert!(matches!(split, Err(AppError::BadRequest(_))));

    let order = order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            customer_id: customer.id,
            items: vec![line(product.id, 2), line(product.id, 1)],
        },
    )
    .await?
    .data
    .expect("order");

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 2);
    assert!(order.items.iter().all(|i| i.unit_price == 1_250));
    assert!(order.items.iter().all(|i| i.section.as_deref() == Some("Grocery")));
    assert_eq!(stock_of(&state, product.id).await?, 2);
    Ok(())
}

#[tokio::test]
async fn unknown_customer_or_product_is_not_found() -> anyhow::Result<()> {
    let state = db_or_skip!();
    let admin = common::admin(&state).await;
    let customer = common::customer(&state, &admin, common::unique_email("nf")).await;
    let product = common::product(&state, &admin, 100, 1).await;

    let no_customer = order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            customer_id: Uuid::new_v4(),
            items: vec![line(product.id, 1)],
        },
    )
    .await;
    assert!(matches!(no_customer, Err(AppError::NotFound(_))));

    let no_product = order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            customer_id: customer.id,
            items: vec![line(Uuid::new_v4(), 1)],
        },
    )
    .await;
    assert!(matches!(no_product, Err(AppError::NotFound(_))));
    assert_eq!(stock_of(&state, product.id).await?, 1);
    Ok(())
}

#[tokio::test]
async fn cancelling_restores_stock_and_cannot_be_undone() -> anyhow::Result<()> {
    let state = db_or_skip!();
    let admin = common::admin(&state).await;
    let customer = common::customer(&state, &admin, common::unique_email("cancel")).await;
    let product = common::product(&state, &admin, 300, 4).await;

    let order = order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            customer_id: customer.id,
            items: vec![line(product.id, 4)],
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(stock_of(&state, product.id).await?, 0);
    assert!(!product_service::get_product(&state, product.id).await?.data.expect("product").available);

    let cancelled = order_service::update_order(
        &state,
        &admin,
        order.id,
        UpdateOrderRequest {
            status: OrderStatus::Cancelled,
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&state, product.id).await?, 4);

    let reopened = order_service::update_order(
        &state,
        &admin,
        order.id,
        UpdateOrderRequest {
            status: OrderStatus::Pending,
        },
    )
    .await;
    assert!(matches!(reopened, Err(AppError::BadRequest(_))));

    // already cancelled, so deleting must not return the stock a second time
    order_service::delete_order(&state, &admin, order.id).await?;
    assert_eq!(stock_of(&state, product.id).await?, 4);
    Ok(())
}

#[tokio::test]
async fn referenced_records_cannot_be_deleted() -> anyhow::Result<()> {
    let state = db_or_skip!();
    let admin = common::admin(&state).await;
    let customer = common::customer(&state, &admin, common::unique_email("ref")).await;
    let product = common::product(&state, &admin, 990, 10).await;

    let order = order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            customer_id: customer.id,
            items: vec![line(product.id, 1)],
        },
    )
    .await?
    .data
    .expect("order");

    let product_delete = product_service::delete_product(&state, &admin, product.id).await;
    assert!(matches!(product_delete, Err(AppError::Conflict(_))));
    let customer_delete = customer_service::delete_customer(&state, &admin, customer.id).await;
    assert!(matches!(customer_delete, Err(AppError::Conflict(_))));

    order_service::delete_order(&state, &admin, order.id).await?;
    assert_eq!(stock_of(&state, product.id).await?, 10);
    product_service::delete_product(&state, &admin, product.id).await?;
    customer_service::delete_customer(&state, &admin, customer.id).await?;
    Ok(())
}

#[tokio::test]
async fn writes_reserved_for_admins_are_forbidden_to_users() -> anyhow::Result<()> {
    let state = db_or_skip!();
    let admin = common::admin(&state).await;
    let product = common::product(&state, &admin, 100, 1).await;
    let user = AuthUser {
        user_id: admin.user_id,
        role: UserRole::User,
    };

    let result = product_service::delete_product(&state, &user, product.id).await;
    assert!(matches!(result, Err(AppError::Forbidden)));
    assert_eq!(stock_of(&state, product.id).await?, 1);
    Ok(())
}

#[tokio::test]
async fn customer_and_order_filters_narrow_results() -> anyhow::Result<()> {
    let state = db_or_skip!();
    let admin = common::admin(&state).await;
    let tag = Uuid::new_v4().simple().to_string();
    let first = common::customer(&state, &admin, format!("{tag}.first@example.com")).await;
    common::customer(&state, &admin, format!("{tag}.second@example.com")).await;

    let both = customer_service::list_customers(
        &state,
        CustomerQuery {
            email: Some(tag.to_uppercase()),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(both.meta.and_then(|m| m.total), Some(2));

    let one = customer_service::list_customers(
        &state,
        CustomerQuery {
            email: Some(format!("{tag}.first")),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("customers");
    assert_eq!(one.items.len(), 1);
    assert_eq!(one.items[0].id, first.id);

    let product = common::product(&state, &admin, 500, 3).await;
    let order = order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            customer_id: first.id,
            items: vec![line(product.id, 1)],
        },
    )
    .await?
    .data
    .expect("order");

    let by_customer = order_service::list_orders(
        &state,
        OrderListQuery {
            customer_id: Some(first.id),
            status: Some("PENDING".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("orders");
    assert_eq!(by_customer.items.len(), 1);
    assert_eq!(by_customer.items[0].id, order.id);

    let shipped = order_service::list_orders(
        &state,
        OrderListQuery {
            customer_id: Some(first.id),
            status: Some("shipped".into()),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(shipped.meta.and_then(|m| m.total), Some(0));

    let bad_status = order_service::list_orders(
        &state,
        OrderListQuery {
            status: Some("lost".into()),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(bad_status, Err(AppError::BadRequest(_))));
    Ok(())
}

#[tokio::test]
async fn product_update_clears_fields_sent_as_null() -> anyhow::Result<()> {
    let state = db_or_skip!();
    let admin = common::admin(&state).await;
    let product = common::product(&state, &admin, 700, 2).await;
    assert_eq!(product.category.as_deref(), Some("Test"));

    let payload: UpdateProductRequest =
        serde_json::from_str(r#"{"category": null, "description": "Fresh"}"#)?;
    let updated = product_service::update_product(&state, &admin, product.id, payload)
        .await?
        .data
        .expect("product");
    assert_eq!(updated.category, None);
    assert_eq!(updated.description.as_deref(), Some("Fresh"));
    assert_eq!(updated.images, product.images);

    let payload: UpdateProductRequest = serde_json::from_str(r#"{"stock": 9}"#)?;
    let untouched = product_service::update_product(&state, &admin, product.id, payload)
        .await?
        .data
        .expect("product");
    assert_eq!(untouched.description.as_deref(), Some("Fresh"));
    assert_eq!(untouched.stock, 9);
    Ok(())
}

#[tokio::test]
async fn customer_search_treats_wildcards_literally() -> anyhow::Result<()> {
    let state = db_or_skip!();
    let admin = common::admin(&state).await;
    let tag = Uuid::new_v4().simple().to_string();
    let exact = common::customer(&state, &admin, format!("{tag}a_b@example.com")).await;
    common::customer(&state, &admin, format!("{tag}axb@example.com")).await;

    let found = customer_service::list_customers(
        &state,
        CustomerQuery {
            email: Some(format!("{tag}a_b")),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("customers");
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].id, exact.id);
    Ok(())
}
