use retail_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    security::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let admin_email = config.admin_user.as_deref().unwrap_or("admin@example.com");
    let admin_password = config.admin_password.as_deref().unwrap_or("admin1234");
    let admin_id = ensure_user(&pool, admin_email, admin_password, "admin").await?;
    let user_id = ensure_user(&pool, "user@example.com", "user12345", "user").await?;
    seed_customers(&pool).await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role, is_active)
        VALUES ($1, $2, $3, $4, TRUE)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, is_active = TRUE
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_customers(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let customers = [
        ("Ana Souza", "ana.souza@example.com", "39053344705", Some("+55 11 91234-5678")),
        ("Bruno Lima", "bruno.lima@example.com", "52998224725", None),
        ("Carla Mendes", "carla.mendes@example.com", "11144477735", Some("+55 21 99876-5432")),
    ];

    for (name, email, cpf, phone) in customers {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, cpf, phone)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(cpf)
        .bind(phone)
        .execute(pool)
        .await?;
    }

    println!("Seeded customers");
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = [
        ("Whole Milk 1L", "7891000100103", "Dairy", "Milk", 549, 120),
        ("Greek Yogurt", "7891000244012", "Dairy", "Yogurt", 899, 60),
        ("French Bread", "2000000000015", "Bakery", "Bread", 120, 200),
        ("Arabica Coffee 500g", "7896005800010", "Grocery", "Coffee", 2490, 40),
        ("Dish Soap 500ml", "7891024134702", "Cleaning", "Kitchen", 329, 0),
    ];

    for (name, barcode, section, category, price, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, barcode, section, category, sale_price, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (barcode) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(barcode)
        .bind(section)
        .bind(category)
        .bind(price as i64)
        .bind(stock as i32)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
