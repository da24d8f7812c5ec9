use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{auth::new_id, identity::create_customer};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_admin(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_scalar::<_, String>(
        "SELECT id FROM customers WHERE is_admin = 1 LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    if existing.is_some() {
        return Ok(());
    }

    let name = env::var("ADMIN_NAME").unwrap_or_else(|_| "Super Admin".to_string());
    let phone = env::var("ADMIN_PHONE").unwrap_or_else(|_| "+00000000".to_string());
    let email = env::var("ADMIN_EMAIL").ok();

    if phone == "+00000000" {
        log::warn!("ADMIN_PHONE not set. Seeding admin with placeholder phone. Set ADMIN_PHONE in production.");
    }

    create_customer(pool, &name, &phone, email.as_deref(), "", true)
        .await
        .map_err(|err| sqlx::Error::Protocol(format!("admin seed failed: {err}")))?;

    Ok(())
}

pub async fn log_activity(
    pool: &SqlitePool,
    kind: &str,
    message: &str,
    account_id: Option<&str>,
    booking_id: Option<&str>,
) {
    let _ = sqlx::query(
        r#"INSERT INTO activities (id, kind, message, created_at, account_id, booking_id)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(kind)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(account_id)
    .bind(booking_id)
    .execute(pool)
    .await;
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    use sqlx::sqlite::SqlitePoolOptions;

    // One connection so the in-memory database is shared by every query.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    run_migrations(&pool).await.expect("migrations");
    pool
}
