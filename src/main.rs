use std::{env, sync::Arc};

use actix_web::{middleware, web, App, HttpServer};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

use handygo::bookings::TransitionMode;
use handygo::email::mailer_from_env;
use handygo::state::AppState;
use handygo::{db, routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/handygo.db".to_string());
    db::ensure_sqlite_dir(&db_url)?;

    let connect_options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    db::run_migrations(&pool).await?;
    db::seed_admin(&pool).await?;

    let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string());
    if jwt_secret == "dev-secret" {
        log::warn!("JWT_SECRET not set. Using the development secret. Set JWT_SECRET in production.");
    }

    let transitions = match env::var("STRICT_TRANSITIONS").as_deref() {
        Ok("false") | Ok("0") => TransitionMode::Legacy,
        _ => TransitionMode::Guarded,
    };

    let state = AppState {
        db: pool.clone(),
        mailer: Arc::from(mailer_from_env()),
        jwt_secret,
        transitions,
    };

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);

    let address = format!("0.0.0.0:{port}");
    log::info!("Starting Handygo on http://{address}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
            .configure(routes::bookings::configure)
            .configure(routes::technicians::configure)
            .configure(routes::accounts::configure)
            .configure(routes::admin::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
