use std::sync::Arc;

use sqlx::SqlitePool;

use crate::{bookings::TransitionMode, email::Mailer};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub mailer: Arc<dyn Mailer>,
    pub jwt_secret: String,
    pub transitions: TransitionMode,
}
