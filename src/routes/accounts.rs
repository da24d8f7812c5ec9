use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Serialize;

use crate::{
    auth::{bearer_validator, AuthUser},
    error::{ApiError, ApiResult},
    identity::{self, Account, Notification},
    state::AppState,
};

#[derive(Serialize)]
struct MailboxView {
    id: String,
    role: &'static str,
    notifications: Vec<Notification>,
    archived: Vec<Notification>,
}

impl From<Account> for MailboxView {
    fn from(account: Account) -> Self {
        MailboxView {
            id: account.id().to_string(),
            role: account.role().as_str(),
            notifications: account.notifications(),
            archived: account.archived_notifications(),
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/accounts")
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .service(
                web::resource("/{id}/notifications/seen").route(web::post().to(mark_all_seen)),
            )
            .service(
                web::resource("/{id}/notifications").route(web::delete().to(delete_all)),
            ),
    );
}

fn authorize_self_or_admin(auth: &AuthUser, account_id: &str) -> ApiResult<()> {
    if auth.id != account_id && !auth.is_admin {
        return Err(ApiError::Unauthorized(
            "only the account owner or an admin may manage this mailbox".to_string(),
        ));
    }
    Ok(())
}

async fn mark_all_seen(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let account_id = path.into_inner();
    authorize_self_or_admin(&auth, &account_id)?;
    let account = identity::archive_all(&state.db, &account_id).await?;
    Ok(HttpResponse::Ok().json(MailboxView::from(account)))
}

async fn delete_all(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let account_id = path.into_inner();
    authorize_self_or_admin(&auth, &account_id)?;
    let account = identity::purge_all(&state.db, &account_id).await?;
    Ok(HttpResponse::Ok().json(MailboxView::from(account)))
}
