use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{admin_validator, AuthUser},
    db::log_activity,
    error::{ApiError, ApiResult},
    identity,
    models::TechnicianStatus,
    state::AppState,
};

#[derive(Deserialize)]
struct DecisionRequest {
    decision: String,
}

#[derive(Deserialize)]
struct ActivationRequest {
    active: bool,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .wrap(HttpAuthentication::bearer(admin_validator))
            .service(
                web::resource("/technicians/{id}/decision").route(web::post().to(decide)),
            )
            .service(
                web::resource("/technicians/{id}/activation").route(web::post().to(activate)),
            ),
    );
}

// Status change and mailbox entry commit first; the email failure is
// logged, never surfaced as a request failure.
async fn decide(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<DecisionRequest>,
) -> ApiResult<HttpResponse> {
    let technician_id = path.into_inner();
    let decision = TechnicianStatus::parse(&payload.decision)
        .filter(|status| {
            matches!(status, TechnicianStatus::Approved | TechnicianStatus::Rejected)
        })
        .ok_or_else(|| {
            ApiError::Validation("decision must be 'approved' or 'rejected'".to_string())
        })?;

    let technician = identity::decide_technician(&state.db, &technician_id, decision).await?;

    let (subject, body) = match decision {
        TechnicianStatus::Approved => (
            "Your application has been approved",
            "Welcome aboard! You can now receive bookings.",
        ),
        _ => (
            "Your application has been rejected",
            "Unfortunately your application was not accepted.",
        ),
    };
    if let Err(err) = state.mailer.send(&technician.email, subject, body) {
        log::warn!("Approval email to {} failed: {err}", technician.email);
    }

    log_activity(
        &state.db,
        "technician_decision",
        &format!("Technician {} application {}.", technician.id, technician.status),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "id": technician.id,
        "status": technician.status,
        "verified": technician.verified != 0,
    })))
}

async fn activate(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<ActivationRequest>,
) -> ApiResult<HttpResponse> {
    let technician_id = path.into_inner();
    let technician = identity::set_active(&state.db, &technician_id, payload.active).await?;

    log_activity(
        &state.db,
        "technician_activation",
        &format!("Technician {} set {}.", technician.id, technician.status),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "id": technician.id,
        "status": technician.status,
    })))
}
