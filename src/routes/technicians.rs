use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::{bearer_validator, AuthUser},
    db::log_activity,
    error::{ApiError, ApiResult},
    identity,
    models::TechnicianRow,
    slots::{slots_for_date, AvailabilityWindow},
    state::AppState,
};

#[derive(Deserialize)]
struct SlotsQuery {
    date: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificateRequest {
    certificate_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TechnicianView {
    id: String,
    name: String,
    phone: String,
    email: String,
    service_category: String,
    experience_years: i64,
    fee: f64,
    availability: Vec<AvailabilityWindow>,
    status: String,
    verified: bool,
    rating: f64,
}

impl From<TechnicianRow> for TechnicianView {
    fn from(row: TechnicianRow) -> Self {
        TechnicianView {
            id: row.id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            service_category: row.service_category,
            experience_years: row.experience_years,
            fee: row.fee,
            availability: serde_json::from_str(&row.availability).unwrap_or_default(),
            status: row.status,
            verified: row.verified != 0,
            rating: row.rating,
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/technicians/{id}/slots").route(web::get().to(get_slots)))
        .service(
            web::scope("/technicians/{id}")
                .wrap(HttpAuthentication::bearer(bearer_validator))
                .service(web::resource("/availability").route(web::put().to(put_availability)))
                .service(web::resource("/certificate").route(web::put().to(put_certificate))),
        );
}

async fn get_slots(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<SlotsQuery>,
) -> ApiResult<HttpResponse> {
    let technician_id = path.into_inner();
    let technician = identity::fetch_technician(&state.db, &technician_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("technician {technician_id} not found")))?;

    let date = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("date must be YYYY-MM-DD".to_string()))?;
    let windows: Vec<AvailabilityWindow> =
        serde_json::from_str(&technician.availability).unwrap_or_default();

    let body = match slots_for_date(&windows, date) {
        Some(slots) => json!({
            "technicianId": technician.id,
            "date": query.date,
            "slots": slots,
        }),
        None => json!({
            "technicianId": technician.id,
            "date": query.date,
            "slots": [],
            "warning": "technician unavailable on this weekday",
        }),
    };

    Ok(HttpResponse::Ok().json(body))
}

fn authorize_self_or_admin(auth: &AuthUser, technician_id: &str) -> ApiResult<()> {
    if auth.id != technician_id && !auth.is_admin {
        return Err(ApiError::Unauthorized(
            "only the technician or an admin may change this profile".to_string(),
        ));
    }
    Ok(())
}

async fn put_availability(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<Vec<AvailabilityWindow>>,
) -> ApiResult<HttpResponse> {
    let technician_id = path.into_inner();
    authorize_self_or_admin(&auth, &technician_id)?;

    let technician =
        identity::set_availability(&state.db, &technician_id, &payload.into_inner()).await?;

    log_activity(
        &state.db,
        "availability_updated",
        &format!("Technician {} updated availability.", technician.id),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(TechnicianView::from(technician)))
}

async fn put_certificate(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<CertificateRequest>,
) -> ApiResult<HttpResponse> {
    let technician_id = path.into_inner();
    authorize_self_or_admin(&auth, &technician_id)?;

    let technician =
        identity::set_certificate(&state.db, &technician_id, &payload.certificate_url).await?;

    log_activity(
        &state.db,
        "certificate_registered",
        &format!("Technician {} registered a certificate.", technician.id),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(TechnicianView::from(technician)))
}
