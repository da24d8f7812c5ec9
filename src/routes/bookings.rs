use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    auth::{bearer_validator, AuthUser},
    bookings,
    db::log_activity,
    error::{ApiError, ApiResult},
    models::BookingRow,
    state::AppState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    technician_id: String,
    service_date: String,
    service_time: String,
    fee: Option<f64>,
    note: Option<String>,
    technician_info: Option<Value>,
}

#[derive(Deserialize)]
struct StatusRequest {
    status: String,
}

#[derive(Deserialize)]
struct CancelRequest {
    reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RescheduleRequest {
    service_date: Option<String>,
    service_time: Option<String>,
}

#[derive(Deserialize)]
struct ReviewRequest {
    rating: Option<i64>,
    comment: Option<String>,
}

#[derive(Serialize)]
struct ReviewView {
    rating: i64,
    comment: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingView {
    id: String,
    customer_id: String,
    technician_id: String,
    service_date: String,
    service_time: String,
    fee: f64,
    note: Option<String>,
    status: String,
    has_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    review: Option<ReviewView>,
    technician_info: Value,
    user_info: Value,
    created_at: String,
}

impl From<BookingRow> for BookingView {
    fn from(row: BookingRow) -> Self {
        let review = row.review_rating.map(|rating| ReviewView {
            rating,
            comment: row.review_comment.clone(),
            created_at: row.review_created_at.clone(),
        });
        BookingView {
            id: row.id,
            customer_id: row.customer_id,
            technician_id: row.technician_id,
            service_date: row.service_date,
            service_time: row.service_time,
            fee: row.fee,
            note: row.note,
            status: row.status,
            has_review: row.has_review != 0,
            review,
            technician_info: serde_json::from_str(&row.technician_info)
                .unwrap_or(Value::Null),
            user_info: serde_json::from_str(&row.user_info).unwrap_or(Value::Null),
            created_at: row.created_at,
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bookings")
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .service(web::resource("").route(web::post().to(create_booking)))
            .service(web::resource("/customer").route(web::get().to(list_customer_bookings)))
            .service(web::resource("/technician").route(web::get().to(list_technician_bookings)))
            .service(
                web::resource("/{id}")
                    .route(web::get().to(get_booking))
                    .route(web::delete().to(delete_booking)),
            )
            .service(web::resource("/{id}/status").route(web::patch().to(update_status)))
            .service(web::resource("/{id}/review").route(web::post().to(add_review)))
            .service(web::resource("/{id}/cancel").route(web::post().to(cancel_booking)))
            .service(web::resource("/{id}/reschedule").route(web::post().to(reschedule_booking))),
    );
}

async fn create_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<CreateBookingRequest>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    let booking = bookings::create(
        &state.db,
        bookings::NewBooking {
            customer_id: &auth.id,
            technician_id: &payload.technician_id,
            service_date: &payload.service_date,
            service_time: &payload.service_time,
            fee: payload.fee,
            note: payload.note.as_deref(),
            technician_info: payload.technician_info.as_ref(),
        },
    )
    .await?;

    log_activity(
        &state.db,
        "booking_created",
        &format!(
            "Booking requested for {} {}.",
            booking.service_date, booking.service_time
        ),
        Some(&auth.id),
        Some(&booking.id),
    )
    .await;

    Ok(HttpResponse::Created().json(BookingView::from(booking)))
}

async fn list_customer_bookings(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> ApiResult<HttpResponse> {
    let rows = bookings::list_for_customer(&state.db, &auth.id).await?;
    let views: Vec<BookingView> = rows.into_iter().map(BookingView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

async fn list_technician_bookings(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> ApiResult<HttpResponse> {
    let rows = bookings::list_for_technician(&state.db, &auth.id).await?;
    let views: Vec<BookingView> = rows.into_iter().map(BookingView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

async fn get_booking(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let booking = bookings::fetch(&state.db, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(BookingView::from(booking)))
}

async fn update_status(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<StatusRequest>,
) -> ApiResult<HttpResponse> {
    let booking_id = path.into_inner();
    let booking =
        bookings::update_status(&state.db, &booking_id, &payload.status, state.transitions)
            .await?;

    log_activity(
        &state.db,
        "booking_status_updated",
        &format!("Booking {} moved to {}.", booking.id, booking.status),
        Some(&auth.id),
        Some(&booking.id),
    )
    .await;

    Ok(HttpResponse::Ok().json(BookingView::from(booking)))
}

async fn cancel_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: Option<web::Json<CancelRequest>>,
) -> ApiResult<HttpResponse> {
    let booking_id = path.into_inner();
    let booking = bookings::cancel(&state.db, &booking_id).await?;

    let reason = payload
        .and_then(|body| body.into_inner().reason)
        .unwrap_or_else(|| "no reason given".to_string());
    log_activity(
        &state.db,
        "booking_cancelled",
        &format!("Booking {} cancelled ({reason}).", booking.id),
        Some(&auth.id),
        Some(&booking.id),
    )
    .await;

    Ok(HttpResponse::Ok().json(BookingView::from(booking)))
}

async fn reschedule_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<RescheduleRequest>,
) -> ApiResult<HttpResponse> {
    let booking_id = path.into_inner();
    let payload = payload.into_inner();
    let booking = bookings::reschedule(
        &state.db,
        &booking_id,
        payload.service_date.as_deref().unwrap_or(""),
        payload.service_time.as_deref().unwrap_or(""),
    )
    .await?;

    log_activity(
        &state.db,
        "booking_rescheduled",
        &format!(
            "Booking {} rescheduled to {} {}.",
            booking.id, booking.service_date, booking.service_time
        ),
        Some(&auth.id),
        Some(&booking.id),
    )
    .await;

    Ok(HttpResponse::Ok().json(BookingView::from(booking)))
}

async fn add_review(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<ReviewRequest>,
) -> ApiResult<HttpResponse> {
    let booking_id = path.into_inner();
    let payload = payload.into_inner();
    let booking = bookings::add_review(
        &state.db,
        &booking_id,
        payload.rating,
        payload.comment.as_deref(),
    )
    .await?;

    log_activity(
        &state.db,
        "booking_reviewed",
        &format!("Booking {} reviewed.", booking.id),
        Some(&auth.id),
        Some(&booking.id),
    )
    .await;

    Ok(HttpResponse::Ok().json(BookingView::from(booking)))
}

async fn delete_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    if !auth.is_admin {
        return Err(ApiError::Unauthorized(
            "booking deletion is an administrative operation".to_string(),
        ));
    }
    let booking_id = path.into_inner();
    bookings::delete(&state.db, &booking_id).await?;

    log_activity(
        &state.db,
        "booking_deleted",
        &format!("Booking {booking_id} hard-deleted."),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "deleted": booking_id })))
}
