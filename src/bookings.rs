use chrono::{NaiveDate, Utc};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::{
    auth::new_id,
    error::{ApiError, ApiResult},
    identity::{fetch_customer, fetch_technician},
    models::{BookingRow, BookingStatus},
    slots::{slots_for_date, AvailabilityWindow},
};

// Legacy accepts any recognized non-pending status from any prior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionMode {
    Guarded,
    Legacy,
}

// Rescheduled re-enters the table alongside confirmed; completed and
// cancelled are terminal.
pub fn transition_allowed(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    match from {
        Pending => matches!(to, Confirmed | Cancelled | Rescheduled),
        Confirmed | Rescheduled => matches!(
            to,
            Confirmed | Completed | Cancelled | Rescheduled | Ontheway | Inprogress
        ),
        Ontheway | Inprogress => matches!(to, Completed | Cancelled),
        Completed | Cancelled => false,
    }
}

pub struct NewBooking<'a> {
    pub customer_id: &'a str,
    pub technician_id: &'a str,
    pub service_date: &'a str,
    pub service_time: &'a str,
    pub fee: Option<f64>,
    pub note: Option<&'a str>,
    pub technician_info: Option<&'a Value>,
}

// Nothing is reserved; concurrent creates for the same slot both
// succeed.
pub async fn create(pool: &SqlitePool, input: NewBooking<'_>) -> ApiResult<BookingRow> {
    if input.technician_id.trim().is_empty()
        || input.service_date.trim().is_empty()
        || input.service_time.trim().is_empty()
    {
        return Err(ApiError::Validation(
            "technicianId, serviceDate and serviceTime are required".to_string(),
        ));
    }
    let Some(fee) = input.fee else {
        return Err(ApiError::Validation("fee is required".to_string()));
    };

    let customer = fetch_customer(pool, input.customer_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("customer {} not found", input.customer_id)))?;
    let technician = fetch_technician(pool, input.technician_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("technician {} not found", input.technician_id))
        })?;

    let date = NaiveDate::parse_from_str(input.service_date, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("serviceDate must be YYYY-MM-DD".to_string()))?;
    let windows: Vec<AvailabilityWindow> =
        serde_json::from_str(&technician.availability).unwrap_or_default();
    match slots_for_date(&windows, date) {
        None => {
            return Err(ApiError::Validation(
                "technician unavailable on this weekday".to_string(),
            ))
        }
        Some(slots) if !slots.iter().any(|slot| slot.as_str() == input.service_time) => {
            return Err(ApiError::Validation(format!(
                "serviceTime {} is not an available slot on {}",
                input.service_time, input.service_date
            )))
        }
        Some(_) => {}
    }

    let technician_info = input
        .technician_info
        .cloned()
        .unwrap_or_else(|| {
            serde_json::json!({
                "name": technician.name,
                "phone": technician.phone,
                "email": technician.email,
                "serviceCategory": technician.service_category,
            })
        });
    let user_info = serde_json::json!({
        "name": customer.name,
        "phone": customer.phone,
        "email": customer.email,
        "address": customer.address,
    });

    let id = new_id();
    sqlx::query(
        r#"INSERT INTO bookings
           (id, customer_id, technician_id, service_date, service_time, fee, note, status,
            technician_info, user_info, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(&customer.id)
    .bind(&technician.id)
    .bind(input.service_date)
    .bind(input.service_time)
    .bind(fee)
    .bind(input.note)
    .bind(BookingStatus::Pending.as_str())
    .bind(technician_info.to_string())
    .bind(user_info.to_string())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    fetch(pool, &id).await
}

pub async fn fetch(pool: &SqlitePool, id: &str) -> ApiResult<BookingRow> {
    sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("booking {id} not found")))
}

pub async fn list_for_customer(pool: &SqlitePool, customer_id: &str) -> ApiResult<Vec<BookingRow>> {
    let rows = sqlx::query_as::<_, BookingRow>(
        "SELECT * FROM bookings WHERE customer_id = ? ORDER BY created_at DESC",
    )
    .bind(customer_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_for_technician(
    pool: &SqlitePool,
    technician_id: &str,
) -> ApiResult<Vec<BookingRow>> {
    let rows = sqlx::query_as::<_, BookingRow>(
        "SELECT * FROM bookings WHERE technician_id = ? ORDER BY created_at DESC",
    )
    .bind(technician_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn update_status(
    pool: &SqlitePool,
    id: &str,
    new_status: &str,
    mode: TransitionMode,
) -> ApiResult<BookingRow> {
    let target = BookingStatus::parse(new_status)
        .filter(BookingStatus::assignable)
        .ok_or_else(|| ApiError::Validation(format!("invalid status value '{new_status}'")))?;

    let booking = fetch(pool, id).await?;
    let current = parse_status(&booking)?;

    if mode == TransitionMode::Guarded && !transition_allowed(current, target) {
        return Err(ApiError::Conflict(format!(
            "cannot move booking from {} to {}",
            current.as_str(),
            target.as_str()
        )));
    }

    sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
        .bind(target.as_str())
        .bind(&booking.id)
        .execute(pool)
        .await?;

    fetch(pool, id).await
}

pub async fn cancel(pool: &SqlitePool, id: &str) -> ApiResult<BookingRow> {
    let booking = fetch(pool, id).await?;
    let current = parse_status(&booking)?;
    if current.is_terminal() {
        return Err(ApiError::Conflict(
            "cannot cancel a completed or already-cancelled booking".to_string(),
        ));
    }

    sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
        .bind(BookingStatus::Cancelled.as_str())
        .bind(&booking.id)
        .execute(pool)
        .await?;

    fetch(pool, id).await
}

// The new time is not re-checked against the technician's windows; the
// slot check happens only at creation.
pub async fn reschedule(
    pool: &SqlitePool,
    id: &str,
    service_date: &str,
    service_time: &str,
) -> ApiResult<BookingRow> {
    if service_date.trim().is_empty() || service_time.trim().is_empty() {
        return Err(ApiError::Validation(
            "serviceDate and serviceTime are required".to_string(),
        ));
    }

    let booking = fetch(pool, id).await?;
    let current = parse_status(&booking)?;
    if current.is_terminal() {
        return Err(ApiError::Conflict(
            "cannot reschedule a completed or cancelled booking".to_string(),
        ));
    }

    sqlx::query("UPDATE bookings SET service_date = ?, service_time = ?, status = ? WHERE id = ?")
        .bind(service_date)
        .bind(service_time)
        .bind(BookingStatus::Rescheduled.as_str())
        .bind(&booking.id)
        .execute(pool)
        .await?;

    fetch(pool, id).await
}

// Rating bounds are checked before any lookup. Completion is not a
// precondition.
pub async fn add_review(
    pool: &SqlitePool,
    id: &str,
    rating: Option<i64>,
    comment: Option<&str>,
) -> ApiResult<BookingRow> {
    let rating = rating.ok_or_else(|| ApiError::Validation("rating is required".to_string()))?;
    if !(1..=5).contains(&rating) {
        return Err(ApiError::Validation(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    let booking = fetch(pool, id).await?;
    sqlx::query(
        r#"UPDATE bookings
           SET review_rating = ?, review_comment = ?, review_created_at = ?, has_review = 1
           WHERE id = ?"#,
    )
    .bind(rating)
    .bind(comment)
    .bind(Utc::now().to_rfc3339())
    .bind(&booking.id)
    .execute(pool)
    .await?;

    let average: Option<f64> = sqlx::query_scalar(
        "SELECT AVG(review_rating) FROM bookings WHERE technician_id = ? AND has_review = 1",
    )
    .bind(&booking.technician_id)
    .fetch_one(pool)
    .await?;
    sqlx::query("UPDATE technicians SET rating = ? WHERE id = ?")
        .bind(average.unwrap_or(0.0))
        .bind(&booking.technician_id)
        .execute(pool)
        .await?;

    fetch(pool, id).await
}

// Administrative hard delete, no state-machine guard.
pub async fn delete(pool: &SqlitePool, id: &str) -> ApiResult<()> {
    let result = sqlx::query("DELETE FROM bookings WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("booking {id} not found")));
    }
    Ok(())
}

fn parse_status(booking: &BookingRow) -> ApiResult<BookingStatus> {
    BookingStatus::parse(&booking.status).ok_or_else(|| {
        ApiError::Upstream(format!(
            "booking {} carries unknown status '{}'",
            booking.id, booking.status
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::identity::{create_customer, create_technician, set_availability};
    use crate::slots::AvailabilityWindow;

    async fn seeded(pool: &SqlitePool) -> (String, String) {
        let customer = create_customer(pool, "Ana", "+200", Some("ana@example.com"), "5 Elm St", false)
            .await
            .unwrap();
        let technician =
            create_technician(pool, "Bo", "+201", "bo@example.com", "plumbing", 4, 1500.0)
                .await
                .unwrap();
        set_availability(
            pool,
            &technician.id,
            &[AvailabilityWindow {
                day: "monday".to_string(),
                start: "09:00".to_string(),
                end: "17:00".to_string(),
                slot_minutes: 60,
            }],
        )
        .await
        .unwrap();
        (customer.id, technician.id)
    }

    // 2026-09-07 is a Monday.
    async fn booked(pool: &SqlitePool) -> BookingRow {
        let (customer_id, technician_id) = seeded(pool).await;
        create(
            pool,
            NewBooking {
                customer_id: &customer_id,
                technician_id: &technician_id,
                service_date: "2026-09-07",
                service_time: "10:00",
                fee: Some(1500.0),
                note: Some("leaky sink"),
                technician_info: None,
            },
        )
        .await
        .unwrap()
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use BookingStatus::*;
        assert!(transition_allowed(Pending, Confirmed));
        assert!(transition_allowed(Pending, Cancelled));
        assert!(transition_allowed(Pending, Rescheduled));
        assert!(!transition_allowed(Pending, Completed));
        assert!(!transition_allowed(Pending, Ontheway));

        assert!(transition_allowed(Confirmed, Ontheway));
        assert!(transition_allowed(Confirmed, Inprogress));
        assert!(transition_allowed(Rescheduled, Completed));
        assert!(transition_allowed(Ontheway, Completed));
        assert!(!transition_allowed(Ontheway, Rescheduled));
        assert!(!transition_allowed(Inprogress, Confirmed));

        for target in [Pending, Confirmed, Completed, Cancelled, Ontheway, Inprogress, Rescheduled]
        {
            assert!(!transition_allowed(Completed, target));
            assert!(!transition_allowed(Cancelled, target));
        }
    }

    #[actix_web::test]
    async fn create_starts_pending_and_freezes_snapshots() {
        let pool = test_pool().await;
        let booking = booked(&pool).await;
        assert_eq!(booking.status, "pending");
        assert_eq!(booking.fee, 1500.0);

        let user_info: serde_json::Value = serde_json::from_str(&booking.user_info).unwrap();
        assert_eq!(user_info["name"], "Ana");
        assert_eq!(user_info["address"], "5 Elm St");
    }

    #[actix_web::test]
    async fn create_rejects_missing_fields_and_bad_slots() {
        let pool = test_pool().await;
        let (customer_id, technician_id) = seeded(&pool).await;

        let missing_fee = create(
            &pool,
            NewBooking {
                customer_id: &customer_id,
                technician_id: &technician_id,
                service_date: "2026-09-07",
                service_time: "10:00",
                fee: None,
                note: None,
                technician_info: None,
            },
        )
        .await;
        assert!(matches!(missing_fee, Err(ApiError::Validation(_))));

        // Tuesday: no window.
        let wrong_day = create(
            &pool,
            NewBooking {
                customer_id: &customer_id,
                technician_id: &technician_id,
                service_date: "2026-09-08",
                service_time: "10:00",
                fee: Some(1500.0),
                note: None,
                technician_info: None,
            },
        )
        .await;
        assert!(matches!(wrong_day, Err(ApiError::Validation(_))));

        let off_grid = create(
            &pool,
            NewBooking {
                customer_id: &customer_id,
                technician_id: &technician_id,
                service_date: "2026-09-07",
                service_time: "10:30",
                fee: Some(1500.0),
                note: None,
                technician_info: None,
            },
        )
        .await;
        assert!(matches!(off_grid, Err(ApiError::Validation(_))));

        let ghost_technician = create(
            &pool,
            NewBooking {
                customer_id: &customer_id,
                technician_id: "ghost",
                service_date: "2026-09-07",
                service_time: "10:00",
                fee: Some(1500.0),
                note: None,
                technician_info: None,
            },
        )
        .await;
        assert!(matches!(ghost_technician, Err(ApiError::NotFound(_))));
    }

    #[actix_web::test]
    async fn guarded_mode_enforces_the_table() {
        let pool = test_pool().await;
        let booking = booked(&pool).await;

        let skipped = update_status(&pool, &booking.id, "completed", TransitionMode::Guarded).await;
        assert!(matches!(skipped, Err(ApiError::Conflict(_))));

        let confirmed = update_status(&pool, &booking.id, "confirmed", TransitionMode::Guarded)
            .await
            .unwrap();
        assert_eq!(confirmed.status, "confirmed");

        let done = update_status(&pool, &booking.id, "completed", TransitionMode::Guarded)
            .await
            .unwrap();
        assert_eq!(done.status, "completed");

        let after_terminal =
            update_status(&pool, &booking.id, "confirmed", TransitionMode::Guarded).await;
        assert!(matches!(after_terminal, Err(ApiError::Conflict(_))));
    }

    #[actix_web::test]
    async fn legacy_mode_accepts_any_recognized_status() {
        let pool = test_pool().await;
        let booking = booked(&pool).await;

        let done = update_status(&pool, &booking.id, "completed", TransitionMode::Legacy)
            .await
            .unwrap();
        assert_eq!(done.status, "completed");

        let back = update_status(&pool, &booking.id, "ontheway", TransitionMode::Legacy)
            .await
            .unwrap();
        assert_eq!(back.status, "ontheway");

        let junk = update_status(&pool, &booking.id, "teleported", TransitionMode::Legacy).await;
        assert!(matches!(junk, Err(ApiError::Validation(_))));

        let to_pending = update_status(&pool, &booking.id, "pending", TransitionMode::Legacy).await;
        assert!(matches!(to_pending, Err(ApiError::Validation(_))));
    }

    #[actix_web::test]
    async fn cancel_conflicts_on_terminal_states_every_time() {
        let pool = test_pool().await;
        let booking = booked(&pool).await;

        let cancelled = cancel(&pool, &booking.id).await.unwrap();
        assert_eq!(cancelled.status, "cancelled");

        assert!(matches!(cancel(&pool, &booking.id).await, Err(ApiError::Conflict(_))));
        assert!(matches!(cancel(&pool, &booking.id).await, Err(ApiError::Conflict(_))));
    }

    #[actix_web::test]
    async fn reschedule_overwrites_both_fields_and_status() {
        let pool = test_pool().await;
        let booking = booked(&pool).await;
        update_status(&pool, &booking.id, "confirmed", TransitionMode::Guarded)
            .await
            .unwrap();

        let moved = reschedule(&pool, &booking.id, "2026-09-14", "11:00")
            .await
            .unwrap();
        assert_eq!(moved.status, "rescheduled");
        assert_eq!(moved.service_date, "2026-09-14");
        assert_eq!(moved.service_time, "11:00");

        let blank = reschedule(&pool, &booking.id, "", "11:00").await;
        assert!(matches!(blank, Err(ApiError::Validation(_))));

        cancel(&pool, &booking.id).await.unwrap();
        let after_cancel = reschedule(&pool, &booking.id, "2026-09-21", "09:00").await;
        assert!(matches!(after_cancel, Err(ApiError::Conflict(_))));
    }

    #[actix_web::test]
    async fn review_rating_bounds_are_checked_before_lookup() {
        let pool = test_pool().await;
        let booking = booked(&pool).await;

        for bad in [Some(0), Some(6), None] {
            let rejected = add_review(&pool, &booking.id, bad, Some("nope")).await;
            assert!(matches!(rejected, Err(ApiError::Validation(_))));
        }
        // Out-of-range rating on an unknown id still fails validation,
        // proving nothing was looked up first.
        let unknown = add_review(&pool, "ghost", Some(9), None).await;
        assert!(matches!(unknown, Err(ApiError::Validation(_))));

        let reviewed = add_review(&pool, &booking.id, Some(5), Some("great work"))
            .await
            .unwrap();
        assert_eq!(reviewed.has_review, 1);
        assert_eq!(reviewed.review_rating, Some(5));
    }

    #[actix_web::test]
    async fn reviews_feed_the_technician_aggregate_rating() {
        let pool = test_pool().await;
        let (customer_id, technician_id) = seeded(&pool).await;

        let first = create(
            &pool,
            NewBooking {
                customer_id: &customer_id,
                technician_id: &technician_id,
                service_date: "2026-09-07",
                service_time: "09:00",
                fee: Some(1500.0),
                note: None,
                technician_info: None,
            },
        )
        .await
        .unwrap();
        add_review(&pool, &first.id, Some(5), None).await.unwrap();

        let technician = crate::identity::fetch_technician(&pool, &technician_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(technician.rating, 5.0);

        let second = create(
            &pool,
            NewBooking {
                customer_id: &customer_id,
                technician_id: &technician_id,
                service_date: "2026-09-07",
                service_time: "10:00",
                fee: Some(1500.0),
                note: None,
                technician_info: None,
            },
        )
        .await
        .unwrap();
        add_review(&pool, &second.id, Some(3), None).await.unwrap();

        let technician = crate::identity::fetch_technician(&pool, &technician_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(technician.rating, 4.0);
    }

    #[actix_web::test]
    async fn delete_is_unguarded_and_reports_missing_rows() {
        let pool = test_pool().await;
        let booking = booked(&pool).await;
        update_status(&pool, &booking.id, "confirmed", TransitionMode::Guarded)
            .await
            .unwrap();

        delete(&pool, &booking.id).await.unwrap();
        assert!(matches!(fetch(&pool, &booking.id).await, Err(ApiError::NotFound(_))));
        assert!(matches!(delete(&pool, &booking.id).await, Err(ApiError::NotFound(_))));
    }

    #[actix_web::test]
    async fn listings_come_back_newest_first() {
        let pool = test_pool().await;
        let (customer_id, technician_id) = seeded(&pool).await;
        for time in ["09:00", "10:00", "11:00"] {
            create(
                &pool,
                NewBooking {
                    customer_id: &customer_id,
                    technician_id: &technician_id,
                    service_date: "2026-09-07",
                    service_time: time,
                    fee: Some(1500.0),
                    note: None,
                    technician_info: None,
                },
            )
            .await
            .unwrap();
        }

        let mine = list_for_customer(&pool, &customer_id).await.unwrap();
        assert_eq!(mine.len(), 3);
        assert!(mine.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));
        assert_eq!(mine[0].service_time, "11:00");

        let theirs = list_for_technician(&pool, &technician_id).await.unwrap();
        assert_eq!(theirs.len(), 3);
    }
}
