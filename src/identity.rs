use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    auth::new_id,
    error::{map_insert_err, ApiError, ApiResult},
    models::{is_service_category, CustomerRow, Role, TechnicianRow, TechnicianStatus},
    slots::{validate_windows, AvailabilityWindow},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_id: Option<String>,
    pub created_at: String,
}

impl Notification {
    pub fn message(text: impl Into<String>) -> Self {
        Notification {
            message: Some(text.into()),
            action: None,
            technician_id: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn action(action: impl Into<String>, technician_id: impl Into<String>) -> Self {
        Notification {
            message: None,
            action: Some(action.into()),
            technician_id: Some(technician_id.into()),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

// Role is derived, never stored, except for the customer admin flag.
#[derive(Debug, Clone)]
pub enum Account {
    Customer(CustomerRow),
    Technician(TechnicianRow),
}

impl Account {
    pub fn id(&self) -> &str {
        match self {
            Account::Customer(row) => &row.id,
            Account::Technician(row) => &row.id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Account::Customer(row) if row.is_admin != 0 => Role::Admin,
            Account::Customer(_) => Role::Customer,
            Account::Technician(_) => Role::Technician,
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        let raw = match self {
            Account::Customer(row) => &row.notifications,
            Account::Technician(row) => &row.notifications,
        };
        parse_mailbox(raw)
    }

    pub fn archived_notifications(&self) -> Vec<Notification> {
        let raw = match self {
            Account::Customer(row) => &row.archived_notifications,
            Account::Technician(row) => &row.archived_notifications,
        };
        parse_mailbox(raw)
    }
}

fn parse_mailbox(raw: &str) -> Vec<Notification> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn encode_mailbox(entries: &[Notification]) -> String {
    serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_string())
}

pub async fn fetch_customer(pool: &SqlitePool, id: &str) -> ApiResult<Option<CustomerRow>> {
    let row = sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn fetch_technician(pool: &SqlitePool, id: &str) -> ApiResult<Option<TechnicianRow>> {
    let row = sqlx::query_as::<_, TechnicianRow>("SELECT * FROM technicians WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

// The hint only picks the probe order; either store can satisfy the
// lookup.
pub async fn resolve(
    pool: &SqlitePool,
    id: &str,
    technician_hint: bool,
) -> ApiResult<Account> {
    if id.trim().is_empty() {
        return Err(ApiError::Unauthorized(
            "no account id could be determined".to_string(),
        ));
    }

    if technician_hint {
        if let Some(row) = fetch_technician(pool, id).await? {
            return Ok(Account::Technician(row));
        }
        if let Some(row) = fetch_customer(pool, id).await? {
            return Ok(Account::Customer(row));
        }
    } else {
        if let Some(row) = fetch_customer(pool, id).await? {
            return Ok(Account::Customer(row));
        }
        if let Some(row) = fetch_technician(pool, id).await? {
            return Ok(Account::Technician(row));
        }
    }

    Err(ApiError::NotFound(format!("account {id} not found")))
}

// Single enqueue path shared by the certificate and approval flows.
pub async fn push_notification(
    pool: &SqlitePool,
    account_id: &str,
    technician_hint: bool,
    entry: Notification,
) -> ApiResult<()> {
    let account = resolve(pool, account_id, technician_hint).await?;
    let mut active = account.notifications();
    active.push(entry);
    write_mailbox(pool, &account, &active, &account.archived_notifications()).await
}

pub async fn archive_all(pool: &SqlitePool, account_id: &str) -> ApiResult<Account> {
    let account = resolve(pool, account_id, false).await?;
    let active = account.notifications();
    let mut archived = account.archived_notifications();
    archived.extend(active);
    write_mailbox(pool, &account, &[], &archived).await?;
    resolve(pool, account_id, false).await
}

pub async fn purge_all(pool: &SqlitePool, account_id: &str) -> ApiResult<Account> {
    let account = resolve(pool, account_id, false).await?;
    write_mailbox(pool, &account, &[], &[]).await?;
    resolve(pool, account_id, false).await
}

async fn write_mailbox(
    pool: &SqlitePool,
    account: &Account,
    active: &[Notification],
    archived: &[Notification],
) -> ApiResult<()> {
    let table = match account {
        Account::Customer(_) => "customers",
        Account::Technician(_) => "technicians",
    };
    let query = format!(
        "UPDATE {table} SET notifications = ?, archived_notifications = ? WHERE id = ?"
    );
    sqlx::query(&query)
        .bind(encode_mailbox(active))
        .bind(encode_mailbox(archived))
        .bind(account.id())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn create_customer(
    pool: &SqlitePool,
    name: &str,
    phone: &str,
    email: Option<&str>,
    address: &str,
    is_admin: bool,
) -> ApiResult<CustomerRow> {
    if name.trim().is_empty() || phone.trim().is_empty() {
        return Err(ApiError::Validation("name and phone are required".to_string()));
    }

    let id = new_id();
    sqlx::query(
        r#"INSERT INTO customers (id, name, phone, email, address, is_admin, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(name.trim())
    .bind(phone.trim())
    .bind(email)
    .bind(address)
    .bind(is_admin as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .map_err(|err| map_insert_err(err, "phone or email"))?;

    fetch_customer(pool, &id)
        .await?
        .ok_or_else(|| ApiError::Upstream("customer insert did not persist".to_string()))
}

pub async fn create_technician(
    pool: &SqlitePool,
    name: &str,
    phone: &str,
    email: &str,
    service_category: &str,
    experience_years: i64,
    fee: f64,
) -> ApiResult<TechnicianRow> {
    if name.trim().is_empty() || phone.trim().is_empty() || email.trim().is_empty() {
        return Err(ApiError::Validation(
            "name, phone and email are required".to_string(),
        ));
    }
    if !is_service_category(service_category) {
        return Err(ApiError::Validation(format!(
            "unknown service category '{service_category}'"
        )));
    }

    let id = new_id();
    sqlx::query(
        r#"INSERT INTO technicians (id, name, phone, email, service_category, experience_years, fee, status, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(name.trim())
    .bind(phone.trim())
    .bind(email.trim())
    .bind(service_category)
    .bind(experience_years)
    .bind(fee)
    .bind(TechnicianStatus::Pending.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .map_err(|err| map_insert_err(err, "phone"))?;

    fetch_technician(pool, &id)
        .await?
        .ok_or_else(|| ApiError::Upstream("technician insert did not persist".to_string()))
}

pub async fn set_availability(
    pool: &SqlitePool,
    technician_id: &str,
    windows: &[AvailabilityWindow],
) -> ApiResult<TechnicianRow> {
    validate_windows(windows)?;
    let existing = fetch_technician(pool, technician_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("technician {technician_id} not found")))?;

    let encoded = serde_json::to_string(windows)
        .map_err(|err| ApiError::Upstream(err.to_string()))?;
    sqlx::query("UPDATE technicians SET availability = ? WHERE id = ?")
        .bind(encoded)
        .bind(&existing.id)
        .execute(pool)
        .await?;

    fetch_technician(pool, technician_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("technician {technician_id} not found")))
}

pub fn is_verified(certificate_url: Option<&str>) -> bool {
    certificate_url.map(str::trim).is_some_and(|url| !url.is_empty())
}

pub async fn set_certificate(
    pool: &SqlitePool,
    technician_id: &str,
    certificate_url: &str,
) -> ApiResult<TechnicianRow> {
    if certificate_url.trim().is_empty() {
        return Err(ApiError::Validation("certificate reference is required".to_string()));
    }
    let existing = fetch_technician(pool, technician_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("technician {technician_id} not found")))?;

    let verified = is_verified(Some(certificate_url));
    sqlx::query("UPDATE technicians SET certificate_url = ?, verified = ? WHERE id = ?")
        .bind(certificate_url.trim())
        .bind(verified as i64)
        .bind(&existing.id)
        .execute(pool)
        .await?;

    let admin_ids = sqlx::query_scalar::<_, String>("SELECT id FROM customers WHERE is_admin = 1")
        .fetch_all(pool)
        .await?;
    for admin_id in admin_ids {
        push_notification(
            pool,
            &admin_id,
            false,
            Notification::action("approve_technician", technician_id),
        )
        .await?;
    }

    fetch_technician(pool, technician_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("technician {technician_id} not found")))
}

// The out-of-band email send is the caller's concern.
pub async fn decide_technician(
    pool: &SqlitePool,
    technician_id: &str,
    decision: TechnicianStatus,
) -> ApiResult<TechnicianRow> {
    if !matches!(decision, TechnicianStatus::Approved | TechnicianStatus::Rejected) {
        return Err(ApiError::Validation(
            "decision must be 'approved' or 'rejected'".to_string(),
        ));
    }

    let existing = fetch_technician(pool, technician_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("technician {technician_id} not found")))?;

    let current = TechnicianStatus::parse(&existing.status);
    if current != Some(TechnicianStatus::Pending) {
        return Err(ApiError::Conflict(format!(
            "technician application is already {}",
            existing.status
        )));
    }

    sqlx::query("UPDATE technicians SET status = ? WHERE id = ?")
        .bind(decision.as_str())
        .bind(&existing.id)
        .execute(pool)
        .await?;

    let outcome = match decision {
        TechnicianStatus::Approved => "Your application has been approved.",
        _ => "Your application has been rejected.",
    };
    push_notification(pool, technician_id, true, Notification::message(outcome)).await?;

    fetch_technician(pool, technician_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("technician {technician_id} not found")))
}

// Pending and rejected applications have no activation state.
pub async fn set_active(
    pool: &SqlitePool,
    technician_id: &str,
    active: bool,
) -> ApiResult<TechnicianRow> {
    let existing = fetch_technician(pool, technician_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("technician {technician_id} not found")))?;

    match TechnicianStatus::parse(&existing.status) {
        Some(TechnicianStatus::Approved)
        | Some(TechnicianStatus::Active)
        | Some(TechnicianStatus::Inactive) => {}
        _ => {
            return Err(ApiError::Conflict(format!(
                "technician application is {}; activation requires approval",
                existing.status
            )))
        }
    }

    let status = if active {
        TechnicianStatus::Active
    } else {
        TechnicianStatus::Inactive
    };
    sqlx::query("UPDATE technicians SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(&existing.id)
        .execute(pool)
        .await?;

    fetch_technician(pool, technician_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("technician {technician_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::Role;

    #[actix_web::test]
    async fn admin_flag_wins_over_customer_role() {
        let pool = test_pool().await;
        let admin = create_customer(&pool, "Root", "+100", None, "HQ", true)
            .await
            .unwrap();

        let account = resolve(&pool, &admin.id, false).await.unwrap();
        assert_eq!(account.role(), Role::Admin);
    }

    #[actix_web::test]
    async fn hint_changes_probe_order_not_outcome() {
        let pool = test_pool().await;
        let customer = create_customer(&pool, "Ana", "+101", None, "", false)
            .await
            .unwrap();
        let technician =
            create_technician(&pool, "Bo", "+102", "bo@example.com", "plumbing", 4, 900.0)
                .await
                .unwrap();

        let a = resolve(&pool, &customer.id, true).await.unwrap();
        assert_eq!(a.role(), Role::Customer);
        let b = resolve(&pool, &technician.id, false).await.unwrap();
        assert_eq!(b.role(), Role::Technician);
    }

    #[actix_web::test]
    async fn resolve_rejects_blank_and_unknown_ids() {
        let pool = test_pool().await;
        assert!(matches!(
            resolve(&pool, "  ", false).await,
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            resolve(&pool, "ghost", false).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn mark_all_seen_twice_leaves_archive_unchanged() {
        let pool = test_pool().await;
        let customer = create_customer(&pool, "Ana", "+103", None, "", false)
            .await
            .unwrap();
        push_notification(&pool, &customer.id, false, Notification::message("one"))
            .await
            .unwrap();
        push_notification(&pool, &customer.id, false, Notification::message("two"))
            .await
            .unwrap();

        let after_first = archive_all(&pool, &customer.id).await.unwrap();
        assert!(after_first.notifications().is_empty());
        assert_eq!(after_first.archived_notifications().len(), 2);

        let after_second = archive_all(&pool, &customer.id).await.unwrap();
        assert!(after_second.notifications().is_empty());
        assert_eq!(after_second.archived_notifications().len(), 2);
    }

    #[actix_web::test]
    async fn purge_all_empties_both_lists() {
        let pool = test_pool().await;
        let customer = create_customer(&pool, "Ana", "+104", None, "", false)
            .await
            .unwrap();
        push_notification(&pool, &customer.id, false, Notification::message("one"))
            .await
            .unwrap();
        archive_all(&pool, &customer.id).await.unwrap();
        push_notification(&pool, &customer.id, false, Notification::message("two"))
            .await
            .unwrap();

        let purged = purge_all(&pool, &customer.id).await.unwrap();
        assert!(purged.notifications().is_empty());
        assert!(purged.archived_notifications().is_empty());
    }

    #[actix_web::test]
    async fn duplicate_phone_is_a_conflict() {
        let pool = test_pool().await;
        create_customer(&pool, "Ana", "+105", None, "", false)
            .await
            .unwrap();
        let dup = create_customer(&pool, "Eve", "+105", None, "", false).await;
        assert!(matches!(dup, Err(ApiError::Conflict(_))));
    }

    #[actix_web::test]
    async fn approval_decision_is_single_shot_and_notifies() {
        let pool = test_pool().await;
        let technician =
            create_technician(&pool, "Bo", "+106", "bo@example.com", "electrical", 2, 700.0)
                .await
                .unwrap();

        let approved = decide_technician(&pool, &technician.id, TechnicianStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.status, "approved");

        let account = resolve(&pool, &technician.id, true).await.unwrap();
        assert_eq!(account.notifications().len(), 1);

        let again = decide_technician(&pool, &technician.id, TechnicianStatus::Rejected).await;
        assert!(matches!(again, Err(ApiError::Conflict(_))));
    }

    #[actix_web::test]
    async fn activation_requires_an_approved_application() {
        let pool = test_pool().await;
        let technician =
            create_technician(&pool, "Bo", "+109", "bo@example.com", "cleaning", 3, 800.0)
                .await
                .unwrap();

        let premature = set_active(&pool, &technician.id, true).await;
        assert!(matches!(premature, Err(ApiError::Conflict(_))));

        decide_technician(&pool, &technician.id, TechnicianStatus::Approved)
            .await
            .unwrap();

        let active = set_active(&pool, &technician.id, true).await.unwrap();
        assert_eq!(active.status, "active");

        let inactive = set_active(&pool, &technician.id, false).await.unwrap();
        assert_eq!(inactive.status, "inactive");

        let back = set_active(&pool, &technician.id, true).await.unwrap();
        assert_eq!(back.status, "active");
    }

    #[actix_web::test]
    async fn certificate_upload_verifies_and_notifies_admins() {
        let pool = test_pool().await;
        let admin = create_customer(&pool, "Root", "+107", None, "HQ", true)
            .await
            .unwrap();
        let technician =
            create_technician(&pool, "Bo", "+108", "bo@example.com", "painting", 6, 1200.0)
                .await
                .unwrap();
        assert_eq!(technician.verified, 0);

        let updated = set_certificate(&pool, &technician.id, "certs/bo.pdf")
            .await
            .unwrap();
        assert_eq!(updated.verified, 1);

        let inbox = resolve(&pool, &admin.id, false).await.unwrap();
        let entries = inbox.notifications();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action.as_deref(), Some("approve_technician"));
        assert_eq!(entries[0].technician_id.as_deref(), Some(technician.id.as_str()));
    }
}
