use serde::{Deserialize, Serialize};

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: String,
    pub is_admin: i64,
    pub addresses: String,
    pub notifications: String,
    pub archived_notifications: String,
    pub created_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TechnicianRow {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub service_category: String,
    pub experience_years: i64,
    pub fee: f64,
    pub availability: String,
    pub status: String,
    pub certificate_url: Option<String>,
    pub verified: i64,
    pub rating: f64,
    pub notifications: String,
    pub archived_notifications: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingRow {
    pub id: String,
    pub customer_id: String,
    pub technician_id: String,
    pub service_date: String,
    pub service_time: String,
    pub fee: f64,
    pub note: Option<String>,
    pub status: String,
    pub review_rating: Option<i64>,
    pub review_comment: Option<String>,
    pub review_created_at: Option<String>,
    pub has_review: i64,
    pub technician_info: String,
    pub user_info: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Ontheway,
    Inprogress,
    Rescheduled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Ontheway => "ontheway",
            BookingStatus::Inprogress => "inprogress",
            BookingStatus::Rescheduled => "rescheduled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "ontheway" => Some(BookingStatus::Ontheway),
            "inprogress" => Some(BookingStatus::Inprogress),
            "rescheduled" => Some(BookingStatus::Rescheduled),
            _ => None,
        }
    }

    // `pending` exists only at creation and cannot be assigned back.
    pub fn assignable(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechnicianStatus {
    Pending,
    Approved,
    Rejected,
    Active,
    Inactive,
}

impl TechnicianStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TechnicianStatus::Pending => "pending",
            TechnicianStatus::Approved => "approved",
            TechnicianStatus::Rejected => "rejected",
            TechnicianStatus::Active => "active",
            TechnicianStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TechnicianStatus::Pending),
            "approved" => Some(TechnicianStatus::Approved),
            "rejected" => Some(TechnicianStatus::Rejected),
            "active" => Some(TechnicianStatus::Active),
            "inactive" => Some(TechnicianStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Technician,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Technician => "technician",
            Role::Customer => "customer",
        }
    }
}

pub const SERVICE_CATEGORIES: [&str; 6] = [
    "plumbing",
    "electrical",
    "cleaning",
    "carpentry",
    "painting",
    "appliance_repair",
];

pub fn is_service_category(value: &str) -> bool {
    SERVICE_CATEGORIES.contains(&value)
}
