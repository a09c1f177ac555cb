use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Donor {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization_name: Option<String>,
    pub pmm: Option<String>,
    pub smm: Option<String>,
    pub vmm: Option<String>,
    pub total_donations: f64,
    pub total_pledges: f64,
    pub largest_gift: f64,
    pub last_gift_amount: f64,
    pub first_gift_date: Option<NaiveDate>,
    pub last_gift_date: Option<NaiveDate>,
    pub excluded: bool,
    pub deceased: bool,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub contact_preference: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub event_type: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub capacity: i64,
    pub focus: Option<String>,
    pub criteria_min_giving_level: Option<f64>,
    pub list_generation_date: Option<NaiveDate>,
    pub review_deadline: Option<NaiveDate>,
    pub invitation_date: Option<NaiveDate>,
    pub status: EventStatus,
    pub deleted: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EventDonorList {
    pub id: String,
    pub event_id: String,
    pub total_donors: i64,
    pub approved: i64,
    pub excluded: i64,
    pub pending: i64,
    pub auto_excluded: i64,
    pub review_status: ReviewStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EventDonor {
    pub id: String,
    pub donor_list_id: String,
    pub donor_id: String,
    pub status: DonorStatus,
    pub exclude_reason: Option<String>,
    pub reviewer_id: Option<String>,
    pub review_date: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub auto_excluded: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Per-entry review status. Any state may be written over any other at the
/// storage layer; the user-facing endpoint restricts edits to
/// Pending/Approved/Excluded and reserves AutoExcluded for automated rules.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DonorStatus {
    Pending,
    Approved,
    Excluded,
    AutoExcluded,
}

impl DonorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonorStatus::Pending => "Pending",
            DonorStatus::Approved => "Approved",
            DonorStatus::Excluded => "Excluded",
            DonorStatus::AutoExcluded => "AutoExcluded",
        }
    }

    pub fn parse(s: &str) -> Option<DonorStatus> {
        match s {
            "Pending" => Some(DonorStatus::Pending),
            "Approved" => Some(DonorStatus::Approved),
            "Excluded" => Some(DonorStatus::Excluded),
            "AutoExcluded" => Some(DonorStatus::AutoExcluded),
            _ => None,
        }
    }

    /// Statuses a reviewer may set directly.
    pub fn is_user_settable(&self) -> bool {
        !matches!(self, DonorStatus::AutoExcluded)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "completed")]
    Completed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<ReviewStatus> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "completed" => Some(ReviewStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Planning,
    ListGeneration,
    Review,
    Ready,
    Complete,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Planning => "Planning",
            EventStatus::ListGeneration => "ListGeneration",
            EventStatus::Review => "Review",
            EventStatus::Ready => "Ready",
            EventStatus::Complete => "Complete",
        }
    }

    pub fn parse(s: &str) -> Option<EventStatus> {
        match s {
            "Planning" => Some(EventStatus::Planning),
            "ListGeneration" => Some(EventStatus::ListGeneration),
            "Review" => Some(EventStatus::Review),
            "Ready" => Some(EventStatus::Ready),
            "Complete" => Some(EventStatus::Complete),
            _ => None,
        }
    }
}
