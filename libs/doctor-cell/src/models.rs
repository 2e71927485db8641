use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub designation: Vec<String>,
    pub specialization: Vec<String>,
    /// Consultation fee in whole currency units. Booking requires a positive
    /// fee; a doctor without one cannot be booked.
    pub fee: Option<u32>,
    pub meet_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn has_positive_fee(&self) -> bool {
        matches!(self.fee, Some(fee) if fee > 0)
    }
}

/// A bookable slot offered by a single doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableTime {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub time: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub reviewer_id: Uuid,
    pub doctor_id: Uuid,
    pub body: String,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub designation: Vec<String>,
    pub specialization: Vec<String>,
    pub fee: Option<u32>,
    pub meet_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub designation: Option<Vec<String>>,
    pub specialization: Option<Vec<String>>,
    pub fee: Option<u32>,
    pub meet_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSearchQuery {
    pub specialization: Option<String>,
    pub name: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailableTimeRequest {
    pub doctor_id: Uuid,
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReviewRequest {
    pub doctor_id: Uuid,
    pub body: String,
    pub rating: i16,
}

/// Explicit role-transition command: promote an existing patient account to
/// a doctor account. Issued by an admin, never implied by profile writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteToDoctorRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleTransition {
    pub user_id: Uuid,
    pub previous_role: String,
    pub new_role: String,
    pub promoted_by: Uuid,
    pub promoted_at: DateTime<Utc>,
}
