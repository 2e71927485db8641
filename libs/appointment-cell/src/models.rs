use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const SYMPTOM_MAX_CHARS: usize = 500;
pub const CANCELLATION_WINDOW_HOURS: i64 = 24;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub time_id: Uuid,
    pub appointment_type: AppointmentType,
    pub appointment_status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    /// Opaque payment correlation ids; set once by the webhook for online
    /// appointments and never rewritten afterwards.
    pub stripe_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub symptom: String,
    pub cancel: bool,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Typed view over the persisted (status, payment_status, cancel)
    /// columns. `None` means the row holds a combination no transition can
    /// produce.
    pub fn state(&self) -> Option<AppointmentState> {
        AppointmentState::from_parts(
            self.appointment_status.clone(),
            self.payment_status.clone(),
            self.cancel,
        )
    }

    /// Cancellation eligibility: not already cancelled, consultation not
    /// concluded, and within the window measured from creation. The window
    /// boundary itself is still eligible.
    pub fn can_cancel(&self, now: DateTime<Utc>) -> bool {
        if self.cancel {
            return false;
        }
        if !matches!(
            self.appointment_status,
            AppointmentStatus::Pending | AppointmentStatus::Running
        ) {
            return false;
        }
        now <= self.created_at + Duration::hours(CANCELLATION_WINDOW_HOURS)
    }

    /// A refund is owed on cancellation only for a paid online appointment
    /// with a recorded payment intent.
    pub fn refund_intent(&self) -> Option<&str> {
        if self.appointment_type == AppointmentType::Online
            && self.payment_status == PaymentStatus::Paid
        {
            return self.payment_intent_id.as_deref();
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentType {
    Offline,
    Online,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Offline => write!(f, "Offline"),
            AppointmentType::Online => write!(f, "Online"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "Pending"),
            AppointmentStatus::Running => write!(f, "Running"),
            AppointmentStatus::Completed => write!(f, "Completed"),
            AppointmentStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Unpaid => write!(f, "unpaid"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

// ==============================================================================
// APPOINTMENT STATE MACHINE
// ==============================================================================

/// Explicit tagged state over the persisted (status × payment × cancel)
/// columns. Services build rows only through these constructors, so
/// combinations like a cancel flag without Cancelled status cannot be
/// written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentState {
    /// Booked, consultation not started (online appointments land here once
    /// payment is confirmed).
    AwaitingConsultation { payment: PaymentStatus },
    /// Consultation underway (offline appointments start here immediately).
    InConsultation { payment: PaymentStatus },
    Concluded { payment: PaymentStatus },
    Cancelled { payment: PaymentStatus },
}

impl AppointmentState {
    /// State of a freshly booked offline appointment: running, nothing owed
    /// through the payment provider.
    pub fn offline_created() -> Self {
        AppointmentState::InConsultation {
            payment: PaymentStatus::Unpaid,
        }
    }

    /// State written by the webhook after a confirmed online payment.
    pub fn online_confirmed() -> Self {
        AppointmentState::AwaitingConsultation {
            payment: PaymentStatus::Paid,
        }
    }

    /// Cancellation transition. Only reachable before the consultation has
    /// concluded; `refund_issued` records whether the provider accepted a
    /// refund for this appointment.
    pub fn cancelled(self, refund_issued: bool) -> Option<Self> {
        let payment = match self {
            AppointmentState::AwaitingConsultation { payment }
            | AppointmentState::InConsultation { payment } => payment,
            AppointmentState::Concluded { .. } | AppointmentState::Cancelled { .. } => return None,
        };

        let payment = if refund_issued {
            PaymentStatus::Refunded
        } else {
            payment
        };

        Some(AppointmentState::Cancelled { payment })
    }

    /// Reconstruct the typed state from stored columns. The cancel flag and
    /// Cancelled status move together; anything else is a corrupt row.
    pub fn from_parts(
        status: AppointmentStatus,
        payment: PaymentStatus,
        cancel: bool,
    ) -> Option<Self> {
        match (status, cancel) {
            (AppointmentStatus::Cancelled, true) => Some(AppointmentState::Cancelled { payment }),
            (AppointmentStatus::Cancelled, false) => None,
            (_, true) => None,
            (AppointmentStatus::Pending, false) => {
                Some(AppointmentState::AwaitingConsultation { payment })
            }
            (AppointmentStatus::Running, false) => {
                Some(AppointmentState::InConsultation { payment })
            }
            (AppointmentStatus::Completed, false) => {
                Some(AppointmentState::Concluded { payment })
            }
        }
    }

    /// Project back onto the persisted columns.
    pub fn into_parts(self) -> (AppointmentStatus, PaymentStatus, bool) {
        match self {
            AppointmentState::AwaitingConsultation { payment } => {
                (AppointmentStatus::Pending, payment, false)
            }
            AppointmentState::InConsultation { payment } => {
                (AppointmentStatus::Running, payment, false)
            }
            AppointmentState::Concluded { payment } => {
                (AppointmentStatus::Completed, payment, false)
            }
            AppointmentState::Cancelled { payment } => {
                (AppointmentStatus::Cancelled, payment, true)
            }
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub time_id: Uuid,
    pub appointment_type: AppointmentType,
    pub symptom: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    pub session_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentListQuery {
    pub patient_id: Option<Uuid>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid webhook metadata: {0}")]
    InvalidMetadata(String),

    #[error("This appointment cannot be cancelled")]
    CancellationNotAllowed,

    #[error("Appointment not found")]
    NotFound,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(String),
}
