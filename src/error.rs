use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookingError {
    // ===== BLOCKING =====
    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Blocked by captcha")]
    Captcha,

    // ===== CALENDAR STAGE =====
    #[error("Website is down for maintenance")]
    Maintenance,

    #[error("Appointment booking not possible at this time")]
    BookingUnavailable,

    #[error("No appointments available for the selected locations")]
    NoAppointmentsForSelection,

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    // ===== SLOT LOST =====
    #[error("Appointment already taken: {0}")]
    SlotTaken(String),

    #[error("Reservation state conflict: {0}")]
    ReservationConflict(String),

    #[error("Booking page not reached: {0}")]
    BookingPageNotReached(String),

    // ===== TRANSIENT =====
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Form submission failed: {0}")]
    SubmissionFailed(String),

    // ===== FATAL FOR ATTEMPT =====
    #[error("No email arrived at inbox {inbox_id} within {secs}s")]
    EmailTimeout { inbox_id: String, secs: u64 },

    #[error("Writing essential field {field} failed: {reason}")]
    FieldFillFailed { field: String, reason: String },

    #[error("Verification email contained no code")]
    VerificationCodeMissing,

    // ===== SETUP / PLUMBING =====
    #[error("Invalid appointment link: {0}")]
    InvalidLink(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Mail provider error: {0}")]
    Mail(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Other error: {0}")]
    Other(String),
}

impl BookingError {
    /// Rate limiting or a captcha wall; the caller should back off for the
    /// cool-off interval instead of the regular retry interval.
    pub fn is_blocking(&self) -> bool {
        matches!(self, BookingError::RateLimited | BookingError::Captcha)
    }

    /// The slot is gone or unusable; move on to the next candidate.
    pub fn is_slot_lost(&self) -> bool {
        matches!(
            self,
            BookingError::SlotTaken(_)
                | BookingError::ReservationConflict(_)
                | BookingError::BookingPageNotReached(_)
        )
    }
}

impl From<reqwest::Error> for BookingError {
    fn from(e: reqwest::Error) -> Self {
        BookingError::Mail(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
