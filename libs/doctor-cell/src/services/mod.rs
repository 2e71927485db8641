pub mod availability;
pub mod doctor;
pub mod review;

pub use availability::AvailabilityService;
pub use doctor::DoctorService;
pub use review::ReviewService;
