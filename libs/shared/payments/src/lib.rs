pub mod models;
pub mod stripe;

pub use models::*;
pub use stripe::StripeClient;
