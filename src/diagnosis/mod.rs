pub mod client;
mod handlers;

pub use client::{DiagnosisClient, HttpDiagnosisClient};
pub use handlers::{protected_routes, public_routes};
