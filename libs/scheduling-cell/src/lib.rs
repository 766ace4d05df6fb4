pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

pub use handlers::AppState;
pub use models::*;
pub use router::*;
