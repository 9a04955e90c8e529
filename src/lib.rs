pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;

pub use error::{AppError, AppResult};
pub use middleware::auth::AuthUser;
pub use response::ApiResponse;
