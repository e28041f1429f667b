pub mod auth;

pub use auth::{auth_middleware, AuthEmployee, Claims, CurrentEmployee};
