pub mod bootstrap;
pub mod user_service;

pub use bootstrap::{ensure_admin, seed_demo_data};
pub use user_service::{UserError, UserService};
