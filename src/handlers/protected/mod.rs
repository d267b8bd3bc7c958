// Endpoints behind the bearer-token guard. Each handler receives the caller
// as `Extension<AuthUser>`.

pub mod me;
pub mod settings;
pub mod tasks;
