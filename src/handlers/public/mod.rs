// Endpoints reachable without a bearer token: token acquisition, schema
// introspection and health.

pub mod auth;
pub mod health;
pub mod schema;
