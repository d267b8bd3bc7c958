pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod registry;
pub mod routes;
pub mod services;
pub mod state;
pub mod types;

pub use routes::app;
pub use state::AppState;
