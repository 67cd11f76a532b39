pub mod app;
pub mod auth;
pub mod booking;
pub mod config;
pub mod error;
pub mod gql;
pub mod middleware;
pub mod payment;
pub mod services;
pub mod state;

pub use state::AppState;
