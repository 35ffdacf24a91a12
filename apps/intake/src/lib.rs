pub mod api_client;
pub mod bulk;
pub mod config;
pub mod errors;
pub mod models;
pub mod notify;
pub mod screening;
pub mod state;
