pub mod api_client;
pub mod chat_session;
pub mod config;
pub mod connection_monitor;
pub mod credentials;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod search_manager;
