pub mod config;
pub mod connection;
pub mod coordinator;
pub mod debounce;
pub mod dispatcher;
pub mod engine;
pub mod env;
pub mod error;
pub mod history;
pub mod namespace;
pub mod presence;
pub mod rooms;
pub mod router;
