pub mod app;
pub mod auth;
pub mod backend;
pub mod config;
pub mod coordinator;
pub mod dates;
pub mod errors;
pub mod handlers;
pub mod migrate;
pub mod models;
pub mod remote;
pub mod state;
pub mod stats;
pub mod storage;
pub mod streak;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use coordinator::Coordinator;
pub use state::AppState;
pub use storage::LocalStore;
