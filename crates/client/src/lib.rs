//! CampusNet client engine.
//!
//! Headless state-synchronization core for the CampusNet career network:
//! session bootstrap against the hosted auth platform, the profile store
//! with debounced cloud mirroring, an optimistic social feed with an
//! offline outbox, and the toast notification queue.

pub mod ai;
pub mod api_client;
pub mod app;
pub mod config;
pub mod outbox;
pub mod realtime;
pub mod session;
pub mod storage;
pub mod stores;
pub mod sync;

pub use ai::AiClient;
pub use api_client::PlatformClient;
pub use app::App;
pub use config::Config;
pub use session::SessionManager;
pub use storage::Storage;
