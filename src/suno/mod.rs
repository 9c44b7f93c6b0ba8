pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod sessions;

pub use client::SunoClient;
pub use config::*;
pub use error::SunoError;
pub use models::*;
pub use poller::{poll_until_settled, StatusSource};
pub use sessions::SunoSessions;
