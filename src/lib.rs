pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod server;

pub use backend::{GenerationBackend, StubBackend};
pub use config::{AppConfig, Cli};
pub use manager::ModelManager;
pub use protocol::GenerationRequest;
pub use server::build_router;
