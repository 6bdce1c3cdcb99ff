mod chat;
mod health;
mod root;

pub use chat::{ChatError, ErrorResponse, chat_handler};
pub use health::{HealthResponse, health_handler};
pub use root::root_handler;
