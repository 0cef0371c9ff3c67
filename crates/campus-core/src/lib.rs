pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::{CampusConfig, CategoryRule, ResponseKind};
pub use error::{CampusError, Result};
pub use store::{ConversationStore, FaqSource};
pub use types::*;
