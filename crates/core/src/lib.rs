pub mod analysis;
pub mod chat;
pub mod config;
pub mod data;
pub mod error;
pub mod fuzzy;
pub mod memory;
pub mod text;

pub use chat::{Message, MessageRole, Session, SessionSummary};
pub use config::Config;
pub use data::CollegeData;
pub use error::*;
pub use memory::MemoryCollegeData;
