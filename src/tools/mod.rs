//! External tool adapters: profile, statistics and recent-activity lookups
//! over the user directory.

pub mod adapters;
pub mod directory;
pub mod errors;

pub use adapters::{tool_definitions, ToolAdapters, ToolKind, ToolOutput, DEFAULT_ACTIVITY_LIMIT};
pub use directory::{ActivityEntry, UserDirectory, UserProfile, UserStats};
pub use errors::ToolError;
