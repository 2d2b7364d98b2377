//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (config loading, detector setup)
//! - `input` - Transaction file loading (CSV, JSON)
//! - `detect` - Pattern detection command
//! - `summary` - Recurring summary command
//! - `normalize` - Merchant normalization command

pub mod core;
pub mod detect;
pub mod input;
pub mod normalize;
pub mod summary;

// Re-export command functions for main.rs
pub use self::core::*;
pub use detect::*;
pub use input::*;
pub use normalize::*;
pub use summary::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
