//! Shared types for the tilegrid workspace.

mod types;

pub use types::{GridCoord, Transform};
