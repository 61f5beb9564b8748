//! High-level flash operations
//!
//! This module provides the write/erase engine: the [`NvmFlash`] session
//! object, the page splitter and the page programming strategies.

mod context;
mod cursor;
mod shadow;
mod strategy;

pub use context::NvmFlash;
pub use cursor::{CursorState, PageChunk, PageChunks, WriteCursor};
pub use shadow::RowShadow;
pub use strategy::{AnyStrategy, DirectPage, ProgramParams, ProgramStrategy, WriteMode};
