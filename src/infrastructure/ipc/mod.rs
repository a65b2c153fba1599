//! File-based IPC publishing
//!
//! The daemon exposes its state to menu-bar/overlay processes through
//! three small text artifacts. The daemon only ever writes them.

mod file_publisher;
mod paths;

pub use file_publisher::FilePublisher;
pub use paths::IpcPaths;
