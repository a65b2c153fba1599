//! Clipboard adapters

mod arboard;
mod noop;

pub use arboard::ArboardClipboard;
pub use noop::NoopClipboard;
