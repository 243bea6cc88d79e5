//! Terminal user interface.
//!
//! The compositor core of the client:
//!
//! - **text**: UTF-8 metrics (decode, width, fit, display-unit stepping)
//! - **term**: double-buffered cell grid with diff-based flushing
//! - **window**: recursive binary layout tree of screen rectangles
//! - **compose**: per-tick frame composition from client state
//!
//! Dependency order: `text` feeds `term`; `text` and `window` feed
//! `compose`. Nothing outside `compose` writes to the terminal.

pub mod compose;
pub mod term;
pub mod text;
pub mod window;

pub use compose::Ui;
pub use window::{WindowId, WindowTree};
