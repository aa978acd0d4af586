//! Host document capability interface for the sundew binding engine.
//!
//! The engine never touches a concrete DOM. Everything it needs from the host
//! (tree walking, attributes, classes, markup, form controls, listeners) goes
//! through the [`Document`] trait. [`MemoryDocument`] is a complete
//! in-memory host used by tests and headless rendering.

pub mod document;
pub mod markup;
pub mod memory;

pub use document::{Document, Event, ListenerKey, NodeId};
pub use markup::{MarkupError, MarkupNode, parse_fragment};
pub use memory::MemoryDocument;
