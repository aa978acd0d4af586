//! Attribute-directive data binding.
//!
//! Elements opt in through prefixed attributes (`sd-if`, `sd-for`,
//! `sd-attr`, `sd-class`, `sd-html`, `sd-rdo`, `sd-on`). A [`Registrar`]
//! scans a document subtree, records one dependency per bound expression and
//! re-runs a directive whenever a poll of its expression sees a new value.
//!
//! ```
//! use sundew::{Object, Value, dom::MemoryDocument};
//!
//! let document = MemoryDocument::parse(r#"<p id="greeting" sd-html="name"></p>"#).unwrap();
//! let root = Object::new();
//! root.insert("name", "world");
//!
//! let mut registrar = sundew::bind(document, None, Some(root.clone()));
//! registrar.tick();
//!
//! let greeting = registrar.document().find_by_id("greeting").unwrap();
//! assert_eq!(registrar.document().text_content(greeting), "world");
//!
//! root.insert("name", Value::from("sundew"));
//! registrar.tick();
//! assert_eq!(registrar.document().text_content(greeting), "sundew");
//! ```

pub mod action;
pub mod arena;
pub mod config;
pub mod diagnostics;
pub mod directive;
pub mod parser;
pub mod reference;
pub mod registrar;
mod registry;
pub mod scope;
pub mod update_loop;
pub mod value;

pub use sundew_dom as dom;

pub use config::{BindConfig, ConfigError};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use directive::DirectiveKind;
pub use registrar::{Registrar, SessionId};
pub use scope::{Scope, globals};
pub use update_loop::{TickReport, Ticker};
pub use value::{Call, Function, List, Object, Value};

use sundew_dom::{Document, NodeId};

/// Start a binding session with the default configuration.
///
/// `target` defaults to the document body, `root` to [`globals`]. Nothing is
/// rendered until the first tick.
pub fn bind<D: Document>(document: D, target: Option<NodeId>, root: Option<Object>) -> Registrar<D> {
    bind_with_config(document, target, root, BindConfig::default())
}

pub fn bind_with_config<D: Document>(
    document: D,
    target: Option<NodeId>,
    root: Option<Object>,
    config: BindConfig,
) -> Registrar<D> {
    let mut registrar = Registrar::new(document, root.unwrap_or_else(globals), config);
    let target = target.unwrap_or_else(|| registrar.document().body());
    registrar.register(target, Scope::new());
    registrar
}
