use crate::arena::SlotId;
use crate::parser::Reference;
use crate::value::Value;
use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;
use sundew_dom::{Document, ListenerKey, NodeId};

/// Directive kinds in evaluation order: structural first, listeners last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DirectiveKind {
    If,
    For,
    Attr,
    Class,
    Html,
    Rdo,
    On,
}

impl DirectiveKind {
    pub const ALL: [DirectiveKind; 7] = [
        Self::If,
        Self::For,
        Self::Attr,
        Self::Class,
        Self::Html,
        Self::Rdo,
        Self::On,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::If => "if",
            Self::For => "for",
            Self::Attr => "attr",
            Self::Class => "class",
            Self::Html => "html",
            Self::Rdo => "rdo",
            Self::On => "on",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// `if` and `for` manage their own children; the registrar does not
    /// descend into them.
    pub fn owns_children(self) -> bool {
        matches!(self, Self::If | Self::For)
    }

    pub fn attribute(self, prefix: &str) -> String {
        format!("{prefix}{}", self.name())
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementId(pub(crate) SlotId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DirectiveId(pub(crate) SlotId);

#[derive(Debug, Clone)]
pub(crate) struct AttrBinding {
    pub name: String,
    pub reference: Rc<Reference>,
}

#[derive(Debug, Clone)]
pub(crate) struct ClassBinding {
    pub names: SmallVec<[String; 2]>,
    pub reference: Rc<Reference>,
}

/// Per-kind state kept between runs.
#[derive(Debug, Clone)]
pub(crate) enum DirectiveState {
    If,
    For {
        alias: String,
        /// Original children, captured at construction and restored on teardown.
        template: Rc<str>,
    },
    Attr(Vec<AttrBinding>),
    Class(Vec<ClassBinding>),
    Html(Rc<Reference>),
    Rdo {
        reference: Rc<Reference>,
        group: Option<String>,
    },
    On(Vec<(String, ListenerKey)>),
}

impl DirectiveState {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Self::If => DirectiveKind::If,
            Self::For { .. } => DirectiveKind::For,
            Self::Attr(_) => DirectiveKind::Attr,
            Self::Class(_) => DirectiveKind::Class,
            Self::Html(_) => DirectiveKind::Html,
            Self::Rdo { .. } => DirectiveKind::Rdo,
            Self::On(_) => DirectiveKind::On,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Directive {
    pub element: ElementId,
    pub state: DirectiveState,
}

/// Truthy values set the attribute to their text, falsy values remove it.
/// `value` and `checked` also drive the live control state; `value` on a
/// `select` only marks the matching option.
pub(crate) fn apply_attr<D: Document>(document: &mut D, node: NodeId, name: &str, value: &Value) {
    let selection = name == "value" && document.tag_name(node).as_deref() == Some("select");
    if value.is_truthy() {
        let text = value.to_text();
        if !selection {
            document.set_attribute(node, name, &text);
        }
        match name {
            "value" => document.set_value(node, &text),
            "checked" => document.set_checked(node, true),
            _ => {}
        }
    } else {
        if !selection {
            document.remove_attribute(node, name);
        }
        match name {
            "value" => document.set_value(node, ""),
            "checked" => document.set_checked(node, false),
            _ => {}
        }
    }
}

pub(crate) fn apply_class<D: Document>(document: &mut D, node: NodeId, names: &[String], value: &Value) {
    let on = value.is_truthy();
    for name in names {
        if on {
            document.add_class(node, name);
        } else {
            document.remove_class(node, name);
        }
    }
}

/// Check the radios whose value matches, uncheck the rest.
pub(crate) fn apply_rdo<D: Document>(document: &mut D, node: NodeId, group: Option<&str>, value: &Value) {
    let radios = match group {
        Some(group) => document.radio_group(group),
        None => vec![node],
    };
    let selected = if value.is_nullish() {
        None
    } else {
        Some(value.to_text())
    };
    for radio in radios {
        let checked = selected.as_deref() == Some(document.value(radio).as_str());
        document.set_checked(radio, checked);
    }
}
