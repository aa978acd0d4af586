use crate::parser::{Pointer, Reference};
use crate::scope::Scope;
use crate::value::{Object, Value};
use sundew_dom::{Document, NodeId};

/// Which piece of control state an updater copies into the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSource {
    /// `value` of an input, textarea or select.
    InputValue,
    /// `checked` of a checkbox.
    Checked,
    /// Markup of a contenteditable element.
    Content,
    /// Value of the checked radio in the element's group.
    RadioGroup,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Updater {
    pub source: ControlSource,
    pub target: Pointer,
}

impl Updater {
    pub fn read<D: Document>(&self, document: &D, node: NodeId) -> Value {
        match self.source {
            ControlSource::InputValue => Value::text(document.value(node)),
            ControlSource::Checked => Value::Bool(document.checked(node)),
            ControlSource::Content => Value::text(document.inner_html(node)),
            ControlSource::RadioGroup => {
                let radios = match document.attribute(node, "name") {
                    Some(group) => document.radio_group(&group),
                    None => vec![node],
                };
                radios
                    .into_iter()
                    .find(|radio| document.checked(*radio))
                    .map(|radio| Value::text(document.value(radio)))
                    .unwrap_or_default()
            }
        }
    }
}

/// One step of an `on` listener.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Caller(Pointer),
    Assigner { target: Pointer, value: Reference },
    Updater(Updater),
}

impl Action {
    /// Perform the action for an event on `node`.
    ///
    /// Values are resolved in `event_scope` (the element scope plus `$event`);
    /// writes land in `element_scope` or the root, except for paths rooted at
    /// `$event`.
    pub fn perform<D: Document>(
        &self,
        document: &D,
        node: NodeId,
        element_scope: &Scope,
        event_scope: &Scope,
        root: &Object,
    ) {
        match self {
            Action::Caller(pointer) => {
                pointer.resolve(event_scope, root);
            }
            Action::Assigner { target, value } => {
                let value = value.resolve(event_scope, root);
                if !target.assign(write_scope(target, element_scope, event_scope), root, value) {
                    log::debug!("assignment to `{:?}` on {node} has no target", target.operand);
                }
            }
            Action::Updater(updater) => {
                let value = updater.read(document, node);
                log::trace!("updating from {node}: {value:?}");
                if !updater.target.assign(write_scope(&updater.target, element_scope, event_scope), root, value) {
                    log::debug!("update from {node} has no target");
                }
            }
        }
    }
}

fn write_scope<'a>(target: &Pointer, element_scope: &'a Scope, event_scope: &'a Scope) -> &'a Scope {
    match target.path().and_then(|path| path.root_name()) {
        Some("$event") => event_scope,
        _ => element_scope,
    }
}
