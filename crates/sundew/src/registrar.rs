//! Binding session: scans the document for directives, owns the dependency
//! ledger and listener table, runs ticks and routes host events.

use crate::action::{Action, ControlSource, Updater};
use crate::config::BindConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::directive::{
    self, AttrBinding, ClassBinding, DirectiveId, DirectiveKind, DirectiveState, ElementId,
};
use crate::parser::{self, ActionSpec, DirectiveSpec, ListenerSpec};
use crate::registry::{Listener, Registry};
use crate::scope::Scope;
use crate::update_loop::{Snapshot, TickReport, Ticker};
use crate::value::{Object, Value};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;
use sundew_dom::{Document, Event, ListenerKey, NodeId};
use ulid::Ulid;

/// Identifies a binding session in log output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(Ulid);

impl SessionId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Directive attribute found on an element.
struct FoundDirective {
    kind: DirectiveKind,
    attribute: String,
    text: String,
}

/// What a directive run needs, copied out of the registry.
enum Run {
    If,
    For { alias: String, template: Rc<str> },
    Attr(String),
    Class(SmallVec<[String; 2]>),
    Html,
    Rdo(Option<String>),
}

pub struct Registrar<D: Document> {
    id: SessionId,
    document: D,
    root: Object,
    config: BindConfig,
    registry: Registry,
    diagnostics: Diagnostics,
    ticker: Ticker,
    ticks: u64,
}

impl<D: Document> Registrar<D> {
    /// A session with nothing registered yet.
    pub fn new(document: D, root: Object, config: BindConfig) -> Self {
        let id = SessionId::new();
        log::debug!("[{id}] session started, prefix `{}`", config.prefix);
        Self {
            id,
            document,
            root,
            registry: Registry::default(),
            diagnostics: Diagnostics::new(config.max_diagnostics),
            ticker: Ticker::new(config.interval_ms, config.start_paused),
            config,
            ticks: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    /// Host-side access, e.g. to simulate user input before dispatching.
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn into_document(self) -> D {
        self.document
    }

    pub fn root(&self) -> &Object {
        &self.root
    }

    pub fn config(&self) -> &BindConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn clear_diagnostics(&mut self) {
        self.diagnostics.clear();
    }

    pub fn element_count(&self) -> usize {
        self.registry.element_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.registry.dependency_count()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.listener_count()
    }

    pub fn is_registered(&self, node: NodeId) -> bool {
        self.registry.element_for(node).is_some()
    }

    /// Kinds bound on `node`, in evaluation order.
    pub fn directive_kinds(&self, node: NodeId) -> Vec<DirectiveKind> {
        let Some(element) = self.registry.element_for(node).and_then(|id| self.registry.element(id))
        else {
            return Vec::new();
        };
        element
            .directives
            .iter()
            .filter_map(|id| self.registry.directive(*id))
            .map(|directive| directive.state.kind())
            .collect()
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn pause(&mut self) {
        log::debug!("[{}] paused", self.id);
        self.ticker.pause();
    }

    pub fn resume(&mut self) {
        log::debug!("[{}] resumed", self.id);
        self.ticker.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.ticker.is_paused()
    }

    pub fn set_interval(&mut self, interval_ms: u64) {
        self.ticker.set_interval(interval_ms);
    }

    /// Feed elapsed host time and run every tick that became due.
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<TickReport> {
        let due = self.ticker.advance_by(elapsed_ms);
        (0..due).map(|_| self.tick()).collect()
    }

    /// Register `node` and its element descendants with `scope`.
    ///
    /// Already registered nodes are skipped. Children of nodes carrying `if`
    /// or `for` are left to those directives.
    pub fn register(&mut self, node: NodeId, scope: Scope) {
        if !self.document.is_element(node) {
            return;
        }
        if self.bind_element(node, &scope) {
            return;
        }
        for child in self.document.element_children(node) {
            self.register(child, scope.clone());
        }
    }

    /// Remove every bound element at or under `target`; returns how many.
    pub fn unregister(&mut self, target: NodeId) -> usize {
        let doomed: Vec<ElementId> = self
            .registry
            .elements()
            .filter(|(_, element)| self.document.contains(target, element.node))
            .map(|(id, _)| id)
            .collect();
        self.remove_elements(doomed)
    }

    /// Remove every bound element strictly under `node`.
    pub fn unregister_children(&mut self, node: NodeId) -> usize {
        let doomed: Vec<ElementId> = self
            .registry
            .elements()
            .filter(|(_, element)| element.node != node && self.document.contains(node, element.node))
            .map(|(id, _)| id)
            .collect();
        self.remove_elements(doomed)
    }

    /// Poll every dependency once, re-running directives whose value changed.
    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };
        let mut cursor = 0;
        while let Some((sequence, dependency)) = self.registry.next_dependency(cursor) {
            cursor = sequence + 1;
            report.polled += 1;
            let value = dependency.reference.resolve(&dependency.scope, &self.root);
            let changed = dependency
                .last
                .as_ref()
                .is_none_or(|last| !last.matches(&value));
            if !changed {
                continue;
            }
            let (directive, expression) = (dependency.directive, dependency.expression);
            log::trace!("[{}] dependency {sequence} changed to {value:?}", self.id);
            self.run_directive(directive, expression, &value);
            report.changed += 1;
            if let Some(dependency) = self.registry.dependency_mut(sequence) {
                dependency.last = Some(Snapshot::of(&value));
            }
        }
        log::trace!(
            "[{}] tick {} polled {} changed {}",
            self.id,
            report.tick,
            report.polled,
            report.changed
        );
        report
    }

    /// Run the actions of the listener registered under `key`; returns how
    /// many ran. Unknown keys (torn down listeners) are ignored.
    pub fn handle_event(&mut self, key: ListenerKey, event: &Event) -> usize {
        let Some(listener) = self.registry.listener(key) else {
            log::trace!("[{}] no listener for {key:?}", self.id);
            return 0;
        };
        let node = listener.node;
        let scope = listener.scope.clone();
        let actions = listener.actions.clone();
        log::debug!(
            "[{}] `{}` on {node} runs {} action(s) of directive {:?}",
            self.id,
            event.kind,
            actions.len(),
            listener.directive
        );
        let event_scope = scope.extend([("$event", self.event_value(event))]);
        for action in actions.iter() {
            action.perform(&self.document, node, &scope, &event_scope, &self.root);
        }
        actions.len()
    }

    /// Fire every listener the document holds for `node` and `kind`.
    pub fn dispatch(&mut self, node: NodeId, kind: &str) -> usize {
        let event = Event::new(kind, node);
        self.document
            .listeners(node, kind)
            .into_iter()
            .map(|key| self.handle_event(key, &event))
            .sum()
    }

    fn event_value(&self, event: &Event) -> Value {
        Value::Object(Object::from_entries([
            ("type", Value::text(&event.kind)),
            ("value", Value::text(self.document.value(event.target))),
            ("checked", Value::Bool(self.document.checked(event.target))),
        ]))
    }

    /// Construct directives for `node` unless it is already bound. Returns
    /// whether the node owns its children (`if`/`for`).
    fn bind_element(&mut self, node: NodeId, scope: &Scope) -> bool {
        let (found, unknown) = self.directive_attributes(node);
        let owns_children = found.iter().any(|found| found.kind.owns_children());
        if found.is_empty() && unknown.is_empty() {
            return false;
        }
        if self.registry.element_for(node).is_some() {
            return owns_children;
        }
        for attribute in unknown {
            let source = self.document.attribute(node, &attribute).unwrap_or_default();
            let span = 0..source.len();
            self.report(node, attribute.clone(), source, span, DiagnosticKind::UnknownDirective(attribute));
        }
        if found.is_empty() {
            return false;
        }

        let element = self.registry.insert_element(node, scope.clone());
        for found in found {
            let parsed = parser::parse_directive(found.kind, &found.text);
            for error in parsed.errors {
                self.report(node, found.attribute.clone(), found.text.clone(), error.span, error.kind.into());
            }
            if let Some(spec) = parsed.spec {
                self.construct(element, node, scope, spec, &found);
            }
        }
        log::debug!("[{}] registered {node}: {:?}", self.id, self.directive_kinds(node));
        owns_children
    }

    /// Directive attributes in evaluation order, plus prefixed names that
    /// are not directives.
    fn directive_attributes(&self, node: NodeId) -> (Vec<FoundDirective>, Vec<String>) {
        let mut found = Vec::new();
        let mut unknown = Vec::new();
        for attribute in self.document.attribute_names(node) {
            let Some(suffix) = attribute.strip_prefix(self.config.prefix.as_str()) else {
                continue;
            };
            match DirectiveKind::from_name(suffix) {
                Some(kind) => {
                    let text = self.document.attribute(node, &attribute).unwrap_or_default();
                    found.push(FoundDirective {
                        kind,
                        attribute,
                        text,
                    });
                }
                None => unknown.push(attribute),
            }
        }
        found.sort_by_key(|found| found.kind);
        (found, unknown)
    }

    fn construct(
        &mut self,
        element: ElementId,
        node: NodeId,
        scope: &Scope,
        spec: DirectiveSpec,
        found: &FoundDirective,
    ) {
        match spec {
            DirectiveSpec::If(reference) => {
                let id = self.registry.insert_directive(element, DirectiveState::If);
                self.registry.add_dependency(id, 0, Rc::new(reference), scope.clone());
            }
            DirectiveSpec::For { alias, source } => {
                let template: Rc<str> = self.document.inner_html(node).into();
                self.document.remove_children(node);
                let id = self
                    .registry
                    .insert_directive(element, DirectiveState::For { alias, template });
                self.registry.add_dependency(id, 0, Rc::new(source), scope.clone());
            }
            DirectiveSpec::Attr(specs) => {
                let bindings: Vec<AttrBinding> = specs
                    .into_iter()
                    .map(|spec| AttrBinding {
                        name: spec.name,
                        reference: Rc::new(spec.reference),
                    })
                    .collect();
                let references: Vec<_> = bindings.iter().map(|binding| binding.reference.clone()).collect();
                let id = self.registry.insert_directive(element, DirectiveState::Attr(bindings));
                for (expression, reference) in references.into_iter().enumerate() {
                    self.registry.add_dependency(id, expression, reference, scope.clone());
                }
            }
            DirectiveSpec::Class(specs) => {
                let bindings: Vec<ClassBinding> = specs
                    .into_iter()
                    .map(|spec| ClassBinding {
                        names: spec.names,
                        reference: Rc::new(spec.reference),
                    })
                    .collect();
                let references: Vec<_> = bindings.iter().map(|binding| binding.reference.clone()).collect();
                let id = self.registry.insert_directive(element, DirectiveState::Class(bindings));
                for (expression, reference) in references.into_iter().enumerate() {
                    self.registry.add_dependency(id, expression, reference, scope.clone());
                }
            }
            DirectiveSpec::Html(reference) => {
                let reference = Rc::new(reference);
                let id = self
                    .registry
                    .insert_directive(element, DirectiveState::Html(reference.clone()));
                self.registry.add_dependency(id, 0, reference, scope.clone());
            }
            DirectiveSpec::Rdo(reference) => {
                let reference = Rc::new(reference);
                let group = self.document.attribute(node, "name");
                let id = self.registry.insert_directive(
                    element,
                    DirectiveState::Rdo {
                        reference: reference.clone(),
                        group: group.clone(),
                    },
                );
                if let Some(group) = group {
                    if !self.registry.claim_radio_group(&group, id) {
                        let span = 0..found.text.len();
                        self.report(
                            node,
                            found.attribute.clone(),
                            found.text.clone(),
                            span,
                            DiagnosticKind::DuplicateRadioGroup(group),
                        );
                        return;
                    }
                }
                self.registry.add_dependency(id, 0, reference, scope.clone());
            }
            DirectiveSpec::On(listeners) => {
                let id = self.registry.insert_directive(element, DirectiveState::On(Vec::new()));
                let keys = self.attach_listeners(element, id, node, scope, listeners, found);
                if let Some(directive) = self.registry.directive_mut(id) {
                    directive.state = DirectiveState::On(keys);
                }
            }
        }
    }

    fn attach_listeners(
        &mut self,
        element: ElementId,
        directive: DirectiveId,
        node: NodeId,
        scope: &Scope,
        listeners: Vec<ListenerSpec>,
        found: &FoundDirective,
    ) -> Vec<(String, ListenerKey)> {
        let mut keys = Vec::new();
        for listener in listeners {
            let mut actions = Vec::with_capacity(listener.actions.len());
            for action in listener.actions {
                match action {
                    ActionSpec::Caller(pointer) => actions.push(Action::Caller(pointer)),
                    ActionSpec::Assigner { target, value } => {
                        actions.push(Action::Assigner { target, value })
                    }
                    ActionSpec::Updater => match self.updater_for(element) {
                        Some(updater) => actions.push(Action::Updater(updater)),
                        None => {
                            let span = update_span(&found.text);
                            self.report(
                                node,
                                found.attribute.clone(),
                                found.text.clone(),
                                span,
                                DiagnosticKind::NoUpdaterTarget,
                            );
                        }
                    },
                }
            }
            let actions: Rc<[Action]> = actions.into();
            for event in listener.events {
                let key = self.registry.add_listener(Listener {
                    directive,
                    node,
                    scope: scope.clone(),
                    actions: actions.clone(),
                });
                self.document.add_listener(node, &event, key);
                keys.push((event, key));
            }
        }
        keys
    }

    /// Pair `$update` with the element's value binding: checkbox `checked`,
    /// control `value`, contenteditable `html`, or radio `rdo`.
    fn updater_for(&self, element: ElementId) -> Option<Updater> {
        let bound = self.registry.element(element)?;
        let node = bound.node;
        let tag = self.document.tag_name(node)?;
        let input_type = self
            .document
            .attribute(node, "type")
            .map(|kind| kind.to_ascii_lowercase())
            .unwrap_or_default();
        let editable = self
            .document
            .attribute(node, "contenteditable")
            .is_some_and(|value| value != "false");

        for id in &bound.directives {
            let Some(directive) = self.registry.directive(*id) else {
                continue;
            };
            let candidate = match &directive.state {
                DirectiveState::Attr(bindings) => bindings.iter().find_map(|binding| {
                    let source = match binding.name.as_str() {
                        "checked" if tag == "input" && input_type == "checkbox" => ControlSource::Checked,
                        "value"
                            if matches!(tag.as_str(), "input" | "textarea" | "select")
                                && input_type != "checkbox"
                                && input_type != "radio" =>
                        {
                            ControlSource::InputValue
                        }
                        _ => return None,
                    };
                    Some((source, binding.reference.clone()))
                }),
                DirectiveState::Html(reference) if editable => {
                    Some((ControlSource::Content, reference.clone()))
                }
                DirectiveState::Rdo { reference, .. } if tag == "input" && input_type == "radio" => {
                    Some((ControlSource::RadioGroup, reference.clone()))
                }
                _ => None,
            };
            if let Some((source, reference)) = candidate {
                let target = reference.as_pointer().filter(|pointer| pointer.is_assignable())?;
                return Some(Updater {
                    source,
                    target: target.clone(),
                });
            }
        }
        None
    }

    fn run_directive(&mut self, id: DirectiveId, expression: usize, value: &Value) {
        let Some(directive) = self.registry.directive(id) else {
            return;
        };
        let Some(element) = self.registry.element(directive.element) else {
            return;
        };
        let node = element.node;
        let scope = element.scope.clone();
        let run = match &directive.state {
            DirectiveState::If => Run::If,
            DirectiveState::For { alias, template } => Run::For {
                alias: alias.clone(),
                template: template.clone(),
            },
            DirectiveState::Attr(bindings) => match bindings.get(expression) {
                Some(binding) => Run::Attr(binding.name.clone()),
                None => return,
            },
            DirectiveState::Class(bindings) => match bindings.get(expression) {
                Some(binding) => Run::Class(binding.names.clone()),
                None => return,
            },
            DirectiveState::Html(_) => Run::Html,
            DirectiveState::Rdo { group, .. } => Run::Rdo(group.clone()),
            DirectiveState::On(_) => return,
        };
        log::debug!("[{}] {} on {node} runs with {value:?}", self.id, directive.state.kind());

        match run {
            Run::If => self.run_if(node, &scope, value),
            Run::For { alias, template } => self.run_for(node, &scope, &alias, &template, value),
            Run::Attr(name) => directive::apply_attr(&mut self.document, node, &name, value),
            Run::Class(names) => directive::apply_class(&mut self.document, node, &names, value),
            Run::Html => self.run_html(node, &scope, value),
            Run::Rdo(group) => directive::apply_rdo(&mut self.document, node, group.as_deref(), value),
        }
    }

    fn run_if(&mut self, node: NodeId, scope: &Scope, value: &Value) {
        if value.is_truthy() {
            self.document.set_style(node, "display", None);
            match self.sibling(node, DirectiveKind::For) {
                // The `for` owns the children; polling it again renders them.
                Some(list) => self.registry.forget_snapshots(list),
                None => {
                    for child in self.document.element_children(node) {
                        self.register(child, scope.clone());
                    }
                }
            }
        } else {
            self.document.set_style(node, "display", Some("none"));
            self.unregister_children(node);
        }
    }

    fn run_for(&mut self, node: NodeId, scope: &Scope, alias: &str, template: &str, value: &Value) {
        self.unregister_children(node);
        self.document.remove_children(node);
        if self.hidden_by_if(node) {
            log::trace!("[{}] for on {node} is under a false if", self.id);
            return;
        }
        let Value::List(list) = value else {
            log::trace!("[{}] for on {node} got {}, rendering nothing", self.id, value.type_name());
            return;
        };
        for (index, item) in list.items().into_iter().enumerate() {
            let item_scope = scope.extend([
                (alias, item),
                ("$collection", value.clone()),
                ("$index", Value::from(index)),
            ]);
            for child in self.document.append_html(node, template) {
                self.register(child, item_scope.clone());
            }
        }
    }

    /// Another directive of `kind` on the element bound to `node`.
    fn sibling(&self, node: NodeId, kind: DirectiveKind) -> Option<DirectiveId> {
        let element = self.registry.element(self.registry.element_for(node)?)?;
        element.directives.iter().copied().find(|id| {
            self.registry
                .directive(*id)
                .is_some_and(|directive| directive.state.kind() == kind)
        })
    }

    /// Whether an `if` on the same element last evaluated falsy.
    fn hidden_by_if(&self, node: NodeId) -> bool {
        self.sibling(node, DirectiveKind::If)
            .and_then(|id| self.registry.snapshot_of(id))
            .is_some_and(|snapshot| !snapshot.is_truthy())
    }

    fn run_html(&mut self, node: NodeId, scope: &Scope, value: &Value) {
        self.unregister_children(node);
        let markup = if value.is_truthy() {
            value.to_text()
        } else {
            String::new()
        };
        self.document.set_inner_html(node, &markup);
        for child in self.document.element_children(node) {
            self.register(child, scope.clone());
        }
    }

    fn remove_elements(&mut self, doomed: Vec<ElementId>) -> usize {
        let mut removed = 0;
        let mut directives = HashSet::new();
        let mut templates = Vec::new();
        let mut released = Vec::new();
        for id in doomed {
            let Some(element) = self.registry.remove_element(id) else {
                continue;
            };
            removed += 1;
            for directive_id in element.directives {
                let Some(directive) = self.registry.remove_directive(directive_id) else {
                    continue;
                };
                directives.insert(directive_id);
                match directive.state {
                    DirectiveState::On(listeners) => {
                        for (event, key) in listeners {
                            self.document.remove_listener(element.node, &event, key);
                            self.registry.remove_listener(key);
                        }
                    }
                    DirectiveState::Rdo {
                        group: Some(group), ..
                    } => {
                        if self.registry.release_radio_group(&group, directive_id) {
                            released.push(group);
                        }
                    }
                    DirectiveState::For { template, .. } => templates.push((element.node, template)),
                    _ => {}
                }
            }
        }
        // Restore templates last so nested teardown still sees the rendered nodes.
        for (node, template) in templates {
            self.document.set_inner_html(node, &template);
        }
        let pruned = self.registry.remove_dependencies_of(&directives);
        for group in released {
            self.promote_radio_group(&group);
        }
        if removed > 0 {
            log::debug!(
                "[{}] unregistered {removed} element(s), pruned {pruned} dependencies",
                self.id
            );
        }
        removed
    }

    /// Hand a released group to a remaining `rdo` that was inert.
    fn promote_radio_group(&mut self, group: &str) {
        let candidate = self.registry.elements().find_map(|(_, element)| {
            element.directives.iter().find_map(|id| match &self.registry.directive(*id)?.state {
                DirectiveState::Rdo {
                    reference,
                    group: Some(name),
                } if name == group => Some((*id, reference.clone(), element.scope.clone())),
                _ => None,
            })
        });
        let Some((id, reference, scope)) = candidate else {
            return;
        };
        if self.registry.claim_radio_group(group, id) {
            self.registry.add_dependency(id, 0, reference, scope);
            log::debug!("[{}] rdo group {group} passed on", self.id);
        }
    }

    fn report(
        &mut self,
        node: NodeId,
        attribute: String,
        source: String,
        span: Range<usize>,
        kind: DiagnosticKind,
    ) {
        self.diagnostics.push(Diagnostic {
            node,
            attribute,
            source,
            span,
            kind,
        });
    }
}

fn update_span(text: &str) -> Range<usize> {
    match text.find("$update") {
        Some(start) => start..start + "$update".len(),
        None => 0..text.len(),
    }
}
