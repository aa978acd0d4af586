//! Non-fatal problems found while binding.
//!
//! Binding never fails: malformed directives are skipped and resolution
//! degrades to `undefined`. What was skipped is recorded here and logged.

use crate::parser::ParseErrorKind;
use ariadne::{Config, Label, Report, ReportKind, Source};
use std::fmt;
use std::ops::Range;
use sundew_dom::NodeId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagnosticKind {
    #[error("unknown directive `{0}`")]
    UnknownDirective(String),
    #[error(transparent)]
    Parse(#[from] ParseErrorKind),
    #[error("`$update` has no value binding to write back to")]
    NoUpdaterTarget,
    #[error("radio group `{0}` is already bound by another directive")]
    DuplicateRadioGroup(String),
}

impl DiagnosticKind {
    fn label(&self) -> &'static str {
        match self {
            Self::UnknownDirective(_) => "not a directive",
            Self::Parse(_) => "skipped",
            Self::NoUpdaterTarget => "needs `attr` value/checked, `html` or `rdo` on the same element",
            Self::DuplicateRadioGroup(_) => "ignored",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub node: NodeId,
    /// Attribute name, e.g. `sd-attr`.
    pub attribute: String,
    /// Attribute value the span points into.
    pub source: String,
    pub span: Range<usize>,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    /// Render as a colorless ariadne report.
    pub fn report(&self) -> String {
        let id = format!("{}@{}", self.attribute, self.node);
        let mut bytes = Vec::new();
        let written = Report::build(ReportKind::Warning, (id.as_str(), self.span.clone()))
            .with_config(Config::default().with_color(false))
            .with_message(self.kind.to_string())
            .with_label(Label::new((id.as_str(), self.span.clone())).with_message(self.kind.label()))
            .finish()
            .write((id.as_str(), Source::from(self.source.as_str())), &mut bytes);
        match written {
            Ok(()) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}=\"{}\" on {}: {}",
            self.attribute, self.source, self.node, self.kind
        )
    }
}

/// Capped diagnostic log kept on a registrar.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    limit: usize,
    dropped: usize,
}

impl Diagnostics {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
        if self.entries.len() < self.limit {
            self.entries.push(diagnostic);
        } else {
            self.dropped += 1;
        }
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Diagnostics logged but not kept because the cap was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}
