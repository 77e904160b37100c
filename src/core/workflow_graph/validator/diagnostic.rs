use serde::Serialize;
use std::fmt;

/// Severity of a template validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

impl DiagnosticSeverity {
    fn rank(&self) -> u8 {
        match self {
            DiagnosticSeverity::Error => 2,
            DiagnosticSeverity::Warning => 1,
        }
    }
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "Error"),
            DiagnosticSeverity::Warning => write!(f, "Warning"),
        }
    }
}

/// One finding of the template validator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: DiagnosticSeverity,
    pub node_id: Option<String>,
    pub param_path: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inferred_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, DiagnosticSeverity::Error, message)
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, DiagnosticSeverity::Warning, message)
    }

    fn new(code: &'static str, severity: DiagnosticSeverity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            node_id: None,
            param_path: None,
            message: message.into(),
            inferred_type: None,
            expected_type: None,
            suggestion: None,
        }
    }

    pub fn at(mut self, node_id: impl Into<String>, param_path: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self.param_path = Some(param_path.into());
        self
    }

    pub fn on_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_types(mut self, inferred: impl Into<String>, expected: impl Into<String>) -> Self {
        self.inferred_type = Some(inferred.into());
        self.expected_type = Some(expected.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.code, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (suggestion: {})", suggestion)?;
        }
        Ok(())
    }
}

/// Accumulated findings of one validation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finding unless one with the same severity and message exists.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        let duplicate = self.diagnostics.iter().any(|existing| {
            existing.severity == diagnostic.severity && existing.message == diagnostic.message
        });
        if !duplicate {
            self.diagnostics.push(diagnostic);
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages(DiagnosticSeverity::Error)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages(DiagnosticSeverity::Warning)
    }

    fn messages(&self, severity: DiagnosticSeverity) -> Vec<String> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| d.message.clone())
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostics ordered by severity (errors first), then code, then node.
    pub fn sorted(&self) -> Vec<&Diagnostic> {
        let mut sorted: Vec<&Diagnostic> = self.diagnostics.iter().collect();
        sorted.sort_by(|a, b| {
            b.severity
                .rank()
                .cmp(&a.severity.rank())
                .then(a.code.cmp(b.code))
                .then(a.node_id.cmp(&b.node_id))
        });
        sorted
    }
}
