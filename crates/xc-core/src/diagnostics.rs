use crate::span::Span;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Severity {
    /// Nothing logged yet.
    None,
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    /// ERROR or worse fails the containing unit.
    pub fn is_serious(self) -> bool {
        self >= Severity::Error
    }

    fn label(self) -> &'static str {
        match self {
            Severity::None => "NONE",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl From<Severity> for miette::Severity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::None | Severity::Info => miette::Severity::Advice,
            Severity::Warning => miette::Severity::Warning,
            Severity::Error | Severity::Fatal => miette::Severity::Error,
        }
    }
}

/// Compiler error codes with their message templates. `{0}`, `{1}` are argument slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorCode {
    InternalError,
    NameCollision,
    NameUnresolvable,
    ReturnExpected,
    WrongType,
    WrongTypeArity,
    NotReachable,
    ReturnRequired,
    NotAType,
    NotAValue,
    NotConstant,
    NotAssignable,
    TupleTypeWrongArity,
    SwitchDefaultDuplicate,
    SwitchCaseDuplicate,
    MissingGotoLabel,
    MissingGotoTarget,
    IllegalContinueTarget,
    DuplicateLabel,
    InfiniteLoop,
}

impl ErrorCode {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCode::InternalError => "COMPILER-00",
            ErrorCode::NameCollision => "COMPILER-31",
            ErrorCode::NameUnresolvable => "COMPILER-38",
            ErrorCode::ReturnExpected => "COMPILER-41",
            ErrorCode::WrongType => "COMPILER-43",
            ErrorCode::WrongTypeArity => "COMPILER-44",
            ErrorCode::NotReachable => "COMPILER-46",
            ErrorCode::ReturnRequired => "COMPILER-49",
            ErrorCode::NotAType => "COMPILER-57",
            ErrorCode::NotAValue => "COMPILER-58",
            ErrorCode::NotConstant => "COMPILER-59",
            ErrorCode::NotAssignable => "COMPILER-60",
            ErrorCode::TupleTypeWrongArity => "COMPILER-66",
            ErrorCode::SwitchDefaultDuplicate => "COMPILER-75",
            ErrorCode::SwitchCaseDuplicate => "COMPILER-77",
            ErrorCode::MissingGotoLabel => "COMPILER-88",
            ErrorCode::MissingGotoTarget => "COMPILER-89",
            ErrorCode::IllegalContinueTarget => "COMPILER-90",
            ErrorCode::DuplicateLabel => "COMPILER-93",
            ErrorCode::InfiniteLoop => "COMPILER-155",
        }
    }

    pub fn template(self) -> &'static str {
        match self {
            ErrorCode::InternalError => "Internal compiler error: {0}",
            ErrorCode::NameCollision => "The name \"{0}\" is already declared in this scope.",
            ErrorCode::NameUnresolvable => "Unable to resolve name: \"{0}\".",
            ErrorCode::ReturnExpected => "Expected {0} return value(s); found {1}.",
            ErrorCode::WrongType => "Type mismatch: {0} expected, {1} found.",
            ErrorCode::WrongTypeArity => "Expected {0} value(s); found {1}.",
            ErrorCode::NotReachable => "Statement is not reachable.",
            ErrorCode::ReturnRequired => "Method \"{0}\" must return a value.",
            ErrorCode::NotAType => "\"{0}\" does not name a type.",
            ErrorCode::NotAValue => "\"{0}\" names a type, not a value.",
            ErrorCode::NotConstant => "A constant value is required.",
            ErrorCode::NotAssignable => "\"{0}\" is not an assignable variable.",
            ErrorCode::TupleTypeWrongArity => {
                "The tuple type specifies {1} field(s); {0} field(s) found."
            }
            ErrorCode::SwitchDefaultDuplicate => "The switch already has a default case.",
            ErrorCode::SwitchCaseDuplicate => "The case value {0} is already used in this switch.",
            ErrorCode::MissingGotoLabel => "The label \"{0}\" could not be found.",
            ErrorCode::MissingGotoTarget => {
                "The \"{0}\" statement does not have an enclosing statement to jump to."
            }
            ErrorCode::IllegalContinueTarget => {
                "The \"continue\" statement cannot target \"{0}\", which is not a loop."
            }
            ErrorCode::DuplicateLabel => "The label \"{0}\" is already in use.",
            ErrorCode::InfiniteLoop => "Infinite loop with an empty body.",
        }
    }

    /// Substitute the positional arguments into the template.
    pub fn format(self, args: &[String]) -> String {
        let mut message = self.template().to_string();
        for (index, arg) in args.iter().enumerate() {
            message = message.replace(&format!("{{{}}}", index), arg);
        }
        message
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: ErrorCode,
    pub args: Vec<String>,
    pub span: Option<Span>,
    pub suggestions: Vec<String>,
    pub source_context: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: ErrorCode) -> Self {
        Self {
            severity,
            code,
            args: Vec::new(),
            span: None,
            suggestions: Vec::new(),
            source_context: None,
        }
    }

    pub fn error(code: ErrorCode) -> Self {
        Self::new(Severity::Error, code)
    }

    pub fn warning(code: ErrorCode) -> Self {
        Self::new(Severity::Warning, code)
    }

    pub fn info(code: ErrorCode) -> Self {
        Self::new(Severity::Info, code)
    }

    pub fn fatal(code: ErrorCode) -> Self {
        Self::new(Severity::Fatal, code)
    }

    pub fn with_arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn with_args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        self.args.extend(args.into_iter().map(|arg| arg.to_string()));
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_source_context(mut self, context: impl Into<String>) -> Self {
        self.source_context = Some(context.into());
        self
    }

    pub fn message(&self) -> String {
        self.code.format(&self.args)
    }

    /// Plain single-line-plus-detail rendering, one entry per output line.
    pub fn render_plain(&self) -> Vec<String> {
        let context = self.source_context.as_deref().unwrap_or("compiler");
        let mut lines = vec![format!(
            "[{}] {}: {} ({})",
            context,
            self.severity.label(),
            self.message(),
            self.code
        )];

        if let Some(span) = &self.span {
            lines.push(format!("   at {}", span));
        }

        for suggestion in &self.suggestions {
            lines.push(format!("   suggestion: {}", suggestion));
        }

        lines
    }

    /// Hand the diagnostic to miette so that a front end can render it with source context.
    pub fn to_miette(&self) -> miette::MietteDiagnostic {
        let mut diagnostic = miette::MietteDiagnostic::new(self.message())
            .with_code(self.code.code())
            .with_severity(self.severity.into());
        if let Some(span) = self.span {
            diagnostic = diagnostic.with_label(miette::LabeledSpan::at(span, self.code.code()));
        }
        if !self.suggestions.is_empty() {
            diagnostic = diagnostic.with_help(self.suggestions.join("; "));
        }
        diagnostic
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.message(), self.code)?;

        if !self.suggestions.is_empty() {
            let hints = self.suggestions.join("; ");
            write!(f, " (hints: {})", hints)?;
        }

        Ok(())
    }
}

/// Sink for diagnostics. Shared by every phase, owned by none of them.
pub trait ErrorListener: Send + Sync {
    /// Record a diagnostic. Returns true when the caller should abandon what it is doing.
    fn log(&self, diagnostic: Diagnostic) -> bool;

    fn is_abort_desired(&self) -> bool {
        false
    }

    /// Worst severity logged so far.
    fn severity(&self) -> Severity {
        Severity::None
    }

    fn has_serious_errors(&self) -> bool {
        self.severity().is_serious()
    }

    fn has_error(&self, _code: ErrorCode) -> bool {
        false
    }

    fn is_silent(&self) -> bool {
        false
    }

    /// A listener for speculative work. Nothing logged to it reaches this listener.
    fn speculative(&self) -> Box<dyn ErrorListener> {
        Box::new(BlackholeListener)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BlackholeListener;

impl ErrorListener for BlackholeListener {
    fn log(&self, _diagnostic: Diagnostic) -> bool {
        false
    }

    fn is_silent(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
struct ErrorListState {
    diagnostics: Vec<Diagnostic>,
    severity: Option<Severity>,
    serious: usize,
}

/// Collecting listener. Clones share the same underlying list.
#[derive(Debug, Clone)]
pub struct ErrorList {
    state: Arc<Mutex<ErrorListState>>,
    max_errors: usize,
}

impl Default for ErrorList {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ErrorList {
    /// `max_errors` of 0 means unlimited.
    pub fn new(max_errors: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(ErrorListState::default())),
            max_errors,
        }
    }

    fn with_state<R>(&self, func: impl FnOnce(&mut ErrorListState) -> R) -> R {
        match self.state.lock() {
            Ok(mut state) => func(&mut state),
            Err(poison) => {
                // Recover from a poisoned lock by taking the inner value
                let mut state = poison.into_inner();
                func(&mut state)
            }
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.with_state(|state| state.diagnostics.clone())
    }

    pub fn len(&self) -> usize {
        self.with_state(|state| state.diagnostics.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, code: ErrorCode) -> usize {
        self.with_state(|state| state.diagnostics.iter().filter(|d| d.code == code).count())
    }

    pub fn clear(&self) {
        self.with_state(|state| *state = ErrorListState::default());
    }

    /// Independent list for speculative work; see [`BranchedErrorList::merge`].
    pub fn branch(&self) -> BranchedErrorList {
        BranchedErrorList {
            parent: self.clone(),
            branch: ErrorList::new(self.max_errors),
        }
    }

    pub fn extend(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.log(diagnostic);
        }
    }
}

impl ErrorListener for ErrorList {
    fn log(&self, diagnostic: Diagnostic) -> bool {
        let max_errors = self.max_errors;
        self.with_state(|state| {
            let severity = diagnostic.severity;
            state.severity = Some(state.severity.map_or(severity, |s| s.max(severity)));
            if severity.is_serious() {
                state.serious += 1;
            }
            state.diagnostics.push(diagnostic);
            severity == Severity::Fatal || (max_errors > 0 && state.serious >= max_errors)
        })
    }

    fn is_abort_desired(&self) -> bool {
        let max_errors = self.max_errors;
        self.with_state(|state| {
            state.severity == Some(Severity::Fatal)
                || (max_errors > 0 && state.serious >= max_errors)
        })
    }

    fn severity(&self) -> Severity {
        self.with_state(|state| state.severity.unwrap_or(Severity::None))
    }

    fn has_error(&self, code: ErrorCode) -> bool {
        self.with_state(|state| state.diagnostics.iter().any(|d| d.code == code))
    }

    fn speculative(&self) -> Box<dyn ErrorListener> {
        Box::new(self.branch())
    }
}

/// A child list whose diagnostics reach the parent only when merged.
#[derive(Debug, Clone)]
pub struct BranchedErrorList {
    parent: ErrorList,
    branch: ErrorList,
}

impl BranchedErrorList {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.branch.diagnostics()
    }

    /// Commit the branch into its parent.
    pub fn merge(self) -> ErrorList {
        self.parent.extend(self.branch.diagnostics());
        self.parent
    }
}

impl ErrorListener for BranchedErrorList {
    fn log(&self, diagnostic: Diagnostic) -> bool {
        self.branch.log(diagnostic)
    }

    fn is_abort_desired(&self) -> bool {
        self.branch.is_abort_desired()
    }

    fn severity(&self) -> Severity {
        self.branch.severity()
    }

    fn has_error(&self, code: ErrorCode) -> bool {
        self.branch.has_error(code)
    }

    fn speculative(&self) -> Box<dyn ErrorListener> {
        Box::new(self.branch.branch())
    }
}
