use std::fmt::{self, Formatter};

/// Configuration for the AST printer and the code disassembler.
#[derive(Debug, Clone)]
pub struct PrettyOptions {
    /// Number of spaces to indent per nesting level.
    pub indent_size: usize,
    /// Append `@lo..hi` to every printed node.
    pub show_spans: bool,
    /// Append the resolved type of expressions when one is known.
    pub show_types: bool,
    /// Append the processing stage of every node.
    pub show_stages: bool,
}

impl Default for PrettyOptions {
    fn default() -> Self {
        Self {
            indent_size: 4,
            show_spans: false,
            show_types: false,
            show_stages: false,
        }
    }
}

impl PrettyOptions {
    pub fn verbose() -> Self {
        Self {
            show_spans: true,
            show_types: true,
            show_stages: true,
            ..Self::default()
        }
    }
}

/// Formatting context shared across pretty printers.
pub struct PrettyCtx<'a> {
    pub options: &'a PrettyOptions,
    indent: usize,
}

impl<'a> PrettyCtx<'a> {
    pub fn new(options: &'a PrettyOptions) -> Self {
        Self { options, indent: 0 }
    }

    pub fn write_indent(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:width$}", "", width = self.indent)
    }

    pub fn writeln(&self, f: &mut Formatter<'_>, line: impl AsRef<str>) -> fmt::Result {
        self.write_indent(f)?;
        writeln!(f, "{}", line.as_ref())
    }

    pub fn current_indent(&self) -> usize {
        self.indent
    }

    pub fn with_indent<F>(&mut self, mut f_closure: F) -> fmt::Result
    where
        F: FnMut(&mut Self) -> fmt::Result,
    {
        self.indent += self.options.indent_size;
        let result = f_closure(self);
        self.indent = self.indent.saturating_sub(self.options.indent_size);
        result
    }
}

/// Anything that prints itself as an indented listing.
pub trait PrettyPrintable {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result;
}

/// `Display` adapter over [`PrettyPrintable`].
pub struct PrettyDisplay<'a, T> {
    value: &'a T,
    options: PrettyOptions,
}

impl<'a, T> fmt::Display for PrettyDisplay<'a, T>
where
    T: PrettyPrintable,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut ctx = PrettyCtx::new(&self.options);
        self.value.fmt_pretty(f, &mut ctx)
    }
}

pub fn pretty<T>(value: &T, options: PrettyOptions) -> PrettyDisplay<'_, T>
where
    T: PrettyPrintable,
{
    PrettyDisplay { value, options }
}

pub fn escape_string(input: &str) -> String {
    input.chars().map(escape_char_in_string).collect()
}

fn escape_char_in_string(ch: char) -> String {
    match ch {
        '"' => "\\\"".to_string(),
        '\'' => "'".to_string(),
        other => escape_char(other),
    }
}

pub fn escape_char(ch: char) -> String {
    match ch {
        '\'' => "\\'".to_string(),
        '\\' => "\\\\".to_string(),
        '\n' => "\\n".to_string(),
        '\r' => "\\r".to_string(),
        '\t' => "\\t".to_string(),
        ch if ch.is_control() => format!("\\u{{{:x}}}", ch as u32),
        _ => ch.to_string(),
    }
}
