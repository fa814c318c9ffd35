use std::collections::BTreeSet;

use super::{Html, escape_into};

/// Minimal placeholder template over a trusted source string.
///
/// The source must be a compile-time constant, which is what makes the
/// literal parts of the output trustworthy. Two placeholder forms are
/// recognised:
///
/// - `{{.}}`: the data value passed to execution, escaped.
/// - `{{Name}}`: the output of the zero-argument function bound to
///   `Name` at execution time, escaped.
///
/// Parsing records every declared function name; execution requires the
/// provided bindings to match that set exactly.
#[derive(Debug, Clone)]
pub struct Template {
    segments: Vec<Segment>,
    funcs: BTreeSet<&'static str>,
}

/// Function bindings for [`Template::execute`], name to producer.
pub type FuncMap = std::collections::BTreeMap<&'static str, Box<dyn Fn() -> String + Send + Sync>>;

#[derive(Debug, Clone)]
enum Segment {
    Literal(&'static str),
    Data,
    Func(&'static str),
}

impl Template {
    /// Parse a template from a trusted constant source.
    pub fn parse(source: &'static str) -> Result<Template, TemplateError> {
        let mut segments = Vec::new();
        let mut funcs = BTreeSet::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Literal(&rest[..open]));
            }
            let tail = &rest[open + 2..];
            let close = tail.find("}}").ok_or(TemplateError::Unterminated)?;
            let name = tail[..close].trim();
            if name == "." {
                segments.push(Segment::Data);
            } else if is_identifier(name) {
                funcs.insert(name);
                segments.push(Segment::Func(name));
            } else {
                return Err(TemplateError::InvalidName(name.to_string()));
            }
            rest = &tail[close + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest));
        }

        Ok(Template { segments, funcs })
    }

    /// Names of the functions the template declares.
    pub fn funcs(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.funcs.iter().copied()
    }

    /// Render the template against `data` and the function bindings.
    ///
    /// The bindings must cover the declared names exactly: a declared name
    /// without a binding and a binding without a declaration are both
    /// errors, and nothing is rendered.
    pub fn execute(&self, data: &str, funcs: &FuncMap) -> Result<Html, TemplateError> {
        for name in funcs.keys() {
            if !self.funcs.contains(name) {
                return Err(TemplateError::Unexpected(name.to_string()));
            }
        }
        for name in &self.funcs {
            if !funcs.contains_key(name) {
                return Err(TemplateError::Unbound(name.to_string()));
            }
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Data => escape_into(&mut out, data),
                Segment::Func(name) => escape_into(&mut out, &funcs[name]()),
            }
        }
        Ok(Html::from_trusted(out))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

// ===== Error =====

/// Template parse or execution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{{` without a matching `}}`.
    Unterminated,
    /// Placeholder content that is neither `.` nor an identifier.
    InvalidName(String),
    /// A declared function without a binding.
    Unbound(String),
    /// A binding for a function the template never declares.
    Unexpected(String),
}

impl std::error::Error for TemplateError {}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unterminated => f.write_str("unterminated placeholder"),
            Self::InvalidName(name) => write!(f, "invalid placeholder name {name:?}"),
            Self::Unbound(name) => write!(f, "no binding for template function {name:?}"),
            Self::Unexpected(name) => write!(f, "binding for undeclared function {name:?}"),
        }
    }
}
