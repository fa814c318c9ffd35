//! Safe HTML values.
//!
//! [`Html`] is the only string carrier the default dispatcher will put on
//! the wire as `text/html`. It cannot be built from a raw string: every
//! constructor either escapes its input or derives the value from an
//! already-safe one, so holding an `Html` is proof the payload is free of
//! attacker-controlled markup.
mod template;

pub use template::{FuncMap, Template, TemplateError};

/// HTML string that is safe to send to a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Html {
    inner: String,
}

impl Html {
    /// Build an [`Html`] value by escaping `text`.
    ///
    /// `& < > " '` are replaced with their entity forms, everything else
    /// passes through untouched.
    pub fn escaped(text: &str) -> Html {
        let mut inner = String::with_capacity(text.len());
        escape_into(&mut inner, text);
        Html { inner }
    }

    /// Concatenate safe values into a new safe value.
    pub fn concat<I>(parts: I) -> Html
    where
        I: IntoIterator<Item = Html>,
    {
        let mut inner = String::new();
        for part in parts {
            inner.push_str(&part.inner);
        }
        Html { inner }
    }

    /// Returns the underlying markup.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    // invariant: `inner` must already be safe markup
    pub(crate) fn from_trusted(inner: String) -> Html {
        Html { inner }
    }
}

impl std::fmt::Display for Html {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.inner)
    }
}

pub(crate) fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}
