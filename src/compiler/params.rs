//! Parameter binding
//!
//! A `Binder` lives for exactly one compilation. Positional ordinals and
//! named-parameter suffixes come from its counter, so compiled output is
//! reproducible and two predicates can never share a name.

use crate::error::{QueryError, Result};

/// Placeholder syntax of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
    /// `?` (CQL)
    Question,
    /// `<sigil><name>`, e.g. `@age_2` (AQL)
    Named(char),
    /// Values are embedded in a structured filter; no placeholder text
    Inline,
}

/// One bound value, with its name for named styles
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter<N> {
    pub name: Option<String>,
    pub value: N,
}

/// Collects parameters in binding order
#[derive(Debug)]
pub struct Binder<N> {
    style: ParamStyle,
    first_ordinal: usize,
    params: Vec<Parameter<N>>,
}

impl<N> Binder<N> {
    pub fn new(style: ParamStyle) -> Self {
        Self::with_offset(style, 1)
    }

    /// Start numbering at `first_ordinal`
    pub fn with_offset(style: ParamStyle, first_ordinal: usize) -> Self {
        Self {
            style,
            first_ordinal,
            params: Vec::new(),
        }
    }

    pub fn style(&self) -> ParamStyle {
        self.style
    }

    /// Ordinal the next bound value will receive
    pub fn next_ordinal(&self) -> usize {
        self.first_ordinal + self.params.len()
    }

    /// Bind a value for `field`, returning the placeholder to emit
    pub fn bind(&mut self, field: &str, value: N) -> Result<String> {
        let ordinal = self.next_ordinal();
        match self.style {
            ParamStyle::Dollar => {
                self.push(None, value);
                Ok(format!("${}", ordinal))
            }
            ParamStyle::Question => {
                self.push(None, value);
                Ok("?".to_string())
            }
            ParamStyle::Named(_) => self.bind_named(parameter_name(field, ordinal), value),
            ParamStyle::Inline => {
                self.push(None, value);
                Ok(String::new())
            }
        }
    }

    /// Bind under an explicit name; a name already in use is a conflict
    pub fn bind_named(&mut self, name: impl Into<String>, value: N) -> Result<String> {
        let name = name.into();
        if self.params.iter().any(|p| p.name.as_deref() == Some(name.as_str())) {
            return Err(QueryError::ParameterBindingConflict(name));
        }
        let placeholder = match self.style {
            ParamStyle::Named(sigil) => format!("{}{}", sigil, name),
            _ => format!(":{}", name),
        };
        self.push(Some(name), value);
        Ok(placeholder)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_parameters(self) -> Vec<Parameter<N>> {
        self.params
    }

    fn push(&mut self, name: Option<String>, value: N) {
        self.params.push(Parameter { name, value });
    }
}

/// Derive a parameter name from a field name and an ordinal
///
/// Characters outside `[A-Za-z0-9_]` become `_`; a leading digit or an empty
/// name gets a `p` prefix.
pub fn parameter_name(field: &str, ordinal: usize) -> String {
    let mut base: String = field
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
        base.insert(0, 'p');
    }
    format!("{}_{}", base, ordinal)
}
