//! Template fields and the placeholder-substitution sub-language.
//!
//! Templates are plain strings with `{name}` placeholders, `{{`/`}}` escapes,
//! and an optional format-spec suffix: strftime specs for date-typed fields
//! (`{build_date:%Y%m%d}`) and zero-padded widths for integer fields
//! (`{distance:03}`). Fields carry typed values; see [`FieldValue`].

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

/// The accumulated mapping of names to values available to the `format`,
/// `write`, and `onbuild` templates.
pub type TemplateFields = BTreeMap<String, FieldValue>;

/// One component of a [`VersionTuple`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TupleComponent {
    Int(u64),
    Str(String),
}

/// An ordered decomposition of a version string into typed components,
/// rendered as a Python-style tuple literal for embedding in generated
/// source files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTuple {
    pub components: Vec<TupleComponent>,
    /// Render string components with `"` instead of `'`.
    pub double_quote: bool,
}

impl fmt::Display for VersionTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quote = if self.double_quote { '"' } else { '\'' };
        write!(f, "(")?;
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match component {
                TupleComponent::Int(n) => write!(f, "{n}")?,
                TupleComponent::Str(s) => write!(f, "{quote}{s}{quote}")?,
            }
        }
        if self.components.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

/// A typed template-field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Timestamp(DateTime<Utc>),
    Tuple(VersionTuple),
    None,
}

impl FieldValue {
    fn render(&self, name: &str, spec: Option<&str>) -> Result<String> {
        if let Some(spec) = spec {
            return match self {
                FieldValue::Timestamp(ts) => {
                    let mut out = String::new();
                    write!(out, "{}", ts.format(spec)).map_err(|_| {
                        Error::Config(format!("invalid date format spec {spec:?}"))
                    })?;
                    Ok(out)
                }
                FieldValue::Int(n) => {
                    let width = spec
                        .strip_prefix('0')
                        .and_then(|w| w.parse::<usize>().ok())
                        .filter(|w| *w > 0)
                        .ok_or_else(|| {
                            Error::Config(format!(
                                "unsupported format spec {spec:?} for integer field {{{name}}}; only zero-padded widths like 03 are supported"
                            ))
                        })?;
                    Ok(format!("{n:0width$}"))
                }
                _ => Err(Error::Config(format!(
                    "format spec {spec:?} is not supported for {{{name}}}; format specs apply to date and integer fields only"
                ))),
            };
        }
        Ok(match self {
            FieldValue::Str(s) => s.clone(),
            FieldValue::Int(n) => n.to_string(),
            FieldValue::Timestamp(ts) => ts.to_rfc3339(),
            FieldValue::Tuple(t) => t.to_string(),
            FieldValue::None => String::new(),
        })
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Str(s) => serializer.serialize_str(s),
            FieldValue::Int(n) => serializer.serialize_i64(*n),
            FieldValue::Timestamp(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            FieldValue::Tuple(t) => serializer.serialize_str(&t.to_string()),
            FieldValue::None => serializer.serialize_none(),
        }
    }
}

/// Substitute `{name}` placeholders in `template` from `fields`.
///
/// An unknown placeholder is a configuration error; a format spec is only
/// valid on date and integer fields.
pub fn render(template: &str, fields: &TemplateFields) -> Result<String> {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut spec: Option<String> = None;
                let mut closed = false;
                for c in chars.by_ref() {
                    match c {
                        '}' => {
                            closed = true;
                            break;
                        }
                        ':' if spec.is_none() => spec = Some(String::new()),
                        _ => match &mut spec {
                            Some(s) => s.push(c),
                            None => name.push(c),
                        },
                    }
                }
                if !closed {
                    return Err(Error::Config(format!(
                        "unterminated placeholder in template {template:?}"
                    )));
                }
                let value = fields.get(&name).ok_or_else(|| {
                    Error::Config(format!("unknown placeholder {{{name}}} in template"))
                })?;
                out.push_str(&value.render(&name, spec.as_deref())?);
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::from_timestamp;

    fn fields() -> TemplateFields {
        let mut f = TemplateFields::new();
        f.insert("version".into(), "1.2.3".into());
        f.insert("distance".into(), FieldValue::Int(5));
        f.insert("rev".into(), "abcdef0".into());
        f.insert(
            "build_date".into(),
            FieldValue::Timestamp(from_timestamp(1700000000)),
        );
        f.insert("branch".into(), FieldValue::None);
        f
    }

    #[test]
    fn renders_plain_fields() {
        assert_eq!(
            render("{version}.post{distance}+g{rev}", &fields()).unwrap(),
            "1.2.3.post5+gabcdef0"
        );
    }

    #[test]
    fn renders_date_with_strftime_spec() {
        assert_eq!(
            render("{version}+d{build_date:%Y%m%d}", &fields()).unwrap(),
            "1.2.3+d20231114"
        );
    }

    #[test]
    fn spec_on_string_field_is_config_error() {
        let err = render("{version:%Y}", &fields()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn int_fields_support_zero_padded_width() {
        assert_eq!(render("{distance:03}", &fields()).unwrap(), "005");
        assert!(matches!(
            render("{distance:x}", &fields()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn escaped_braces_are_literal() {
        assert_eq!(render("{{{version}}}", &fields()).unwrap(), "{1.2.3}");
    }

    #[test]
    fn unknown_placeholder_is_config_error() {
        assert!(matches!(
            render("{nope}", &fields()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn unterminated_placeholder_is_config_error() {
        assert!(matches!(render("{version", &fields()), Err(Error::Config(_))));
    }

    #[test]
    fn none_renders_empty() {
        assert_eq!(render("[{branch}]", &fields()).unwrap(), "[]");
    }

    #[test]
    fn tuple_renders_python_literal() {
        let t = VersionTuple {
            components: vec![
                TupleComponent::Int(1),
                TupleComponent::Int(2),
                TupleComponent::Str("post5".into()),
            ],
            double_quote: true,
        };
        assert_eq!(t.to_string(), r#"(1, 2, "post5")"#);

        let single = VersionTuple {
            components: vec![TupleComponent::Int(1)],
            double_quote: false,
        };
        assert_eq!(single.to_string(), "(1,)");
    }
}
