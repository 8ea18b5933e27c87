//! Assembling the field mapping consumed by the `write` and `onbuild`
//! templates.

use crate::config::{bool_param, opt_bool_param, opt_str_param, warn_extra_params, Params};
use crate::error::{Error, Result};
use crate::pep440;
use crate::template::{FieldValue, TemplateFields, TupleComponent, VersionTuple};
use crate::vcs::VcsDescription;
use regex::Regex;
use toml::Value;

const DEFAULT_SPLIT_ON: &str = r"[-_.+!]";

/// The intermediate pipeline values available when computing template
/// fields. Any of them other than the final version may be missing when an
/// earlier step failed and a default version took over.
#[derive(Debug, Clone, Copy)]
pub struct TemplateFieldsArgs<'a> {
    pub version: &'a str,
    pub description: Option<&'a VcsDescription>,
    pub base_version: Option<&'a str>,
    pub next_version: Option<&'a str>,
}

/// Collect the description's fields plus `branch`, `version`,
/// `base_version`, `next_version`, and a `version_tuple` decomposition
/// controlled by the `version-tuple` parameter subtable.
pub fn basic_template_fields(args: &TemplateFieldsArgs<'_>, params: &Params) -> Result<TemplateFields> {
    warn_extra_params(params, "template-fields", &["version-tuple"]);
    let vtuple_params: Params = match params.get("version-tuple") {
        None => Params::new(),
        Some(Value::Table(table)) => table.clone().into_iter().collect(),
        Some(_) => {
            return Err(Error::Config(
                "template-fields.version-tuple must be a table".into(),
            ));
        }
    };
    let version_tuple = get_version_tuple(args.version, &vtuple_params)?;

    let mut fields = TemplateFields::new();
    if let Some(description) = args.description {
        fields.extend(description.fields.clone());
        fields.insert(
            "branch".into(),
            match &description.branch {
                Some(b) => FieldValue::Str(b.clone()),
                None => FieldValue::None,
            },
        );
    }
    if let Some(base_version) = args.base_version {
        fields.insert("base_version".into(), base_version.into());
    }
    if let Some(next_version) = args.next_version {
        fields.insert("next_version".into(), next_version.into());
    }
    fields.insert("version".into(), args.version.into());
    fields.insert("version_tuple".into(), FieldValue::Tuple(version_tuple));
    Ok(fields)
}

fn get_version_tuple(version: &str, params: &Params) -> Result<VersionTuple> {
    warn_extra_params(
        params,
        "template-fields.version-tuple",
        &["pep440", "epoch", "split-on", "double-quote"],
    );
    let pep440_mode = bool_param(params, "pep440", false, "template-fields.version-tuple.pep440")?;
    let epoch = opt_bool_param(params, "epoch", "template-fields.version-tuple.epoch")?;
    if epoch.is_some() && !pep440_mode {
        tracing::warn!("template-fields.version-tuple: epoch is ignored when pep440 is false");
    }
    let split_on = opt_str_param(params, "split-on", "template-fields.version-tuple.split-on")?;
    if split_on.is_some() && pep440_mode {
        tracing::warn!("template-fields.version-tuple: split-on is ignored when pep440 is true");
    }
    let double_quote = bool_param(
        params,
        "double-quote",
        true,
        "template-fields.version-tuple.double-quote",
    )?;
    if pep440_mode {
        split_pep440_version(version, epoch, double_quote)
    } else {
        split_version(version, split_on.as_deref(), double_quote)
    }
}

/// Split a version string on a separator regex, dropping empty pieces and
/// converting all-digit pieces to integers.
fn split_version(
    version: &str,
    split_on: Option<&str>,
    double_quote: bool,
) -> Result<VersionTuple> {
    let splitter = split_on.unwrap_or(DEFAULT_SPLIT_ON);
    let re = Regex::new(splitter).map_err(|e| {
        Error::Config(format!(
            "template-fields.version-tuple.split-on is not a valid regex: {e}"
        ))
    })?;
    let mut components = Vec::new();
    for piece in split_keeping_groups(&re, version) {
        if piece.is_empty() {
            continue;
        }
        match piece.parse::<u64>() {
            Ok(n) if piece.chars().all(|c| c.is_ascii_digit()) => {
                components.push(TupleComponent::Int(n));
            }
            _ => components.push(TupleComponent::Str(piece.to_string())),
        }
    }
    Ok(VersionTuple {
        components,
        double_quote,
    })
}

/// Split `s` on every match of `re`, keeping the text of any participating
/// capture groups as additional pieces. This lets a `split-on` pattern like
/// `\.|(\+.+)` retain the local-version segment as its own component.
fn split_keeping_groups<'a>(re: &Regex, s: &'a str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for caps in re.captures_iter(s) {
        if let Some(m) = caps.get(0) {
            pieces.push(&s[last..m.start()]);
            last = m.end();
        }
        for i in 1..caps.len() {
            if let Some(group) = caps.get(i) {
                pieces.push(group.as_str());
            }
        }
    }
    pieces.push(&s[last..]);
    pieces
}

/// Decompose a PEP 440 version into its canonical segments.
fn split_pep440_version(
    version: &str,
    epoch: Option<bool>,
    double_quote: bool,
) -> Result<VersionTuple> {
    let parsed = pep440::Version::parse(version)?;
    let mut components = Vec::new();
    let include_epoch = match epoch {
        Some(include) => include,
        None => parsed.epoch != 0,
    };
    if include_epoch {
        components.push(TupleComponent::Int(parsed.epoch));
    }
    for n in &parsed.release {
        components.push(TupleComponent::Int(*n));
    }
    if let Some((label, n)) = &parsed.pre {
        components.push(TupleComponent::Str(format!("{label}{n}")));
    }
    if let Some(n) = parsed.post {
        components.push(TupleComponent::Str(format!("post{n}")));
    }
    if let Some(n) = parsed.dev {
        components.push(TupleComponent::Str(format!("dev{n}")));
    }
    if let Some(local) = &parsed.local {
        components.push(TupleComponent::Str(format!("+{local}")));
    }
    Ok(VersionTuple {
        components,
        double_quote,
    })
}
