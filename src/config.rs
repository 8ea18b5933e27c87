//! Configuration model: per-step method specifications and parameters.
//!
//! A configuration is a nested table with one entry per pipeline step
//! (`vcs`, `tag2version`, `next-version`, `format`, `template-fields`,
//! `write`, `onbuild`) plus `default-version`. Each step entry is either a
//! method-name string, an inline `{module, value, module-dir}` reference, or
//! a table with an optional `method` key whose remaining keys are passed to
//! the method as parameters. Absent steps run with their built-in default
//! method — except `write` and `onbuild`, which are skipped entirely.
//!
//! File-based configuration lives in `tagver.toml` or `pyproject.toml`,
//! under the `[tool.tagver]` table.

use crate::error::{Error, Result};
use crate::methods::{MethodSpec, Step};
use std::collections::BTreeMap;
use std::path::Path;
use toml::Value;

/// Open-ended method parameters: string keys to TOML values.
pub type Params = BTreeMap<String, Value>;

/// A parsed step subtable: which method to run and with which parameters.
#[derive(Debug, Clone)]
pub struct StepConfig {
    pub method: MethodSpec,
    pub params: Params,
}

impl StepConfig {
    /// A named method with no parameters.
    pub fn named(name: &str) -> StepConfig {
        StepConfig {
            method: MethodSpec::Named(name.to_string()),
            params: Params::new(),
        }
    }
}

/// Parsed tagver configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub vcs: StepConfig,
    pub tag2version: StepConfig,
    pub next_version: StepConfig,
    pub format: StepConfig,
    pub template_fields: StepConfig,
    /// Absent means the write step is skipped entirely.
    pub write: Option<StepConfig>,
    /// Absent means the onbuild step is skipped entirely.
    pub onbuild: Option<StepConfig>,
    /// Version to fall back to when any step fails.
    pub default_version: Option<String>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            vcs: StepConfig::named(Step::Vcs.default_method()),
            tag2version: StepConfig::named(Step::Tag2Version.default_method()),
            next_version: StepConfig::named(Step::NextVersion.default_method()),
            format: StepConfig::named(Step::Format.default_method()),
            template_fields: StepConfig::named(Step::TemplateFields.default_method()),
            write: None,
            onbuild: None,
            default_version: None,
        }
    }
}

impl Config {
    /// Load the configuration for the project rooted at `project_dir`:
    /// `tagver.toml` if present, else the `[tool.tagver]` table of
    /// `pyproject.toml`.
    pub fn load(project_dir: &Path) -> Result<Config> {
        let path = {
            let p = project_dir.join("tagver.toml");
            if p.is_file() {
                p
            } else {
                project_dir.join("pyproject.toml")
            }
        };
        if !path.is_file() {
            return Err(Error::NotConfigured(project_dir.to_path_buf()));
        }
        Config::parse_toml_file(&path)
    }

    /// Parse the given TOML file and extract the `[tool.tagver]` table.
    pub fn parse_toml_file(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)?;
        let value: Value = text
            .parse()
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let table = value
            .get("tool")
            .and_then(|tool| tool.get("tagver"))
            .cloned()
            .ok_or_else(|| Error::NotConfigured(path.to_path_buf()))?;
        Config::from_toml(table)
    }

    /// Parse a raw configuration structure.
    pub fn from_toml(value: Value) -> Result<Config> {
        let Value::Table(mut table) = value else {
            return Err(Error::Config("tagver config must be a table".into()));
        };
        let default_version = match table.remove("default-version") {
            None => None,
            Some(Value::String(s)) => Some(s),
            Some(_) => {
                return Err(Error::Config("default-version must be a string".into()));
            }
        };
        let mut step = |step: Step, optional: bool| -> Result<Option<StepConfig>> {
            parse_step(step, table.remove(step.key()), optional)
        };
        let vcs = step(Step::Vcs, false)?;
        let tag2version = step(Step::Tag2Version, false)?;
        let next_version = step(Step::NextVersion, false)?;
        let format = step(Step::Format, false)?;
        let template_fields = step(Step::TemplateFields, false)?;
        let write = step(Step::Write, true)?;
        let onbuild = step(Step::Onbuild, true)?;
        for key in table.keys() {
            tracing::warn!("ignoring unknown key {key:?} in tagver configuration");
        }
        // The non-optional steps always produced a section above.
        let required = |s: Option<StepConfig>| {
            s.ok_or_else(|| Error::Config("missing step configuration".into()))
        };
        Ok(Config {
            vcs: required(vcs)?,
            tag2version: required(tag2version)?,
            next_version: required(next_version)?,
            format: required(format)?,
            template_fields: required(template_fields)?,
            write,
            onbuild,
            default_version,
        })
    }
}

fn parse_step(step: Step, value: Option<Value>, optional: bool) -> Result<Option<StepConfig>> {
    let key = step.key();
    match value {
        None => {
            if optional {
                Ok(None)
            } else {
                Ok(Some(StepConfig::named(step.default_method())))
            }
        }
        Some(Value::String(name)) => Ok(Some(StepConfig {
            method: MethodSpec::Named(name),
            params: Params::new(),
        })),
        Some(Value::Table(mut table)) => {
            if !table.contains_key("method")
                && table.contains_key("module")
                && table.contains_key("value")
            {
                let method = parse_custom_method(key, Value::Table(table))?;
                return Ok(Some(StepConfig {
                    method,
                    params: Params::new(),
                }));
            }
            let method = match table.remove("method") {
                None => MethodSpec::Named(step.default_method().to_string()),
                Some(Value::String(name)) => MethodSpec::Named(name),
                Some(v @ Value::Table(_)) => parse_custom_method(key, v)?,
                Some(_) => {
                    return Err(Error::Config(format!(
                        "{key}.method must be a string or table"
                    )));
                }
            };
            Ok(Some(StepConfig {
                method,
                params: table.into_iter().collect(),
            }))
        }
        Some(_) => Err(Error::Config(format!("{key} must be a string or table"))),
    }
}

fn parse_custom_method(key: &str, value: Value) -> Result<MethodSpec> {
    let Value::Table(mut table) = value else {
        return Err(Error::Config(format!("{key}.method must be a string or table")));
    };
    let module = match table.remove("module") {
        Some(Value::String(s)) => s,
        _ => {
            return Err(Error::Config(format!(
                "{key}.method.module is required and must be a string"
            )));
        }
    };
    let value_name = match table.remove("value") {
        Some(Value::String(s)) => s,
        _ => {
            return Err(Error::Config(format!(
                "{key}.method.value is required and must be a string"
            )));
        }
    };
    let module_dir = match table.remove("module-dir") {
        None => None,
        Some(Value::String(s)) => Some(s),
        Some(_) => {
            return Err(Error::Config(format!(
                "{key}.method.module-dir must be a string"
            )));
        }
    };
    for extra in table.keys() {
        tracing::warn!("ignoring unknown parameter {extra:?} in {key}.method");
    }
    Ok(MethodSpec::Custom {
        module,
        value: value_name,
        module_dir,
    })
}

// --- Typed parameter guards used by the built-in methods ---

/// Required string parameter; absent or non-string is a `Config` error.
pub(crate) fn require_str_param(params: &Params, key: &str, field: &str) -> Result<String> {
    match params.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(Error::Config(format!("{field} must be set to a string"))),
    }
}

/// Optional string parameter; present-but-non-string is a `Config` error.
pub(crate) fn opt_str_param(params: &Params, key: &str, field: &str) -> Result<Option<String>> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::Config(format!("{field} must be a string"))),
    }
}

/// Boolean parameter with a default.
pub(crate) fn bool_param(params: &Params, key: &str, default: bool, field: &str) -> Result<bool> {
    match params.get(key) {
        None => Ok(default),
        Some(Value::Boolean(b)) => Ok(*b),
        Some(_) => Err(Error::Config(format!("{field} must be set to a boolean"))),
    }
}

/// Optional boolean parameter, distinguishing absent from false.
pub(crate) fn opt_bool_param(params: &Params, key: &str, field: &str) -> Result<Option<bool>> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::Boolean(b)) => Ok(Some(*b)),
        Some(_) => Err(Error::Config(format!("{field} must be set to a boolean"))),
    }
}

/// List-of-strings parameter, defaulting to empty.
pub(crate) fn list_str_param(params: &Params, key: &str, field: &str) -> Result<Vec<String>> {
    match params.get(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    _ => {
                        return Err(Error::Config(format!(
                            "{field} must be a list of strings"
                        )));
                    }
                }
            }
            Ok(out)
        }
        Some(_) => Err(Error::Config(format!("{field} must be a list of strings"))),
    }
}

/// Warn about parameters the method does not recognize.
pub(crate) fn warn_extra_params(params: &Params, table: &str, known: &[&str]) {
    for key in params.keys() {
        if !known.contains(&key.as_str()) {
            tracing::warn!("ignoring unknown parameter {key:?} in tagver's {table} table");
        }
    }
}
