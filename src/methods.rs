//! The method registry: named step implementations and their resolution.
//!
//! Every pipeline step is carried out by a method. Built-in methods are
//! registered under well-known names per step; embedders may register their
//! own, either as additional named methods or as `module:value` callables
//! referenced from a configuration's `{module, value}` method tables.

use crate::config::Params;
use crate::error::{Error, Result};
use crate::onbuild::FileProvider;
use crate::template::TemplateFields;
use crate::template_fields::TemplateFieldsArgs;
use crate::vcs::VcsDescription;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// The seven pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Vcs,
    Tag2Version,
    NextVersion,
    Format,
    TemplateFields,
    Write,
    Onbuild,
}

impl Step {
    /// The step's key in configuration tables.
    pub fn key(&self) -> &'static str {
        match self {
            Step::Vcs => "vcs",
            Step::Tag2Version => "tag2version",
            Step::NextVersion => "next-version",
            Step::Format => "format",
            Step::TemplateFields => "template-fields",
            Step::Write => "write",
            Step::Onbuild => "onbuild",
        }
    }

    /// The name of the method used when the configuration names none.
    pub fn default_method(&self) -> &'static str {
        match self {
            Step::Vcs => "git",
            Step::Tag2Version => "basic",
            Step::NextVersion => "minor",
            Step::Format => "basic",
            Step::TemplateFields => "basic",
            Step::Write => "basic",
            Step::Onbuild => "replace-version",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

pub type VcsFn = dyn Fn(&Path, &Params) -> Result<VcsDescription> + Send + Sync;
pub type Tag2VersionFn = dyn Fn(&str, &Params) -> Result<String> + Send + Sync;
pub type NextVersionFn = dyn Fn(&str, Option<&str>, &Params) -> Result<String> + Send + Sync;
pub type FormatFn =
    dyn Fn(&VcsDescription, &str, &str, &Params) -> Result<String> + Send + Sync;
pub type TemplateFieldsFn =
    dyn Fn(&TemplateFieldsArgs<'_>, &Params) -> Result<TemplateFields> + Send + Sync;
pub type WriteFn = dyn Fn(&Path, &TemplateFields, &Params) -> Result<()> + Send + Sync;
pub type OnbuildFn =
    dyn Fn(&dyn FileProvider, bool, &TemplateFields, &Params) -> Result<()> + Send + Sync;

/// A step implementation. The variant fixes which step the method may be
/// registered for.
#[derive(Clone)]
pub enum StepMethod {
    Vcs(Arc<VcsFn>),
    Tag2Version(Arc<Tag2VersionFn>),
    NextVersion(Arc<NextVersionFn>),
    Format(Arc<FormatFn>),
    TemplateFields(Arc<TemplateFieldsFn>),
    Write(Arc<WriteFn>),
    Onbuild(Arc<OnbuildFn>),
}

impl StepMethod {
    pub fn step(&self) -> Step {
        match self {
            StepMethod::Vcs(_) => Step::Vcs,
            StepMethod::Tag2Version(_) => Step::Tag2Version,
            StepMethod::NextVersion(_) => Step::NextVersion,
            StepMethod::Format(_) => Step::Format,
            StepMethod::TemplateFields(_) => Step::TemplateFields,
            StepMethod::Write(_) => Step::Write,
            StepMethod::Onbuild(_) => Step::Onbuild,
        }
    }
}

impl fmt::Debug for StepMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepMethod::{}(..)", self.step())
    }
}

/// How a configuration refers to a step's method.
#[derive(Debug, Clone)]
pub enum MethodSpec {
    /// A registered method name.
    Named(String),
    /// An embedder-registered `module:value` callable.
    Custom {
        module: String,
        value: String,
        module_dir: Option<String>,
    },
    /// A method supplied directly by the embedding program.
    Callable(StepMethod),
}

/// Maps method names (and `module:value` references) to implementations.
#[derive(Debug)]
pub struct MethodRegistry {
    named: HashMap<(Step, String), StepMethod>,
    custom: HashMap<String, StepMethod>,
}

impl Default for MethodRegistry {
    fn default() -> MethodRegistry {
        MethodRegistry::new()
    }
}

impl MethodRegistry {
    /// A registry holding the built-in methods.
    pub fn new() -> MethodRegistry {
        let mut registry = MethodRegistry {
            named: HashMap::new(),
            custom: HashMap::new(),
        };
        registry.seed_builtins();
        registry
    }

    fn seed_builtins(&mut self) {
        let builtins: [(&str, StepMethod); 12] = [
            ("git", StepMethod::Vcs(Arc::new(crate::vcs::describe_git))),
            (
                "git-archive",
                StepMethod::Vcs(Arc::new(crate::vcs::describe_git_archive)),
            ),
            ("hg", StepMethod::Vcs(Arc::new(crate::vcs::describe_hg))),
            (
                "basic",
                StepMethod::Tag2Version(Arc::new(crate::tag2version::basic_tag2version)),
            ),
            (
                "minor",
                StepMethod::NextVersion(Arc::new(crate::next_version::next_minor)),
            ),
            (
                "smallest",
                StepMethod::NextVersion(Arc::new(crate::next_version::next_smallest)),
            ),
            (
                "minor-release",
                StepMethod::NextVersion(Arc::new(crate::next_version::next_minor_release)),
            ),
            (
                "smallest-release",
                StepMethod::NextVersion(Arc::new(crate::next_version::next_smallest_release)),
            ),
            (
                "null",
                StepMethod::NextVersion(Arc::new(crate::next_version::null_next_version)),
            ),
            (
                "basic",
                StepMethod::Format(Arc::new(crate::format::basic_format)),
            ),
            (
                "basic",
                StepMethod::TemplateFields(Arc::new(crate::template_fields::basic_template_fields)),
            ),
            (
                "basic",
                StepMethod::Write(Arc::new(crate::write::basic_write)),
            ),
        ];
        for (name, method) in builtins {
            let step = method.step();
            self.named.insert((step, name.to_string()), method);
        }
        self.named.insert(
            (Step::Onbuild, "replace-version".to_string()),
            StepMethod::Onbuild(Arc::new(crate::onbuild::replace_version_onbuild)),
        );
    }

    /// Register a named method for the step the method belongs to.
    /// Registering over an existing name is an error.
    pub fn register(&mut self, name: &str, method: StepMethod) -> Result<()> {
        let step = method.step();
        let key = (step, name.to_string());
        if self.named.contains_key(&key) {
            return Err(Error::Method(format!(
                "method {name:?} is already registered for the {step} step"
            )));
        }
        self.named.insert(key, method);
        Ok(())
    }

    /// Register a callable reachable from configuration as
    /// `{module = ..., value = ...}`.
    pub fn register_custom(&mut self, module: &str, value: &str, method: StepMethod) -> Result<()> {
        let key = format!("{module}:{value}");
        if self.custom.contains_key(&key) {
            return Err(Error::Method(format!(
                "custom method {key:?} is already registered"
            )));
        }
        self.custom.insert(key, method);
        Ok(())
    }

    /// Resolve a configuration's method reference for the given step.
    pub fn resolve(&self, step: Step, spec: &MethodSpec) -> Result<StepMethod> {
        let method = match spec {
            MethodSpec::Named(name) => self
                .named
                .get(&(step, name.clone()))
                .cloned()
                .ok_or_else(|| {
                    Error::Method(format!("{step}: unknown method {name:?}"))
                })?,
            MethodSpec::Custom {
                module,
                value,
                module_dir,
            } => {
                if module_dir.is_some() {
                    tracing::warn!(
                        "{step}.method.module-dir is ignored; custom methods must be registered by the embedding program"
                    );
                }
                let key = format!("{module}:{value}");
                self.custom.get(&key).cloned().ok_or_else(|| {
                    Error::Method(format!(
                        "{step}: no custom method registered as {key:?}"
                    ))
                })?
            }
            MethodSpec::Callable(method) => method.clone(),
        };
        if method.step() != step {
            return Err(Error::Method(format!(
                "method resolved for the {step} step belongs to the {} step",
                method.step()
            )));
        }
        Ok(method)
    }
}
