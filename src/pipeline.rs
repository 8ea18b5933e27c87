//! The version-calculation pipeline.
//!
//! Steps run in a fixed order: `vcs` describes the repository,
//! `tag2version` extracts a base version from the tag, `next-version`
//! projects the following release, and `format` renders the final version
//! for non-exact states. `template-fields` then assembles the mapping used
//! by the optional `write` and `onbuild` steps.
//!
//! When a step fails and `default-version` is configured, the error is
//! logged and the default is used instead; intermediate values computed
//! before the failure are still reported. Configuration errors raised while
//! loading are never recovered this way.

use crate::config::{Config, Params, StepConfig};
use crate::error::{Error, Result};
use crate::methods::{MethodRegistry, Step, StepMethod};
use crate::onbuild::{BuildDirProvider, FileProvider};
use crate::pep440;
use crate::template::TemplateFields;
use crate::template_fields::TemplateFieldsArgs;
use crate::util::{is_sdist, parse_version_from_metadata};
use crate::vcs::VcsDescription;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// The intermediate and final values calculated during a run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// The final version.
    pub version: String,
    /// What the `vcs` step reported; `None` if it failed.
    pub description: Option<VcsDescription>,
    /// The version extracted from the tag; `None` if the `tag2version` step
    /// or an earlier one failed.
    pub base_version: Option<String>,
    /// The projected next version; `None` if the `next-version` step or an
    /// earlier one failed.
    pub next_version: Option<String>,
    /// Fields for use by the `write` and `onbuild` steps.
    pub template_fields: TemplateFields,
    /// Whether an error forced the `default-version` setting to be used.
    pub using_default_version: bool,
}

/// The version read back from an unpacked sdist's `PKG-INFO`.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackReport {
    pub version: String,
}

/// What a [`Pipeline::run`] call produced.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Report(Report),
    Fallback(FallbackReport),
}

impl RunOutcome {
    pub fn version(&self) -> &str {
        match self {
            RunOutcome::Report(r) => &r.version,
            RunOutcome::Fallback(f) => &f.version,
        }
    }
}

#[derive(Debug, Clone)]
struct BoundStep {
    method: StepMethod,
    params: Params,
}

fn bind(registry: &MethodRegistry, step: Step, config: &StepConfig) -> Result<BoundStep> {
    Ok(BoundStep {
        method: registry.resolve(step, &config.method)?,
        params: config.params.clone(),
    })
}

/// A project's configured pipeline, ready to run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    project_dir: PathBuf,
    default_version: Option<String>,
    vcs: BoundStep,
    tag2version: BoundStep,
    next_version: BoundStep,
    format: BoundStep,
    template_fields: BoundStep,
    write: Option<BoundStep>,
    onbuild: Option<BoundStep>,
}

impl Pipeline {
    /// Load the configuration from `project_dir` and bind it against the
    /// built-in methods.
    pub fn from_project_dir(project_dir: &Path) -> Result<Pipeline> {
        let config = Config::load(project_dir)?;
        Pipeline::from_config(project_dir, &config, &MethodRegistry::new())
    }

    /// Bind a parsed configuration against a method registry.
    pub fn from_config(
        project_dir: &Path,
        config: &Config,
        registry: &MethodRegistry,
    ) -> Result<Pipeline> {
        Ok(Pipeline {
            project_dir: project_dir.to_path_buf(),
            default_version: config.default_version.clone(),
            vcs: bind(registry, Step::Vcs, &config.vcs)?,
            tag2version: bind(registry, Step::Tag2Version, &config.tag2version)?,
            next_version: bind(registry, Step::NextVersion, &config.next_version)?,
            format: bind(registry, Step::Format, &config.format)?,
            template_fields: bind(registry, Step::TemplateFields, &config.template_fields)?,
            write: config
                .write
                .as_ref()
                .map(|c| bind(registry, Step::Write, c))
                .transpose()?,
            onbuild: config
                .onbuild
                .as_ref()
                .map(|c| bind(registry, Step::Onbuild, c))
                .transpose()?,
        })
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Determine the project's version.
    ///
    /// With `write` set, the file named by the `write` subtable, if any, is
    /// updated. With `fallback` set, a project directory that is not under
    /// version control is assumed to be an unpacked sdist and the version
    /// is read from `PKG-INFO`.
    pub fn get_version(&self, write: bool, fallback: bool) -> Result<String> {
        Ok(self.run(write, fallback)?.version().to_string())
    }

    /// Run every step other than `onbuild` (and, without `write`, the write
    /// step) and report the final version along with all intermediates.
    pub fn run(&self, write: bool, fallback: bool) -> Result<RunOutcome> {
        let mut description: Option<VcsDescription> = None;
        let mut base_version: Option<String> = None;
        let mut next_version: Option<String> = None;
        let mut using_default_version = false;
        let version =
            match self.calculate(&mut description, &mut base_version, &mut next_version) {
                Ok(version) => version,
                Err(e @ Error::NotVcs(_))
                    if fallback
                        && (is_sdist(&self.project_dir) || self.default_version.is_none()) =>
                {
                    tracing::info!(
                        "could not get VCS data from {}: {e}",
                        self.project_dir.display()
                    );
                    tracing::info!("falling back to reading from PKG-INFO");
                    return Ok(RunOutcome::Fallback(FallbackReport {
                        version: get_version_from_pkg_info(&self.project_dir)?,
                    }));
                }
                Err(e) => match &self.default_version {
                    Some(default_version) => {
                        tracing::error!("{e}");
                        tracing::info!("falling back to default-version");
                        using_default_version = true;
                        default_version.clone()
                    }
                    None => return Err(e),
                },
            };
        pep440::warn_bad_version(&version, "final version");
        let template_fields = self.do_template_fields(&TemplateFieldsArgs {
            version: &version,
            description: description.as_ref(),
            base_version: base_version.as_deref(),
            next_version: next_version.as_deref(),
        })?;
        if write {
            self.do_write(&template_fields)?;
        }
        Ok(RunOutcome::Report(Report {
            version,
            description,
            base_version,
            next_version,
            template_fields,
            using_default_version,
        }))
    }

    /// The steps covered by the `default-version` recovery, storing each
    /// intermediate as soon as it is available so a later failure still
    /// reports it.
    fn calculate(
        &self,
        description: &mut Option<VcsDescription>,
        base_version: &mut Option<String>,
        next_version: &mut Option<String>,
    ) -> Result<String> {
        let desc = self.do_vcs()?;
        *description = Some(desc.clone());
        let bv = self.do_tag2version(&desc.tag)?;
        *base_version = Some(bv.clone());
        let nv = self.do_next_version(&bv, desc.branch.as_deref())?;
        *next_version = Some(nv.clone());
        let version = if desc.state == "exact" {
            tracing::info!("tag is exact match; returning extracted version");
            bv
        } else {
            tracing::info!("VCS state is {:?}; formatting version", desc.state);
            self.do_format(&desc, &bv, &nv)?
        };
        tracing::info!("final version: {version}");
        Ok(version)
    }

    /// Determine the next version after the current tagged version.
    pub fn get_next_version(&self) -> Result<String> {
        let description = self.do_vcs()?;
        let base_version = self.do_tag2version(&description.tag)?;
        self.do_next_version(&base_version, description.branch.as_deref())
    }

    pub fn do_vcs(&self) -> Result<VcsDescription> {
        let StepMethod::Vcs(f) = &self.vcs.method else {
            return Err(step_mismatch(Step::Vcs));
        };
        let description = f(&self.project_dir, &self.vcs.params)?;
        tracing::info!("vcs returned tag {}", description.tag);
        tracing::debug!("vcs state: {}", description.state);
        tracing::debug!("vcs branch: {:?}", description.branch);
        Ok(description)
    }

    pub fn do_tag2version(&self, tag: &str) -> Result<String> {
        let StepMethod::Tag2Version(f) = &self.tag2version.method else {
            return Err(step_mismatch(Step::Tag2Version));
        };
        let version = f(tag, &self.tag2version.params)?;
        tracing::info!("tag2version returned version {version}");
        pep440::warn_bad_version(&version, "version extracted from tag");
        Ok(version)
    }

    pub fn do_next_version(&self, version: &str, branch: Option<&str>) -> Result<String> {
        let StepMethod::NextVersion(f) = &self.next_version.method else {
            return Err(step_mismatch(Step::NextVersion));
        };
        let next_version = f(version, branch, &self.next_version.params)?;
        tracing::info!("next-version returned version {next_version}");
        pep440::warn_bad_version(&next_version, "calculated next version");
        Ok(next_version)
    }

    pub fn do_format(
        &self,
        description: &VcsDescription,
        base_version: &str,
        next_version: &str,
    ) -> Result<String> {
        let StepMethod::Format(f) = &self.format.method else {
            return Err(step_mismatch(Step::Format));
        };
        f(description, base_version, next_version, &self.format.params)
    }

    pub fn do_template_fields(&self, args: &TemplateFieldsArgs<'_>) -> Result<TemplateFields> {
        let StepMethod::TemplateFields(f) = &self.template_fields.method else {
            return Err(step_mismatch(Step::TemplateFields));
        };
        let fields = f(args, &self.template_fields.params)?;
        tracing::debug!("template fields available to `write` and `onbuild`: {fields:?}");
        Ok(fields)
    }

    pub fn do_write(&self, template_fields: &TemplateFields) -> Result<()> {
        match &self.write {
            Some(write) => {
                let StepMethod::Write(f) = &write.method else {
                    return Err(step_mismatch(Step::Write));
                };
                f(&self.project_dir, template_fields, &write.params)
            }
            None => {
                tracing::info!("'write' step not configured; not writing anything");
                Ok(())
            }
        }
    }

    pub fn do_onbuild(
        &self,
        file_provider: &dyn FileProvider,
        is_source: bool,
        template_fields: &TemplateFields,
    ) -> Result<()> {
        match &self.onbuild {
            Some(onbuild) => {
                let StepMethod::Onbuild(f) = &onbuild.method else {
                    return Err(step_mismatch(Step::Onbuild));
                };
                f(file_provider, is_source, template_fields, &onbuild.params)
            }
            None => {
                tracing::info!("'onbuild' step not configured; not doing anything");
                Ok(())
            }
        }
    }

    /// Run the `onbuild` step against a staging directory.
    pub fn run_onbuild(
        &self,
        build_dir: &Path,
        is_source: bool,
        template_fields: &TemplateFields,
    ) -> Result<()> {
        let provider = BuildDirProvider {
            src_dir: self.project_dir.clone(),
            build_dir: build_dir.to_path_buf(),
        };
        self.do_onbuild(&provider, is_source, template_fields)
    }
}

fn step_mismatch(step: Step) -> Error {
    Error::Method(format!(
        "method bound for the {step} step does not implement it"
    ))
}

/// The `Version` field of the `PKG-INFO` file in `project_dir`.
pub fn get_version_from_pkg_info(project_dir: &Path) -> Result<String> {
    match std::fs::read_to_string(project_dir.join("PKG-INFO")) {
        Ok(text) => parse_version_from_metadata(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::NotSdist(project_dir.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Determine the version for the project at `project_dir`.
pub fn get_version(project_dir: &Path, write: bool, fallback: bool) -> Result<String> {
    Pipeline::from_project_dir(project_dir)?.get_version(write, fallback)
}

/// Determine the next version after the current tagged version for the
/// project at `project_dir`.
pub fn get_next_version(project_dir: &Path) -> Result<String> {
    Pipeline::from_project_dir(project_dir)?.get_next_version()
}
