//! Writing the version to a source file at build time.

use crate::config::{opt_str_param, require_str_param, warn_extra_params, Params};
use crate::error::{Error, Result};
use crate::template::{self, TemplateFields};
use std::path::Path;

/// Default file templates keyed by filename extension.
const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    ("", "{version}"),
    ("txt", "{version}"),
    ("py", "__version__ = \"{version}\""),
    ("rs", "pub const VERSION: &str = \"{version}\";"),
];

/// Render a template against the collected fields and write it, newline
/// terminated, to the configured file under `project_dir`.
///
/// The template defaults by the file's extension; extensions without a
/// default require an explicit `template` parameter.
pub fn basic_write(
    project_dir: &Path,
    template_fields: &TemplateFields,
    params: &Params,
) -> Result<()> {
    warn_extra_params(params, "write", &["file", "encoding", "template"]);
    let file = require_str_param(params, "file", "write.file")?;
    if let Some(encoding) = opt_str_param(params, "encoding", "write.encoding")? {
        let normalized = encoding.to_lowercase().replace(['-', '_'], "");
        if normalized != "utf8" {
            return Err(Error::Config(format!(
                "write.encoding: unsupported encoding {encoding:?}; only UTF-8 is supported"
            )));
        }
    }
    let path = project_dir.join(&file);
    let template = match opt_str_param(params, "template", "write.template")? {
        Some(t) => t,
        None => {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            DEFAULT_TEMPLATES
                .iter()
                .find(|(e, _)| *e == ext)
                .map(|(_, t)| t.to_string())
                .ok_or_else(|| {
                    Error::Config(format!(
                        "write.template not specified and file has unknown suffix {file:?}"
                    ))
                })?
        }
    };
    let rendered = template::render(&template, template_fields)?;
    tracing::debug!("writing version to file {}", path.display());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, format!("{rendered}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::FieldValue;
    use tempfile::tempdir;
    use toml::Value;

    fn fields() -> TemplateFields {
        let mut f = TemplateFields::new();
        f.insert("version".into(), "1.2.3".into());
        f.insert("rev".into(), FieldValue::Str("abcdef0".into()));
        f
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn writes_python_default_template() {
        let dir = tempdir().unwrap();
        basic_write(dir.path(), &fields(), &params(&[("file", "pkg/_version.py")])).unwrap();
        let text = std::fs::read_to_string(dir.path().join("pkg/_version.py")).unwrap();
        assert_eq!(text, "__version__ = \"1.2.3\"\n");
    }

    #[test]
    fn writes_txt_and_extensionless_defaults() {
        let dir = tempdir().unwrap();
        basic_write(dir.path(), &fields(), &params(&[("file", "VERSION.txt")])).unwrap();
        basic_write(dir.path(), &fields(), &params(&[("file", "VERSION")])).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("VERSION.txt")).unwrap(),
            "1.2.3\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("VERSION")).unwrap(),
            "1.2.3\n"
        );
    }

    #[test]
    fn writes_rust_default_template() {
        let dir = tempdir().unwrap();
        basic_write(dir.path(), &fields(), &params(&[("file", "src/version.rs")])).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/version.rs")).unwrap(),
            "pub const VERSION: &str = \"1.2.3\";\n"
        );
    }

    #[test]
    fn explicit_template_overrides_default() {
        let dir = tempdir().unwrap();
        basic_write(
            dir.path(),
            &fields(),
            &params(&[("file", "v.py"), ("template", "v = \"{version}+{rev}\"")]),
        )
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("v.py")).unwrap(),
            "v = \"1.2.3+abcdef0\"\n"
        );
    }

    #[test]
    fn unknown_suffix_without_template_is_config_error() {
        let dir = tempdir().unwrap();
        let err = basic_write(dir.path(), &fields(), &params(&[("file", "v.tex")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_file_param_is_config_error() {
        let dir = tempdir().unwrap();
        let err = basic_write(dir.path(), &fields(), &Params::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn utf8_encoding_spellings_accepted() {
        let dir = tempdir().unwrap();
        basic_write(
            dir.path(),
            &fields(),
            &params(&[("file", "VERSION"), ("encoding", "UTF-8")]),
        )
        .unwrap();
        let err = basic_write(
            dir.path(),
            &fields(),
            &params(&[("file", "VERSION"), ("encoding", "latin-1")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
