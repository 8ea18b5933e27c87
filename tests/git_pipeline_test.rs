//! End-to-end pipeline tests against real temporary Git repositories.

use std::fs;
use std::path::Path;
use std::process::Command;

use regex::Regex;
use tagver::{Error, Pipeline, RunOutcome};
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

macro_rules! require_git {
    () => {
        if !git_available() {
            eprintln!("git not found; skipping");
            return;
        }
    };
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn git_read(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git").args(args).current_dir(dir).output().unwrap();
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A repository with one commit tagged `v1.2.3` and the given extra config
/// appended to the `[tool.tagver]` table.
fn tagged_repo(extra_config: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(dir.join("pyproject.toml"), format!("[tool.tagver]\n{extra_config}")).unwrap();
    fs::write(dir.join("README.md"), "hello\n").unwrap();
    git(dir, &["init", "-q"]);
    git(dir, &["add", "."]);
    git(dir, &["commit", "-q", "-m", "initial"]);
    git(dir, &["tag", "v1.2.3"]);
    temp
}

#[test]
fn exact_tag_returns_tag_version() {
    require_git!();
    let repo = tagged_repo("");
    let version = tagver::get_version(repo.path(), false, true).unwrap();
    assert_eq!(version, "1.2.3");
}

#[test]
fn commit_past_tag_formats_distance() {
    require_git!();
    let repo = tagged_repo("");
    fs::write(repo.path().join("new.txt"), "more\n").unwrap();
    git(repo.path(), &["add", "."]);
    git(repo.path(), &["commit", "-q", "-m", "second"]);
    let rev = git_read(repo.path(), &["rev-parse", "--short=7", "HEAD"]);
    let version = tagver::get_version(repo.path(), false, true).unwrap();
    assert_eq!(version, format!("1.2.3.post1+g{rev}"));
}

#[test]
fn dirty_tree_formats_build_date() {
    require_git!();
    let repo = tagged_repo("");
    fs::write(repo.path().join("README.md"), "changed\n").unwrap();
    let version = tagver::get_version(repo.path(), false, true).unwrap();
    let re = Regex::new(r"^1\.2\.3\+d[0-9]{8}$").unwrap();
    assert!(re.is_match(&version), "unexpected version: {version}");
}

#[test]
fn untagged_repo_uses_default_tag() {
    require_git!();
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(
        dir.join("pyproject.toml"),
        "[tool.tagver]\n[tool.tagver.vcs]\ndefault-tag = \"1.0.0\"\n",
    )
    .unwrap();
    git(dir, &["init", "-q"]);
    git(dir, &["add", "."]);
    git(dir, &["commit", "-q", "-m", "initial"]);
    let version = tagver::get_version(dir, false, true).unwrap();
    assert_eq!(version, "1.0.0");
}

#[test]
fn untagged_repo_without_default_tag_uses_default_version() {
    require_git!();
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(
        dir.join("pyproject.toml"),
        "[tool.tagver]\ndefault-version = \"0.0.0+unknown\"\n",
    )
    .unwrap();
    git(dir, &["init", "-q"]);
    git(dir, &["add", "."]);
    git(dir, &["commit", "-q", "-m", "initial"]);
    let pipeline = Pipeline::from_project_dir(dir).unwrap();
    match pipeline.run(false, true).unwrap() {
        RunOutcome::Report(report) => {
            assert_eq!(report.version, "0.0.0+unknown");
            assert!(report.using_default_version);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn untagged_repo_without_fallbacks_is_no_tag_error() {
    require_git!();
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(dir.join("pyproject.toml"), "[tool.tagver]\n").unwrap();
    git(dir, &["init", "-q"]);
    git(dir, &["add", "."]);
    git(dir, &["commit", "-q", "-m", "initial"]);
    let err = tagver::get_version(dir, false, true).unwrap_err();
    assert!(matches!(err, Error::NoTag(_)), "unexpected error: {err:?}");
}

#[test]
fn match_pattern_filters_tags() {
    require_git!();
    let repo = tagged_repo("[tool.tagver.vcs]\nmatch = [\"v*\"]\n");
    git(repo.path(), &["tag", "release-9.9.9"]);
    let version = tagver::get_version(repo.path(), false, true).unwrap();
    assert_eq!(version, "1.2.3");
}

#[test]
fn tag2version_params_are_applied() {
    require_git!();
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(
        dir.join("pyproject.toml"),
        "[tool.tagver]\n[tool.tagver.tag2version]\nrmprefix = \"rel-\"\n",
    )
    .unwrap();
    git(dir, &["init", "-q"]);
    git(dir, &["add", "."]);
    git(dir, &["commit", "-q", "-m", "initial"]);
    git(dir, &["tag", "rel-2.0.1"]);
    let version = tagver::get_version(dir, false, true).unwrap();
    assert_eq!(version, "2.0.1");
}

#[test]
fn write_step_writes_configured_file() {
    require_git!();
    let repo = tagged_repo("[tool.tagver.write]\nfile = \"src/_version.py\"\n");
    let version = tagver::get_version(repo.path(), true, true).unwrap();
    assert_eq!(version, "1.2.3");
    let text = fs::read_to_string(repo.path().join("src/_version.py")).unwrap();
    assert_eq!(text, "__version__ = \"1.2.3\"\n");
}

#[test]
fn run_reports_intermediates() {
    require_git!();
    let repo = tagged_repo("");
    fs::write(repo.path().join("new.txt"), "more\n").unwrap();
    git(repo.path(), &["add", "."]);
    git(repo.path(), &["commit", "-q", "-m", "second"]);
    let pipeline = Pipeline::from_project_dir(repo.path()).unwrap();
    match pipeline.run(false, true).unwrap() {
        RunOutcome::Report(report) => {
            assert_eq!(report.base_version.as_deref(), Some("1.2.3"));
            assert_eq!(report.next_version.as_deref(), Some("1.3.0"));
            let description = report.description.unwrap();
            assert_eq!(description.tag, "v1.2.3");
            assert_eq!(description.state, "distance");
            assert!(report.template_fields.contains_key("version_tuple"));
            assert!(!report.using_default_version);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn next_version_strategy_is_configurable() {
    require_git!();
    let repo = tagged_repo("next-version = \"smallest\"\n");
    let pipeline = Pipeline::from_project_dir(repo.path()).unwrap();
    assert_eq!(pipeline.get_next_version().unwrap(), "1.2.4");
}

#[test]
fn plain_directory_without_pkg_info_is_not_sdist() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("pyproject.toml"), "[tool.tagver]\n").unwrap();
    let err = tagver::get_version(temp.path(), false, true).unwrap_err();
    assert!(
        matches!(err, Error::NotSdist(_)),
        "unexpected error: {err:?}"
    );
}

#[test]
fn unpacked_sdist_reads_pkg_info() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("pyproject.toml"), "[tool.tagver]\n").unwrap();
    fs::write(
        temp.path().join("PKG-INFO"),
        "Metadata-Version: 2.1\nName: foo\nVersion: 4.5.6\n",
    )
    .unwrap();
    let version = tagver::get_version(temp.path(), false, true).unwrap();
    assert_eq!(version, "4.5.6");
}

#[test]
fn unconfigured_project_is_not_configured_error() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("pyproject.toml"), "[tool.other]\nx = 1\n").unwrap();
    let err = tagver::get_version(temp.path(), false, true).unwrap_err();
    assert!(
        matches!(err, Error::NotConfigured(_)),
        "unexpected error: {err:?}"
    );
}

#[test]
fn tagver_toml_takes_precedence() {
    require_git!();
    let repo = tagged_repo("next-version = \"smallest\"\n");
    fs::write(
        repo.path().join("tagver.toml"),
        "[tool.tagver]\nnext-version = \"minor\"\n",
    )
    .unwrap();
    let pipeline = Pipeline::from_project_dir(repo.path()).unwrap();
    assert_eq!(pipeline.get_next_version().unwrap(), "1.3.0");
}
