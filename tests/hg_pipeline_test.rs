//! End-to-end pipeline tests against real temporary Mercurial repositories.

use std::fs;
use std::path::Path;
use std::process::Command;

use regex::Regex;
use tagver::{Error, Pipeline, RunOutcome};
use tempfile::TempDir;

fn hg_available() -> bool {
    Command::new("hg")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

macro_rules! require_hg {
    () => {
        if !hg_available() {
            eprintln!("hg not found; skipping");
            return;
        }
    };
}

fn hg(dir: &Path, args: &[&str]) {
    let output = Command::new("hg")
        .args(["--config", "ui.username=Test <test@example.com>"])
        .args(args)
        .env("HGPLAIN", "1")
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "hg {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn hg_read(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("hg")
        .args(args)
        .env("HGPLAIN", "1")
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A repository with one commit tagged `v1.2.3`. `hg tag` commits the tag
/// itself, so the working directory is left one changeset past the tagged
/// one.
fn tagged_repo() -> TempDir {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(dir.join("pyproject.toml"), "[tool.tagver]\nvcs = \"hg\"\n").unwrap();
    fs::write(dir.join("README.md"), "hello\n").unwrap();
    hg(dir, &["init"]);
    hg(dir, &["add", "pyproject.toml", "README.md"]);
    hg(dir, &["commit", "-m", "initial"]);
    hg(dir, &["tag", "v1.2.3"]);
    temp
}

#[test]
fn exact_tag_returns_tag_version() {
    require_hg!();
    let repo = tagged_repo();
    hg(repo.path(), &["update", "-r", "v1.2.3"]);
    let version = tagver::get_version(repo.path(), false, true).unwrap();
    assert_eq!(version, "1.2.3");
}

#[test]
fn tag_commit_counts_as_distance() {
    require_hg!();
    let repo = tagged_repo();
    let rev = hg_read(repo.path(), &["id", "-i"]);
    let version = tagver::get_version(repo.path(), false, true).unwrap();
    assert_eq!(version, format!("1.2.3.post1+h{rev}"));
}

#[test]
fn dirty_tree_formats_build_date() {
    require_hg!();
    let repo = tagged_repo();
    hg(repo.path(), &["update", "-r", "v1.2.3"]);
    fs::write(repo.path().join("README.md"), "changed\n").unwrap();
    let version = tagver::get_version(repo.path(), false, true).unwrap();
    let re = Regex::new(r"^1\.2\.3\+d[0-9]{8}$").unwrap();
    assert!(re.is_match(&version), "unexpected version: {version}");
}

#[test]
fn untagged_repo_uses_default_tag() {
    require_hg!();
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(
        dir.join("pyproject.toml"),
        "[tool.tagver]\n[tool.tagver.vcs]\nmethod = \"hg\"\ndefault-tag = \"1.0.0\"\n",
    )
    .unwrap();
    hg(dir, &["init"]);
    hg(dir, &["add", "pyproject.toml"]);
    hg(dir, &["commit", "-m", "initial"]);
    let version = tagver::get_version(dir, false, true).unwrap();
    assert_eq!(version, "1.0.0");
}

#[test]
fn untagged_repo_without_default_tag_is_no_tag_error() {
    require_hg!();
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(dir.join("pyproject.toml"), "[tool.tagver]\nvcs = \"hg\"\n").unwrap();
    hg(dir, &["init"]);
    hg(dir, &["add", "pyproject.toml"]);
    hg(dir, &["commit", "-m", "initial"]);
    let err = tagver::get_version(dir, false, true).unwrap_err();
    assert!(matches!(err, Error::NoTag(_)), "unexpected error: {err:?}");
}

#[test]
fn run_reports_branch_and_intermediates() {
    require_hg!();
    let repo = tagged_repo();
    let pipeline = Pipeline::from_project_dir(repo.path()).unwrap();
    match pipeline.run(false, true).unwrap() {
        RunOutcome::Report(report) => {
            let description = report.description.unwrap();
            assert_eq!(description.tag, "v1.2.3");
            assert_eq!(description.state, "distance");
            assert_eq!(description.branch.as_deref(), Some("default"));
            assert_eq!(report.base_version.as_deref(), Some("1.2.3"));
            assert_eq!(report.next_version.as_deref(), Some("1.3.0"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
