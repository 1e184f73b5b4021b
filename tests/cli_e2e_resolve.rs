//! End-to-end tests for the `resolve` and `find` commands.
//!
//! These tests invoke the actual CLI binary against platforms made of local
//! component directories.

mod common;

use common::prelude::*;

fn platform(fixture: &PlatformFixture) {
    fixture
        .file("dep", "deploy.yml", "region: {{vars.region}}\n")
        .file("dep", "stackforge.yaml", "templates: ['*.yml']\n");
    fixture.component(
        "app",
        &format!(
            "name: demo\nvars:\n  region: eu\ncomponents:\n  dep:\n    repository: {}\n\
             stacks:\n  web:\n    component: dep\n  ghost:\n    component: missing\n",
            fixture.source("dep")
        ),
    );
}

#[test]
fn test_resolve_prints_fetch_order() {
    let fixture = PlatformFixture::new();
    platform(&fixture);

    let mut cmd = cargo_bin_cmd!("stackforge");
    cmd.arg("resolve")
        .arg(fixture.source("app"))
        .arg("--workdir")
        .arg(fixture.workdir())
        .assert()
        .success()
        .stdout(predicate::str::contains("Environment: demo"))
        .stdout(predicate::str::contains("1. dep"))
        .stdout(predicate::str::contains("2. main"))
        .stdout(predicate::str::contains("Unresolved component: missing"));

    assert!(fixture.components_dir().join("dep/deploy.yml").exists());
}

#[test]
fn test_resolve_json_and_manifest() {
    let fixture = PlatformFixture::new();
    platform(&fixture);
    let out = fixture.path().join("out");

    let mut cmd = cargo_bin_cmd!("stackforge");
    let output = cmd
        .arg("resolve")
        .arg(fixture.source("app"))
        .arg("--workdir")
        .arg(fixture.workdir())
        .arg("--json")
        .arg("--manifest")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["name"], "demo");
    assert_eq!(report["fetched"][0]["id"], "dep");
    assert_eq!(report["orphans"][0], "missing");
    assert!(out.join("components.yaml").is_file());
}

#[test]
fn test_resolve_strict_fails_on_findings() {
    let fixture = PlatformFixture::new();
    platform(&fixture);

    let mut cmd = cargo_bin_cmd!("stackforge");
    cmd.arg("resolve")
        .arg(fixture.source("app"))
        .arg("--workdir")
        .arg(fixture.workdir())
        .arg("--strict")
        .assert()
        .failure()
        .stderr(predicate::str::contains("finding"));
}

#[test]
fn test_resolve_missing_descriptor_fails() {
    let fixture = PlatformFixture::new();
    fixture.bare_component("empty");

    let mut cmd = cargo_bin_cmd!("stackforge");
    cmd.arg("resolve")
        .arg(fixture.source("empty"))
        .arg("--workdir")
        .arg(fixture.workdir())
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no descriptor"));
}

#[test]
fn test_find_uses_cli_variables() {
    let fixture = PlatformFixture::new();
    platform(&fixture);

    let mut cmd = cargo_bin_cmd!("stackforge");
    cmd.arg("find")
        .arg(fixture.source("app"))
        .arg("deploy.yml")
        .arg("--workdir")
        .arg(fixture.workdir())
        .arg("--var")
        .arg("region=us")
        .assert()
        .success()
        .stdout(predicate::str::contains("dep "))
        .stdout(predicate::str::contains("(templated)"));

    // Templated copies are gone once the command returns.
    assert_eq!(fixture.component_dir_count(), 2);
}

#[test]
fn test_find_directory_without_match() {
    let fixture = PlatformFixture::new();
    platform(&fixture);

    let mut cmd = cargo_bin_cmd!("stackforge");
    cmd.arg("find")
        .arg(fixture.source("app"))
        .arg("deploy.yml")
        .arg("--directory")
        .arg("--workdir")
        .arg(fixture.workdir())
        .assert()
        .success()
        .stdout(predicate::str::contains("No component contains deploy.yml"));
}

#[test]
fn test_invalid_var_is_rejected() {
    let fixture = PlatformFixture::new();
    platform(&fixture);

    let mut cmd = cargo_bin_cmd!("stackforge");
    cmd.arg("find")
        .arg(fixture.source("app"))
        .arg("deploy.yml")
        .arg("--workdir")
        .arg(fixture.workdir())
        .arg("--var")
        .arg("no-equals-sign")
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}
