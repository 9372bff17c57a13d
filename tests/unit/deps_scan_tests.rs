//! Unit tests for the dependency scanning primitives.

use std::fs;

use cellbook::deps::{install_needed, undeclared_imports};

#[test]
fn no_manifest_means_no_install_needed() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(!install_needed(dir.path()).expect("check runs"));
}

#[test]
fn manifest_without_node_modules_is_stale() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("package.json"), "{}").expect("write manifest");
    assert!(install_needed(dir.path()).expect("check runs"));
}

#[test]
fn missing_lockfile_is_stale() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("package.json"), "{}").expect("write manifest");
    fs::create_dir(dir.path().join("node_modules")).expect("mkdir node_modules");
    assert!(install_needed(dir.path()).expect("check runs"));
}

#[test]
fn lockfile_at_least_as_new_as_manifest_is_current() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("package.json"), "{}").expect("write manifest");
    fs::create_dir(dir.path().join("node_modules")).expect("mkdir node_modules");
    fs::write(dir.path().join("package-lock.json"), "{}").expect("write lockfile");
    assert!(!install_needed(dir.path()).expect("check runs"));
}

#[test]
fn finds_imports_missing_from_the_manifest() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("package.json"),
        r#"{"dependencies":{"lodash":"^4.0.0"}}"#,
    )
    .expect("write manifest");
    fs::write(
        dir.path().join("a.js"),
        "import _ from 'lodash';\nimport express from 'express';\n",
    )
    .expect("write script");
    fs::write(dir.path().join("b.js"), "const z = require(\"zod\");\n").expect("write script");

    let missing = undeclared_imports(dir.path()).expect("scan runs");
    assert_eq!(missing, vec!["express".to_owned(), "zod".to_owned()]);
}

#[test]
fn relative_and_builtin_imports_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("package.json"), "{}").expect("write manifest");
    fs::write(
        dir.path().join("a.mjs"),
        "import './local.js';\nimport fs from 'node:fs';\nimport path from 'path';\n",
    )
    .expect("write script");

    let missing = undeclared_imports(dir.path()).expect("scan runs");
    assert!(missing.is_empty(), "unexpected: {missing:?}");
}

#[test]
fn scoped_packages_keep_their_scope() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("package.json"), "{}").expect("write manifest");
    fs::write(
        dir.path().join("a.js"),
        "import { z } from '@scope/pkg/sub';\n",
    )
    .expect("write script");

    let missing = undeclared_imports(dir.path()).expect("scan runs");
    assert_eq!(missing, vec!["@scope/pkg".to_owned()]);
}

#[test]
fn dev_dependencies_count_as_declared() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("package.json"),
        r#"{"devDependencies":{"vitest":"^1.0.0"}}"#,
    )
    .expect("write manifest");
    fs::write(dir.path().join("a.ts"), "import { test } from 'vitest';\n").expect("write script");

    let missing = undeclared_imports(dir.path()).expect("scan runs");
    assert!(missing.is_empty(), "unexpected: {missing:?}");
}

#[test]
fn bare_import_statement_is_scanned() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("package.json"), "{}").expect("write manifest");
    fs::write(dir.path().join("a.js"), "import 'dotenv/config';\n").expect("write script");

    let missing = undeclared_imports(dir.path()).expect("scan runs");
    assert_eq!(missing, vec!["dotenv".to_owned()]);
}

#[test]
fn invalid_manifest_is_a_deps_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("package.json"), "not json").expect("write manifest");
    assert!(undeclared_imports(dir.path()).is_err());
}
