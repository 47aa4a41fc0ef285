//! Integration tests for the KeyVault CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`.
//! Interactive prompts are avoided: values come from flags or piped
//! stdin, and destructive commands run with `--force`.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

/// Helper: get a Command pointing at the keyvault binary.
fn keyvault() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("keyvault").expect("binary should exist");
    cmd.env_remove("KEYVAULT_USER")
        .env_remove("KEYVAULT_INSTANCE")
        .env_remove("KEYVAULT_LOG");
    cmd
}

/// Helper: a command bound to `tmp`'s instance, acting as `user`.
fn as_user(tmp: &TempDir, user: &str) -> Command {
    let mut cmd = keyvault();
    cmd.current_dir(tmp.path()).args(["--as", user]);
    cmd
}

/// Helper: an initialized instance with admin "admin".
fn initialized() -> TempDir {
    let tmp = TempDir::new().unwrap();
    keyvault()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success();
    tmp
}

#[test]
fn help_flag_shows_usage() {
    keyvault()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Self-hosted secrets vault"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("share"))
        .stdout(predicate::str::contains("audit"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("import"));
}

#[test]
fn version_flag_shows_version() {
    keyvault()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("keyvault"));
}

#[test]
fn no_args_shows_help() {
    keyvault().assert().failure();
}

#[test]
fn init_creates_instance_files() {
    let tmp = initialized();
    tmp.child("instance/keyvault.db").assert(predicate::path::exists());
    tmp.child("instance/encryption.key").assert(predicate::path::exists());
    tmp.child("instance/keyvault.toml").assert(predicate::path::exists());
}

#[test]
fn init_twice_fails() {
    let tmp = initialized();
    keyvault()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn commands_require_an_acting_user() {
    let tmp = initialized();
    keyvault()
        .current_dir(tmp.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--as"));
}

#[test]
fn add_show_and_delete_a_secret() {
    let tmp = initialized();

    as_user(&tmp, "admin")
        .args(["add", "--name", "DB-root", "--username", "root", "--prompt-password"])
        .write_stdin("p@ss\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Added secret 'DB-root' (id 1)"));

    as_user(&tmp, "admin")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("DB-root"));

    as_user(&tmp, "admin")
        .args(["show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("root"))
        .stdout(predicate::str::contains("p@ss").not());

    as_user(&tmp, "admin")
        .args(["show", "1", "--reveal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("p@ss"));

    as_user(&tmp, "admin")
        .args(["delete", "1", "--force"])
        .assert()
        .success();

    as_user(&tmp, "admin")
        .args(["show", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found or access denied"));
}

#[test]
fn inline_password_warns_about_history() {
    let tmp = initialized();
    as_user(&tmp, "admin")
        .args(["add", "--name", "x", "--password", "hunter2"])
        .assert()
        .success()
        .stderr(predicate::str::contains("shell history"));
}

#[test]
fn sharing_through_the_cli() {
    let tmp = initialized();
    as_user(&tmp, "admin")
        .args(["user", "add", "bob"])
        .assert()
        .success();
    as_user(&tmp, "admin")
        .args(["add", "--name", "shared-db", "--password", "pw"])
        .assert()
        .success();

    // Bob cannot see it yet, and the error does not reveal existence.
    as_user(&tmp, "bob")
        .args(["show", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found or access denied"));

    as_user(&tmp, "admin")
        .args(["share", "1", "--user", "bob"])
        .assert()
        .success();

    as_user(&tmp, "bob")
        .args(["list", "--shared"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shared-db"));

    as_user(&tmp, "bob")
        .args(["edit", "1", "--notes", "mine"])
        .assert()
        .failure();

    as_user(&tmp, "admin")
        .args(["audit", "--action", "secret_updated"])
        .assert()
        .success()
        .stdout(predicate::str::contains("failed"));
}

#[test]
fn audit_is_admin_only() {
    let tmp = initialized();
    as_user(&tmp, "admin")
        .args(["user", "add", "carol"])
        .assert()
        .success();
    as_user(&tmp, "carol")
        .arg("audit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Access denied"));
}

#[test]
fn export_and_import_json() {
    let tmp = initialized();
    as_user(&tmp, "admin")
        .args(["add", "--name", "api", "--api-key", "ak-1", "--category", "api_key"])
        .assert()
        .success();

    let export = tmp.child("export.json");
    as_user(&tmp, "admin")
        .args(["export", "--output"])
        .arg(export.path())
        .assert()
        .success();
    export.assert(predicate::str::contains("\"ak-1\""));

    as_user(&tmp, "admin")
        .arg("import")
        .arg(export.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 secrets"));
}

#[test]
fn import_missing_file_fails() {
    let tmp = initialized();
    as_user(&tmp, "admin")
        .args(["import", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("import file not found"));
}

#[test]
fn completions_generate_for_bash() {
    keyvault()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keyvault"));
}
