//! Integration tests for the CLI binary.
//!
//! Drives the `aiss` binary through a full identity, claim and revocation
//! cycle in a temporary data directory.
//!
//! This test is registered as a [[test]] in the agentic-issuer-cli crate
//! so that CARGO_BIN_EXE_aiss is available.

use std::path::Path;
use std::process::{Command, Output};

const PASSPHRASE: &str = "cli-test-passphrase";

/// Get a Command pointing to the `aiss` binary.
fn aiss_binary() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_aiss"));
    cmd.env_remove("AISS_PASSPHRASE").env_remove("AISS_HOME");
    cmd
}

/// Run `aiss` against `dir` and return its output.
fn aiss(dir: &Path, args: &[&str]) -> Output {
    aiss_binary()
        .arg("--dir")
        .arg(dir)
        .arg("--passphrase")
        .arg(PASSPHRASE)
        .args(args)
        .output()
        .expect("failed to execute aiss")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{what} should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// The value following `label` on the first line that starts with it.
fn field(text: &str, label: &str) -> String {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(label))
        .map(|rest| rest.split_whitespace().next().unwrap_or("").to_string())
        .unwrap_or_else(|| panic!("no {label:?} in output:\n{text}"))
}

fn write_schema(dir: &Path) {
    let schemas = dir.join("schemas");
    std::fs::create_dir_all(&schemas).unwrap();
    std::fs::write(
        schemas.join("kyc.json"),
        r#"{
            "$metadata": {"uris": {"jsonLdContext": "https://schemas.example/kyc.jsonld"}},
            "properties": {"credentialSubject": {"required": ["id", "birthday"]}}
        }"#,
    )
    .unwrap();
}

#[test]
fn cli_responds_to_help() {
    let output = aiss_binary()
        .arg("--help")
        .output()
        .expect("failed to execute aiss --help");

    assert_success(&output, "aiss --help");
    let out = stdout(&output);
    assert!(
        out.contains("aiss") || out.contains("AgenticIssuer") || out.contains("Usage"),
        "aiss --help output should contain usage information, got: {out}"
    );
}

#[test]
fn publish_help_explains_block_numbering() {
    let output = aiss_binary()
        .args(["publish", "--help"])
        .output()
        .expect("failed to execute aiss publish --help");

    assert_success(&output, "aiss publish --help");
    let out = stdout(&output);
    assert!(out.contains("restart at 1"), "publish help: {out}");
}

#[test]
fn cli_responds_to_version() {
    let output = aiss_binary()
        .arg("--version")
        .output()
        .expect("failed to execute aiss --version");

    assert_success(&output, "aiss --version");
    assert!(stdout(&output).contains("aiss"));
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = aiss_binary()
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute aiss");
    assert!(!output.status.success());
}

#[test]
fn cli_rejects_malformed_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let output = aiss(dir.path(), &["show", "did:example:nope"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid identifier"), "stderr: {stderr}");
}

#[test]
fn cli_identity_claim_revocation_cycle() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path());

    // ── init ────────────────────────────────────────────────────────────
    let output = aiss(dir.path(), &["init"]);
    assert_success(&output, "aiss init");
    let out = stdout(&output);
    let id = field(&out, "ID:");
    assert!(id.starts_with("did:aiss:"), "unexpected id {id}");
    assert!(out.contains("(confirmed)"), "genesis should be published:\n{out}");

    // ── issue ───────────────────────────────────────────────────────────
    let output = aiss(
        dir.path(),
        &[
            "issue",
            &id,
            "--schema",
            "kyc.json",
            "--type",
            "KYCAgeCredential",
            "--subject",
            r#"{"id":"did:example:alice","birthday":19960424}"#,
        ],
    );
    assert_success(&output, "aiss issue");
    let out = stdout(&output);
    let claim_id = field(&out, "Issued claim");
    let nonce = field(&out, "Nonce:");
    assert!(claim_id.starts_with("aclm_"));

    // A second identical claim is a duplicate.
    let output = aiss(
        dir.path(),
        &[
            "issue",
            &id,
            "--schema",
            "kyc.json",
            "--type",
            "KYCAgeCredential",
            "--subject",
            r#"{"id":"did:example:alice","birthday":19960424}"#,
        ],
    );
    assert!(!output.status.success());

    // ── claim ───────────────────────────────────────────────────────────
    let output = aiss(dir.path(), &["claim", &id, &claim_id]);
    assert_success(&output, "aiss claim");
    let out = stdout(&output);
    assert!(out.contains("Signature: valid"), "{out}");
    assert!(out.contains("Inclusion: valid"), "{out}");

    let output = aiss(dir.path(), &["claim", &id, &claim_id, "--credential"]);
    assert_success(&output, "aiss claim --credential");
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["issuer"], serde_json::json!(id));

    // ── status / revoke ─────────────────────────────────────────────────
    let output = aiss(dir.path(), &["status", &id, &nonce]);
    assert_success(&output, "aiss status");
    let out = stdout(&output);
    assert!(out.contains("not revoked"), "{out}");
    assert!(out.contains("Proof: valid"), "{out}");

    let output = aiss(dir.path(), &["revoke", &id, &nonce, "--reason", "superseded"]);
    assert_success(&output, "aiss revoke");

    let output = aiss(dir.path(), &["status", &id, &nonce]);
    assert_success(&output, "aiss status");
    let out = stdout(&output);
    assert!(out.contains("REVOKED"), "{out}");
    assert!(out.contains("superseded"), "{out}");
    assert!(out.contains("Proof: valid"), "{out}");

    // ── states / show / list ────────────────────────────────────────────
    let output = aiss(dir.path(), &["states", &id]);
    assert_success(&output, "aiss states");
    let out = stdout(&output);
    assert_eq!(out.matches("confirmed").count(), 3, "{out}");

    let output = aiss(dir.path(), &["show", &id]);
    assert_success(&output, "aiss show");
    assert!(stdout(&output).contains("1 claim(s), 1 revocation(s)"));

    let output = aiss(dir.path(), &["list"]);
    assert_success(&output, "aiss list");
    assert!(stdout(&output).contains(&id));

    // Nothing left to publish.
    let output = aiss(dir.path(), &["publish", &id]);
    assert_success(&output, "aiss publish");
    assert!(stdout(&output).contains("Nothing to publish"));
}

#[test]
fn cli_no_publish_leaves_state_pending() {
    let dir = tempfile::tempdir().unwrap();
    let output = aiss(dir.path(), &["init", "--no-publish"]);
    assert_success(&output, "aiss init --no-publish");
    let out = stdout(&output);
    let id = field(&out, "ID:");
    assert!(out.contains("(pending)"), "{out}");

    let output = aiss(dir.path(), &["publish", &id]);
    assert_success(&output, "aiss publish");
    assert!(stdout(&output).contains("(confirmed)"));
}
