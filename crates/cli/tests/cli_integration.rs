//! CLI integration tests for the offline subcommands.
//!
//! Uses `assert_cmd` to spawn the `passage` binary and verify exit
//! codes, stdout content, and stderr content. Fixtures are written to
//! temporary directories so tests never touch the repo tree.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper: create a Command for the `passage` binary.
fn passage() -> Command {
    cargo_bin_cmd!("passage")
}

/// Helper: write a JSON fixture into `dir` and return its path.
fn write_fixture(dir: &TempDir, name: &str, content: &Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string_pretty(content).unwrap()).unwrap();
    path
}

fn compliant_payload() -> Value {
    serde_json::json!({
        "id": "urn:dpp:asset-100",
        "product_name": "Smart Meter",
        "product_category": "electronics",
        "description": "A connected electricity meter.",
        "weee": {
            "registration_number": "WEEE-DE-1234",
            "takeback_scheme": "national-takeback"
        },
        "rohs": { "compliant": true }
    })
}

fn graph(node_ids: &[&str]) -> Value {
    let nodes: Vec<Value> = node_ids
        .iter()
        .map(|id| serde_json::json!({"id": id, "label": id, "type": "asset"}))
        .collect();
    serde_json::json!({"nodes": nodes, "edges": []})
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    passage()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Digital product passport dataspace simulator",
        ));
}

#[test]
fn version_exits_0() {
    passage()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("passage"));
}

#[test]
fn check_help_exits_0() {
    passage()
        .args(["check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--payload"));
}

// ──────────────────────────────────────────────
// 2. Check subcommand
// ──────────────────────────────────────────────

#[test]
fn check_compliant_payload_reports_compliant() {
    let dir = TempDir::new().unwrap();
    let payload = write_fixture(&dir, "payload.json", &compliant_payload());

    passage()
        .args(["check", "--payload"])
        .arg(&payload)
        .assert()
        .success()
        .stdout(predicate::str::contains("status: compliant"));
}

#[test]
fn check_incomplete_payload_lists_violations_but_exits_0() {
    let dir = TempDir::new().unwrap();
    let payload = write_fixture(&dir, "payload.json", &serde_json::json!({}));

    // A non-compliant verdict is a successful check, not a CLI failure.
    passage()
        .args(["check", "--payload"])
        .arg(&payload)
        .assert()
        .success()
        .stdout(predicate::str::contains("status: non-compliant"))
        .stdout(predicate::str::contains("$.product_name"));
}

#[test]
fn check_json_output_carries_the_summary() {
    let dir = TempDir::new().unwrap();
    let payload = write_fixture(&dir, "payload.json", &serde_json::json!({}));

    let output = passage()
        .args(["check", "--output", "json", "--payload"])
        .arg(&payload)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output).expect("valid JSON report");
    assert_eq!(report["status"], "non-compliant");
    assert_eq!(
        report["summary"]["violations"],
        report["violations"].as_array().map(|a| a.len() as u64).unwrap()
    );
}

#[test]
fn check_respects_the_regulations_filter() {
    let dir = TempDir::new().unwrap();
    // Satisfies ESPR but nothing else.
    let payload = write_fixture(
        &dir,
        "payload.json",
        &serde_json::json!({
            "id": "urn:dpp:asset-100",
            "product_name": "Smart Meter",
            "product_category": "electronics",
            "description": "A connected electricity meter."
        }),
    );

    passage()
        .args(["check", "--regulations", "ESPR", "--payload"])
        .arg(&payload)
        .assert()
        .success()
        .stdout(predicate::str::contains("status: compliant"));
}

#[test]
fn check_with_missing_file_exits_1() {
    passage()
        .args(["check", "--payload", "no-such-file.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error reading"));
}

#[test]
fn check_with_invalid_json_exits_1() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{not json").unwrap();

    passage()
        .args(["check", "--payload"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error parsing JSON"));
}

#[test]
fn check_with_custom_rule_book() {
    let dir = TempDir::new().unwrap();
    let rules = write_fixture(
        &dir,
        "rules.json",
        &serde_json::json!({
            "version": 1,
            "regulations": {
                "House Rules": [{
                    "id": "rule-color",
                    "path": "$.color",
                    "required": true,
                    "severity": "error",
                    "message": "color is required"
                }]
            }
        }),
    );
    let payload = write_fixture(&dir, "payload.json", &serde_json::json!({}));

    passage()
        .args(["check", "--regulations", "House Rules"])
        .arg("--rules")
        .arg(&rules)
        .arg("--payload")
        .arg(&payload)
        .assert()
        .success()
        .stdout(predicate::str::contains("color is required"));
}

// ──────────────────────────────────────────────
// 3. Diff subcommand
// ──────────────────────────────────────────────

#[test]
fn diff_identical_graphs_exits_0() {
    let dir = TempDir::new().unwrap();
    let from = write_fixture(&dir, "from.json", &graph(&["a", "b"]));
    let to = write_fixture(&dir, "to.json", &graph(&["a", "b"]));

    passage()
        .args(["diff", "--from"])
        .arg(&from)
        .arg("--to")
        .arg(&to)
        .assert()
        .success()
        .stdout(predicate::str::contains("no differences"));
}

#[test]
fn diff_different_graphs_exits_1_with_ids() {
    let dir = TempDir::new().unwrap();
    let from = write_fixture(&dir, "from.json", &graph(&["a"]));
    let to = write_fixture(&dir, "to.json", &graph(&["a", "b"]));

    passage()
        .args(["diff", "--from"])
        .arg(&from)
        .arg("--to")
        .arg(&to)
        .assert()
        .failure()
        .stdout(predicate::str::contains("nodes added: b"));
}

#[test]
fn diff_json_output_has_zeroed_summary_for_equal_graphs() {
    let dir = TempDir::new().unwrap();
    let from = write_fixture(&dir, "from.json", &graph(&["a"]));
    let to = write_fixture(&dir, "to.json", &graph(&["a"]));

    let output = passage()
        .args(["diff", "--output", "json", "--from"])
        .arg(&from)
        .arg("--to")
        .arg(&to)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let result: Value = serde_json::from_slice(&output).expect("valid JSON diff");
    assert_eq!(result["summary"]["nodes_added"], 0);
    assert_eq!(result["summary"]["nodes_removed"], 0);
    assert_eq!(result["summary"]["edges_added"], 0);
}

#[test]
fn diff_rejects_a_graph_with_dangling_edges() {
    let dir = TempDir::new().unwrap();
    let broken = write_fixture(
        &dir,
        "broken.json",
        &serde_json::json!({
            "nodes": [{"id": "a", "label": "a", "type": "asset"}],
            "edges": [{"id": "e1", "source": "a", "target": "ghost"}]
        }),
    );
    let to = write_fixture(&dir, "to.json", &graph(&["a"]));

    passage()
        .args(["diff", "--from"])
        .arg(&broken)
        .arg("--to")
        .arg(&to)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a node"));
}

// ──────────────────────────────────────────────
// 4. Validate subcommand
// ──────────────────────────────────────────────

#[test]
fn validate_accepts_a_well_formed_rule_book() {
    let dir = TempDir::new().unwrap();
    let rules = write_fixture(
        &dir,
        "rules.json",
        &serde_json::json!({
            "version": 1,
            "regulations": {
                "ESPR": [{
                    "id": "rule-1",
                    "path": "$.name",
                    "required": true,
                    "severity": "error",
                    "message": "name is required"
                }]
            }
        }),
    );

    passage()
        .args(["validate", "--rules"])
        .arg(&rules)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn validate_rejects_a_book_without_regulations() {
    let dir = TempDir::new().unwrap();
    let rules = write_fixture(&dir, "rules.json", &serde_json::json!({"version": 1}));

    passage()
        .args(["validate", "--rules"])
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid rule book"));
}

#[test]
fn validate_rejects_duplicate_rule_ids() {
    let dir = TempDir::new().unwrap();
    let rule = serde_json::json!({
        "id": "rule-dup",
        "path": "$.name",
        "required": true,
        "severity": "error",
        "message": "name is required"
    });
    let rules = write_fixture(
        &dir,
        "rules.json",
        &serde_json::json!({
            "version": 1,
            "regulations": { "ESPR": [rule.clone(), rule] }
        }),
    );

    passage()
        .args(["validate", "--rules"])
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("rule-dup"));
}

#[test]
fn validate_bundled_default_rules() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .expect("workspace root")
        .to_path_buf();

    passage()
        .args(["validate", "--rules"])
        .arg(root.join("crates/rules/data/default-rules.json"))
        .assert()
        .success();
}

// ──────────────────────────────────────────────
// 5. Run subcommand (in-process driver)
// ──────────────────────────────────────────────

#[test]
fn run_drives_the_canonical_journey_to_completion() {
    passage()
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("status=completed"))
        .stdout(predicate::str::contains("create-dpp: completed"))
        .stdout(predicate::str::contains(
            "INITIAL -> REQUEST -> REQUESTED -> OFFER -> ACCEPT",
        ));
}

#[test]
fn run_json_transcript_links_all_artifacts() {
    let output = passage()
        .args(["run", "--output", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let transcript: Value = serde_json::from_slice(&output).expect("valid JSON transcript");

    assert_eq!(transcript["run"]["status"], "completed");
    assert_eq!(
        transcript["run"]["steps"].as_array().map(|a| a.len()),
        Some(5)
    );
    assert_eq!(transcript["negotiation"]["state"], "ACCEPT");
    assert_eq!(transcript["transfer"]["state"], "COMPLETE");
    assert_eq!(transcript["feedback"]["score"], 5);
    // Five step snapshots; the diff spans first to last.
    assert_eq!(
        transcript["twin"]["timeline"].as_array().map(|a| a.len()),
        Some(5)
    );
    assert_eq!(transcript["diff"]["diff"]["summary"]["nodes_removed"], 0);
}

#[test]
fn run_with_payload_override_reaches_the_transcript() {
    let dir = TempDir::new().unwrap();
    let overrides = write_fixture(
        &dir,
        "overrides.json",
        &serde_json::json!({
            "create-dpp": {
                "id": "urn:dpp:asset-042",
                "product_name": "Traction Battery",
                "product_category": "battery",
                "battery": { "chemistry": "LFP", "capacity_kwh": 62.0 }
            }
        }),
    );

    let output = passage()
        .args(["run", "--output", "json", "--payload"])
        .arg(&overrides)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let transcript: Value = serde_json::from_slice(&output).expect("valid JSON transcript");
    assert_eq!(transcript["run"]["metadata"]["dpp_id"], "urn:dpp:asset-042");
    assert_eq!(transcript["twin"]["dpp_id"], "urn:dpp:asset-042");
}

#[test]
fn run_with_unknown_template_exits_1() {
    passage()
        .args(["run", "--template", "no-such-template"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn run_quiet_text_output_is_one_line() {
    let output = passage()
        .args(["run", "--quiet"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.contains("status=completed"));
}
