// End-to-end tests for the `locus` binary.
// Run with: cargo test -p locus-cli --test cli_tests -- --nocapture
//
// Every test gets its own temp workspace with an explicit --config, so the
// user's real config never leaks in.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use httpmock::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(config: &str, entities: Value) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("locus.toml"), config).unwrap();
        std::fs::write(
            dir.path().join("entities.json"),
            serde_json::to_string_pretty(&entities).unwrap(),
        )
        .unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self) -> PathBuf {
        self.path("locus.toml")
    }

    fn write(&self, name: &str, body: &str) {
        std::fs::write(self.path(name), body).unwrap();
    }

    fn entities(&self) -> Vec<Value> {
        let text = std::fs::read_to_string(self.path("entities.json")).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    fn locus(&self, args: &[&str]) -> Output {
        locus_with_config(&self.config(), args)
    }
}

fn locus_with_config(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_locus"))
        .env_remove("LOCUS_CONFIG")
        .env_remove("LOCUS_LOG")
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("run locus")
}

fn stdout_json(out: &Output) -> Value {
    serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}):\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        )
    })
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

const PLAIN_CONFIG: &str = "\
[batch]
checkpoint_every = 2
sample_limit = 5
";

fn geocoder_config(base_url: &str) -> String {
    format!(
        "\
[geocoder]
base_url = \"{base_url}\"
request_interval_ms = 0
timeout_secs = 5
max_retries = 0
"
    )
}

fn feature(lng: f64, lat: f64) -> Value {
    json!({
        "geometry": { "coordinates": [lng, lat], "type": "Point" },
        "type": "Feature",
        "properties": { "title": "" }
    })
}

// ============================================================================
// resolve --mode phone
// ============================================================================

#[test]
fn phone_pass_exits_zero_with_per_entity_failures() {
    let ws = Workspace::new(
        PLAIN_CONFIG,
        json!([
            { "id": "a", "phone": "03-1234-5678" },
            { "id": "b", "phone": "0155-11-2222" },
            { "id": "c", "phone": "090-1234-5678" },
        ]),
    );

    let out = ws.locus(&["resolve", "--mode", "phone", "--json"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let report = stdout_json(&out);
    assert_eq!(report["mode"], "phone");
    assert_eq!(report["processed"], 3);
    assert_eq!(report["outcomes"]["area_code"], 1);
    assert_eq!(report["outcomes"]["no_area_code_match"], 1);
    assert_eq!(report["outcomes"]["not_geographic"], 1);
    assert_eq!(report["unmatched_prefixes"]["0155"], 1);
    assert_eq!(report["area_codes"], "builtin-2024.2");
    assert_eq!(report["checkpoints"], 2);

    // Every entity got a record, resolved or not.
    assert!(ws.entities().iter().all(|e| e.get("location").is_some()));
    assert!(stderr(&out).contains("unmatched prefixes"));
}

#[test]
fn second_phone_pass_only_retries_unresolved() {
    let ws = Workspace::new(
        PLAIN_CONFIG,
        json!([
            { "id": "a", "phone": "03-1234-5678" },
            { "id": "b", "phone": "0155-11-2222" },
        ]),
    );
    assert!(ws.locus(&["resolve", "--mode", "phone"]).status.success());

    let out = ws.locus(&["resolve", "--mode", "phone", "--json"]);
    assert!(out.status.success());
    assert_eq!(stdout_json(&out)["processed"], 1);
}

#[test]
fn alternative_area_code_table_is_used() {
    let config = format!("{PLAIN_CONFIG}\n[paths]\narea_codes = \"codes-2026.csv\"\n");
    let ws = Workspace::new(&config, json!([{ "id": "b", "phone": "0155-11-2222" }]));
    ws.write("codes-2026.csv", "prefix,prefecture,city,lat,lng\n0155,北海道,帯広市,42.9236,143.1966\n");

    let out = ws.locus(&["resolve", "--mode", "phone", "--json"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let report = stdout_json(&out);
    assert_eq!(report["area_codes"], "codes-2026");
    assert_eq!(report["outcomes"]["area_code"], 1);
}

#[test]
fn report_written_to_output_file() {
    let ws = Workspace::new(PLAIN_CONFIG, json!([{ "id": "a", "phone": "03-1234-5678" }]));
    let report_path = ws.path("report.json");

    let out = ws.locus(&["resolve", "--mode", "phone", "--output", report_path.to_str().unwrap()]);
    assert!(out.status.success());
    assert!(out.stdout.is_empty());

    let report: Value = serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["processed"], 1);
}

// ============================================================================
// resolve --mode geocode
// ============================================================================

#[test]
fn geocode_pass_calls_api_once_per_address() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/address-search");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([feature(135.5023, 34.6937)]));
    });

    let ws = Workspace::new(
        &geocoder_config(&server.base_url()),
        json!([
            { "id": "a", "address": "大阪府大阪市北区梅田1-1" },
            { "id": "b", "address": "東京都八王子市元本郷町3-24-1" },
            { "id": "c", "phone": "03-1234-5678" },
        ]),
    );

    let out = ws.locus(&["resolve", "--mode", "geocode", "--json"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let report = stdout_json(&out);
    assert_eq!(report["processed"], 2);
    assert_eq!(report["outcomes"]["geocoded"], 2);
    assert_eq!(report["cache"]["api_calls"], 2);
    mock.assert_calls(2);
    assert!(ws.path("geocode-cache.json").exists());

    // Resolved entities are not selected again.
    let again = ws.locus(&["resolve", "--mode", "geocode", "--json"]);
    assert!(again.status.success());
    assert_eq!(stdout_json(&again)["processed"], 0);
    mock.assert_calls(2);
}

#[test]
fn geocoder_outage_is_a_per_entity_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/address-search");
        then.status(503);
    });

    let ws = Workspace::new(
        &geocoder_config(&server.base_url()),
        json!([{ "id": "a", "address": "大阪府大阪市北区梅田1-1" }]),
    );

    let out = ws.locus(&["resolve", "--mode", "geocode", "--json"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout_json(&out)["outcomes"]["geocode_unavailable"], 1);
    assert!(!ws.path("geocode-cache.json").exists());
}

#[test]
fn geocode_mode_without_geocoder_fails() {
    let ws = Workspace::new(PLAIN_CONFIG, json!([{ "id": "a", "address": "大阪府大阪市北区" }]));
    let out = ws.locus(&["resolve", "--mode", "geocode"]);
    assert_eq!(out.status.code(), Some(6));
    assert!(stderr(&out).contains("hint:"));
}

// ============================================================================
// resolve --mode validate / fix
// ============================================================================

#[test]
fn validate_writes_nothing_and_fix_applies_once() {
    let ws = Workspace::new(
        PLAIN_CONFIG,
        json!([
            { "id": "kochi", "phone": "087-800-0000",
              "service_areas": [{ "prefecture": "高知県" }] },
            { "id": "fukuoka", "phone": "011-200-0000",
              "service_areas": [{ "prefecture": "福岡県" }, { "prefecture": "佐賀県" }] },
            { "id": "tokyo", "phone": "03-1234-5678",
              "service_areas": [{ "prefecture": "東京都" }] },
        ]),
    );
    assert!(ws.locus(&["resolve", "--mode", "phone"]).status.success());
    let before = std::fs::read(ws.path("entities.json")).unwrap();

    let out = ws.locus(&["resolve", "--mode", "validate", "--json"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let report = stdout_json(&out);
    assert_eq!(report["outcomes"]["would_correct"], 1);
    assert_eq!(report["outcomes"]["flagged"], 1);
    assert_eq!(report["outcomes"]["consistent"], 1);
    assert_eq!(report["findings_by_severity"]["high"], 1);
    assert_eq!(report["samples"]["ambiguous"][0]["entity_id"], "fukuoka");
    assert_eq!(std::fs::read(ws.path("entities.json")).unwrap(), before);

    let fix = ws.locus(&["resolve", "--mode", "fix", "--json"]);
    assert!(fix.status.success());
    assert_eq!(stdout_json(&fix)["outcomes"]["corrected"], 1);

    let kochi = ws.entities().into_iter().find(|e| e["id"] == "kochi").unwrap();
    assert_eq!(kochi["location"]["resolution"]["place"]["prefecture"], "高知県");

    let again = ws.locus(&["resolve", "--mode", "fix", "--json"]);
    let report = stdout_json(&again);
    assert!(report["outcomes"].get("corrected").is_none());
    assert_eq!(report["outcomes"]["consistent"], 2);
}

// ============================================================================
// config errors
// ============================================================================

#[test]
fn missing_explicit_config_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let out = locus_with_config(&dir.path().join("nope.toml"), &["resolve", "--mode", "phone"]);
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("config file not found"));
}

#[test]
fn invalid_config_is_fatal() {
    let ws = Workspace::new("[batch]\ncheckpoint_every = 0\n", json!([]));
    let out = ws.locus(&["resolve", "--mode", "phone"]);
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("checkpoint_every"));
}

#[test]
fn missing_credential_is_fatal() {
    let config = "\
[geocoder]
base_url = \"http://127.0.0.1:9\"
api_key_env = \"LOCUS_TEST_KEY_THAT_IS_NOT_SET\"
";
    let ws = Workspace::new(config, json!([{ "id": "a", "phone": "03-1234-5678" }]));
    let out = Command::new(env!("CARGO_BIN_EXE_locus"))
        .env_remove("LOCUS_TEST_KEY_THAT_IS_NOT_SET")
        .env_remove("LOCUS_CONFIG")
        .arg("--config")
        .arg(ws.config())
        .args(["resolve", "--mode", "phone"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(4));
    assert!(stderr(&out).contains("LOCUS_TEST_KEY_THAT_IS_NOT_SET"));
}

#[test]
fn unreadable_entity_file_is_fatal() {
    let ws = Workspace::new(PLAIN_CONFIG, json!([]));
    ws.write("entities.json", "{ not json");
    let out = ws.locus(&["resolve", "--mode", "phone"]);
    assert_eq!(out.status.code(), Some(10));
}

// ============================================================================
// municipalities
// ============================================================================

const REFERENCE_CSV: &str = "\
団体コード,都道府県名,郡・政令市名,市区町村名
132012,東京都,,八王子市
271276,大阪府,大阪市,北区
";

fn municipality_config(base_url: Option<&str>) -> String {
    let mut config = String::from("[paths]\nreference_csv = \"reference.csv\"\n");
    if let Some(url) = base_url {
        config.push('\n');
        config.push_str(&geocoder_config(url));
    }
    config
}

#[test]
fn check_without_reference_is_fatal() {
    let ws = Workspace::new(PLAIN_CONFIG, json!([]));
    let out = ws.locus(&["municipalities", "check"]);
    assert_eq!(out.status.code(), Some(5));

    let ws = Workspace::new(&municipality_config(None), json!([]));
    let out = ws.locus(&["municipalities", "check"]);
    assert_eq!(out.status.code(), Some(5));
}

#[test]
fn build_then_check_is_complete() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/address-search");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([feature(139.3160, 35.6664)]));
    });
    let ws = Workspace::new(&municipality_config(Some(&server.base_url())), json!([]));
    ws.write("reference.csv", REFERENCE_CSV);

    let strict = ws.locus(&["municipalities", "check", "--strict"]);
    assert_eq!(strict.status.code(), Some(20));

    let build = ws.locus(&["municipalities", "build", "--json"]);
    assert!(build.status.success(), "stderr: {}", stderr(&build));
    assert_eq!(stdout_json(&build)["geocoded"], 2);
    mock.assert_calls(2);

    // Rebuild is a no-op against the API.
    let rebuild = ws.locus(&["municipalities", "build", "--json"]);
    assert_eq!(stdout_json(&rebuild)["skipped"], 2);
    mock.assert_calls(2);

    let check = ws.locus(&["municipalities", "check", "--strict", "--json"]);
    assert!(check.status.success());
    assert_eq!(stdout_json(&check)["present"], 2);
}

#[test]
fn overrides_fill_gaps_and_reject_points_outside_japan() {
    let ws = Workspace::new(&municipality_config(None), json!([]));
    ws.write("reference.csv", REFERENCE_CSV);
    ws.write(
        "overrides.json",
        r#"[
            {"prefecture": "東京都", "city": "八王子市", "lat": 35.6664, "lng": 139.3160},
            {"prefecture": "大阪府", "city": "大阪市北区", "lat": 34.7055, "lng": 135.4983},
            {"prefecture": "大阪府", "city": "どこか", "lat": 0.0, "lng": 0.0}
        ]"#,
    );
    let overrides = ws.path("overrides.json");

    let out = ws.locus(&["municipalities", "apply-overrides", overrides.to_str().unwrap(), "--json"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let report = stdout_json(&out);
    assert_eq!(report["applied"], 2);
    assert_eq!(report["rejected"].as_array().unwrap().len(), 1);

    assert!(ws.locus(&["municipalities", "check", "--strict"]).status.success());
}

#[test]
fn municipality_store_feeds_address_resolution() {
    let ws = Workspace::new(
        &municipality_config(None),
        json!([{ "id": "a", "phone": "0120-111-222", "address": "東京都八王子市元本郷町3-24-1" }]),
    );
    ws.write("reference.csv", REFERENCE_CSV);
    ws.write(
        "overrides.json",
        r#"[{"prefecture": "東京都", "city": "八王子市", "lat": 35.6664, "lng": 139.3160}]"#,
    );
    let overrides = ws.path("overrides.json");
    assert!(ws.locus(&["municipalities", "apply-overrides", overrides.to_str().unwrap()]).status.success());

    // No geocoder configured: the freephone number falls through to the
    // stored centroid.
    let out = ws.locus(&["resolve", "--mode", "phone", "--json"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout_json(&out)["outcomes"]["geocoded"], 1);
}

// ============================================================================
// rank / config
// ============================================================================

#[test]
fn rank_puts_premium_first_within_radius() {
    let ws = Workspace::new(
        PLAIN_CONFIG,
        json!([
            { "id": "tokyo", "branches": [{ "lat": 35.6895, "lng": 139.6917 }] },
            { "id": "yokohama", "is_premium": true, "branches": [{ "lat": 35.4437, "lng": 139.6380 }] },
            { "id": "osaka", "is_premium": true, "branches": [{ "lat": 34.6937, "lng": 135.5023 }] },
        ]),
    );

    let out = ws.locus(&["rank", "--lat", "35.681", "--lng", "139.767", "--max-km", "50", "--json"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let ids: Vec<String> = stdout_json(&out)
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["entity_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["yokohama", "tokyo"]);

    let limited = ws.locus(&["rank", "--lat", "35.681", "--lng", "139.767", "--max-km", "50", "--limit", "1", "--json"]);
    assert_eq!(stdout_json(&limited).as_array().unwrap().len(), 1);
}

#[test]
fn rank_rejects_negative_radius() {
    let ws = Workspace::new(PLAIN_CONFIG, json!([]));
    let out = ws.locus(&["rank", "--lat", "35.0", "--lng", "139.0", "--max-km", "-1"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn config_show_and_path() {
    let ws = Workspace::new(PLAIN_CONFIG, json!([]));

    let path = ws.locus(&["config", "path"]);
    assert!(path.status.success());
    assert_eq!(String::from_utf8_lossy(&path.stdout).trim(), ws.config().display().to_string());

    let show = ws.locus(&["config", "show"]);
    assert!(show.status.success());
    let text = String::from_utf8_lossy(&show.stdout);
    assert!(text.contains("[batch]"));
    assert!(text.contains("checkpoint_every = 2"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let ws = Workspace::new(PLAIN_CONFIG, json!([]));
    let fresh = ws.path("sub/locus.toml");

    let out = ws.locus(&["config", "init", "--path", fresh.to_str().unwrap()]);
    assert!(out.status.success());
    assert!(fresh.exists());

    let again = ws.locus(&["config", "init", "--path", fresh.to_str().unwrap()]);
    assert_eq!(again.status.code(), Some(3));
}
