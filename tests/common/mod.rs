#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use report_tree::core::config::Config;
use report_tree::core::errors::Result;
use report_tree::session::{LoadOutcome, ReportSession, SessionSnapshot};
use serde_json::{Value, json};

pub struct LoadResult {
    pub outcome: Result<LoadOutcome>,
    pub snapshot: SessionSnapshot,
    pub session: ReportSession,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Load `report_path` in a fresh session whose activity log goes to a
/// per-case file under the temp dir, so failures can be inspected.
pub fn run_load_case(case_name: &str, report_path: &Path) -> LoadResult {
    let root = std::env::temp_dir().join("report-tree-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");
    let log_path = root.join(format!("{}-{}.jsonl", sanitize(case_name), now_millis()));

    let mut config = Config::default();
    config.logging.enabled = true;
    config.logging.jsonl_path = log_path.clone();
    config.logging.fallback_path = None;

    let session = ReportSession::new(config);
    let outcome = session.load_file(report_path);
    session.flush_log();
    let snapshot = session.snapshot();

    LoadResult {
        outcome,
        snapshot,
        session,
        log_path,
    }
}

/// Event names from a JSONL activity log, in order.
pub fn logged_events(log_path: &Path) -> Vec<String> {
    let text = fs::read_to_string(log_path).unwrap_or_default();
    text.lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|v| v["event"].as_str().map(str::to_owned))
        .collect()
}

fn assertion(kind: &str, passed: bool, description: &str) -> Value {
    json!({
        "type": kind,
        "passed": passed,
        "description": description,
        "line_no": 24,
        "utc_time": "2018-10-15T14:30:11.009705+00:00",
        "machine_time": "2018-10-15T15:30:11.009710+01:00",
        "meta_type": "assertion"
    })
}

fn case(uid: &str, name: &str, entries: Vec<Value>) -> Value {
    json!({
        "uid": uid,
        "name": name,
        "category": "testcase",
        "type": "TestCaseReport",
        "tags": {},
        "timer": {
            "run": {
                "start": "2018-10-15T14:30:11.009000+00:00",
                "end": "2018-10-15T14:30:11.010000+00:00"
            }
        },
        "entries": entries,
        "logs": []
    })
}

fn group(uid: &str, name: &str, category: &str, tags: Value, entries: Vec<Value>) -> Value {
    json!({
        "uid": uid,
        "name": name,
        "category": category,
        "type": "TestGroupReport",
        "tags": tags,
        "entries": entries,
        "logs": []
    })
}

/// A two-multitest plan with one failing dict comparison.
pub fn sample_report() -> Value {
    let dict_match = json!({
        "type": "DictMatch",
        "passed": false,
        "description": "config matches",
        "comparison": [
            ["foo", [
                ["alpha", "mismatch", "blue", "red"],
                ["beta", "match", "green", "green"]
            ]],
            ["bar", "match", true, true]
        ]
    });

    json!({
        "uid": "plan",
        "name": "Sample Testplan",
        "category": "testplan",
        "tags": {},
        "entries": [
            group("mt-primary", "Primary", "multitest", json!({"simple": ["server"]}), vec![
                group("suite-alpha", "AlphaSuite", "testsuite", json!({}), vec![
                    case("tc-equal", "test_equality", vec![
                        assertion("Equal", true, "one equals one"),
                        assertion("Greater", true, "two over one"),
                    ]),
                    case("tc-dict", "test_dict", vec![dict_match]),
                ]),
            ]),
            group("mt-secondary", "Secondary", "multitest", json!({"colour": ["white"]}), vec![
                group("suite-beta", "BetaSuite", "testsuite", json!({}), vec![
                    case("tc-log", "test_log", vec![assertion("Log", true, "hello")]),
                ]),
            ]),
        ],
        "logs": []
    })
}

/// Write `report` as a complete (version 1) document.
pub fn write_complete(dir: &Path, report: &Value) -> PathBuf {
    let mut doc = report.clone();
    doc["version"] = json!(1);
    let path = dir.join("report.json");
    fs::write(&path, doc.to_string()).expect("write report");
    path
}

/// Write `report` split into header, structure and assertions files.
pub fn write_split(dir: &Path, report: &Value) -> PathBuf {
    let mut header = report.clone();
    let mut structure = header["entries"].take();
    let mut assertions = serde_json::Map::new();
    strip_cases(&mut structure, &mut assertions);

    header["entries"] = json!([]);
    header["version"] = json!(2);
    header["structure_file"] = json!("report-structure.json");
    header["assertions_file"] = json!("report-assertions.json");

    fs::write(dir.join("report-structure.json"), structure.to_string()).expect("write structure");
    fs::write(
        dir.join("report-assertions.json"),
        Value::Object(assertions).to_string(),
    )
    .expect("write assertions");
    let path = dir.join("report.json");
    fs::write(&path, header.to_string()).expect("write header");
    path
}

fn strip_cases(entries: &mut Value, out: &mut serde_json::Map<String, Value>) {
    let Some(items) = entries.as_array_mut() else {
        return;
    };
    for item in items {
        if item["category"] == "testcase" {
            let uid = item["uid"].as_str().expect("case uid").to_owned();
            out.insert(uid, item["entries"].take());
            item["entries"] = json!([]);
        } else {
            strip_cases(&mut item["entries"], out);
        }
    }
}
