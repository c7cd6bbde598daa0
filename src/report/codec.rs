//! JSON boundary for reports: complete (version 1) and split (version 2).
//!
//! A split report ships a header (the root node without entries, plus the
//! names of two attachment files), a structure file holding the top-level
//! entries with every case emptied, and an assertions file mapping case uids
//! to their assertions.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::merge::AssertionsByCase;
use super::model::{Category, Entry, ReportNode};
use crate::core::errors::{ReportError, Result};

/// Names of the attachments that complete a version-2 header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitManifest {
    pub structure_file: String,
    pub assertions_file: String,
}

/// What a top-level report document turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportLayout {
    /// Everything inline.
    Complete(ReportNode),
    /// Header only; entries live in the attachments named by the manifest.
    Split {
        header: ReportNode,
        manifest: SplitManifest,
    },
}

/// Parts produced by [`split_report`].
#[derive(Debug, Clone, PartialEq)]
pub struct SplitParts {
    pub header: ReportNode,
    pub structure: Vec<ReportNode>,
    pub assertions: AssertionsByCase,
}

/// Decode a top-level report document and detect its layout.
pub fn decode_layout(json: &str) -> Result<ReportLayout> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Object(mut fields) = value else {
        return Err(ReportError::malformed("report document is not an object"));
    };

    let version = match fields.remove("version") {
        None | Some(Value::Null) => 1,
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| ReportError::malformed(format!("invalid report version {n}")))?,
        Some(other) => {
            return Err(ReportError::malformed(format!(
                "invalid report version {other}"
            )));
        }
    };

    match version {
        1 => {
            let report: ReportNode = serde_json::from_value(Value::Object(fields))?;
            validate_shape(&report)?;
            Ok(ReportLayout::Complete(report))
        }
        2 => {
            let manifest = SplitManifest {
                structure_file: take_string(&mut fields, "structure_file")?,
                assertions_file: take_string(&mut fields, "assertions_file")?,
            };
            let header: ReportNode = serde_json::from_value(Value::Object(fields))?;
            if !header.entries.is_empty() {
                return Err(ReportError::malformed(
                    "split report header must not carry entries",
                ));
            }
            Ok(ReportLayout::Split { header, manifest })
        }
        other => Err(ReportError::UnsupportedVersion { version: other }),
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Result<String> {
    match fields.remove(key) {
        Some(Value::String(name)) if !name.is_empty() => attachment_name(key, name),
        _ => Err(ReportError::malformed(format!(
            "split report header lacks `{key}`"
        ))),
    }
}

/// Attachments are siblings of the header: a single plain file name.
fn attachment_name(key: &str, name: String) -> Result<String> {
    let mut components = Path::new(&name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(ReportError::malformed(format!(
            "split report `{key}` must be a plain file name, got {name:?}"
        ))),
    }
}

/// Decode a complete report. Split headers are rejected.
pub fn decode_report(json: &str) -> Result<ReportNode> {
    match decode_layout(json)? {
        ReportLayout::Complete(report) => Ok(report),
        ReportLayout::Split { .. } => Err(ReportError::malformed(
            "expected a complete report, found a split header",
        )),
    }
}

/// Decode a structure attachment: the root's top-level entries.
pub fn decode_structure(json: &str) -> Result<Vec<ReportNode>> {
    Ok(serde_json::from_str(json)?)
}

/// Decode an assertions attachment: case uid → assertions.
pub fn decode_assertions(json: &str) -> Result<AssertionsByCase> {
    Ok(serde_json::from_str(json)?)
}

/// Rebuild the structure tree from a split header and its structure entries.
pub fn assemble_split(mut header: ReportNode, structure: Vec<ReportNode>) -> Result<ReportNode> {
    header.entries = structure.into_iter().map(Entry::Node).collect();
    validate_shape(&header)?;
    Ok(header)
}

/// Read a report from disk, following a split header to its attachments in
/// the same directory. Returns the structure tree and, for split reports,
/// the assertions map still to be merged into it.
pub fn load_report_files(path: &Path) -> Result<(ReportNode, Option<AssertionsByCase>)> {
    let text = fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
    match decode_layout(&text)? {
        ReportLayout::Complete(report) => Ok((report, None)),
        ReportLayout::Split { header, manifest } => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let structure_path = dir.join(&manifest.structure_file);
            let assertions_path = dir.join(&manifest.assertions_file);
            let structure_text = fs::read_to_string(&structure_path)
                .map_err(|e| ReportError::io(&structure_path, e))?;
            let assertions_text = fs::read_to_string(&assertions_path)
                .map_err(|e| ReportError::io(&assertions_path, e))?;

            let structure = assemble_split(header, decode_structure(&structure_text)?)?;
            Ok((structure, Some(decode_assertions(&assertions_text)?)))
        }
    }
}

/// Encode a complete report, tagged as version 1.
pub fn encode_report(report: &ReportNode) -> Result<String> {
    let mut value = serde_json::to_value(report)?;
    if let Value::Object(fields) = &mut value {
        fields.insert("version".to_owned(), Value::from(1));
    }
    Ok(serde_json::to_string(&value)?)
}

/// Encode a split header, tagged as version 2.
pub fn encode_split_header(header: &ReportNode, manifest: &SplitManifest) -> Result<String> {
    let mut value = serde_json::to_value(header)?;
    if let Value::Object(fields) = &mut value {
        fields.insert("version".to_owned(), Value::from(2));
        fields.insert("entries".to_owned(), Value::Array(Vec::new()));
        fields.insert(
            "structure_file".to_owned(),
            Value::from(manifest.structure_file.as_str()),
        );
        fields.insert(
            "assertions_file".to_owned(),
            Value::from(manifest.assertions_file.as_str()),
        );
    }
    Ok(serde_json::to_string(&value)?)
}

/// Strip every case's assertions into a separate map, leaving the header
/// and an assertion-free structure.
#[must_use]
pub fn split_report(mut report: ReportNode) -> SplitParts {
    let mut assertions = AssertionsByCase::new();
    let entries = std::mem::take(&mut report.entries);
    let structure = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Entry::Node(mut node) => {
                strip_assertions(&mut node, &mut assertions);
                Some(node)
            }
            Entry::Assertion(_) => None,
        })
        .collect();
    SplitParts {
        header: report,
        structure,
        assertions,
    }
}

fn strip_assertions(node: &mut ReportNode, out: &mut AssertionsByCase) {
    if node.is_case() {
        let taken = std::mem::take(&mut node.entries)
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::Assertion(assertion) => Some(assertion),
                Entry::Node(_) => None,
            })
            .collect();
        out.insert(node.uid.clone(), taken);
        return;
    }
    for entry in &mut node.entries {
        if let Entry::Node(child) = entry {
            strip_assertions(child, out);
        }
    }
}

/// Check the structural rules every tree must satisfy: uids unique, report
/// only at the root, cases hold only assertions, other nodes only nodes.
pub fn validate_shape(root: &ReportNode) -> Result<()> {
    let mut seen = HashSet::new();
    check_node(root, true, &mut seen)
}

fn check_node<'a>(node: &'a ReportNode, is_root: bool, seen: &mut HashSet<&'a str>) -> Result<()> {
    if !seen.insert(node.uid.as_str()) {
        return Err(ReportError::malformed(format!(
            "duplicate uid `{}`",
            node.uid
        )));
    }
    if node.category == Category::Report && !is_root {
        return Err(ReportError::malformed(format!(
            "report node `{}` nested below the root",
            node.uid
        )));
    }

    for entry in &node.entries {
        match (node.category, entry) {
            (Category::Case, Entry::Assertion(_)) => {}
            (Category::Case, Entry::Node(child)) => {
                return Err(ReportError::malformed(format!(
                    "case `{}` contains node `{}`",
                    node.uid, child.uid
                )));
            }
            (_, Entry::Assertion(assertion)) => {
                return Err(ReportError::malformed(format!(
                    "{} `{}` contains a `{}` assertion",
                    node.category.label(),
                    node.uid,
                    assertion.kind
                )));
            }
            (_, Entry::Node(child)) => check_node(child, false, seen)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::merge::merge;
    use crate::report::model::{AssertionEntry, Status, Uid};
    use crate::report::propagate::propagate;
    use serde_json::json;

    fn sample() -> ReportNode {
        ReportNode::new("plan", "Plan", Category::Report).with_child(
            ReportNode::new("mt", "Primary", Category::Group)
                .with_child(
                    ReportNode::new("c1", "test_a", Category::Case)
                        .with_assertion(AssertionEntry::new("Equal", true)),
                )
                .with_child(
                    ReportNode::new("c2", "test_b", Category::Case)
                        .with_assertion(AssertionEntry::new("Equal", false)),
                ),
        )
    }

    #[test]
    fn complete_report_round_trips() {
        let report = propagate(sample());
        let text = encode_report(&report).unwrap();
        assert!(text.contains(r#""version":1"#));
        assert_eq!(decode_report(&text).unwrap(), report);
    }

    #[test]
    fn legacy_document_without_version_is_complete() {
        let text = json!({
            "uid": "plan",
            "name": "Plan",
            "category": "testplan",
            "entries": [{
                "uid": "mt",
                "name": "Primary",
                "category": "multitest",
                "type": "TestGroupReport",
                "entries": [{
                    "uid": "c1",
                    "name": "test_a",
                    "category": "testcase",
                    "entries": [{"type": "Equal", "passed": false, "first": 1, "second": 2}]
                }]
            }]
        })
        .to_string();

        let report = decode_report(&text).unwrap();
        let case = report.find("c1").unwrap();
        assert!(case.is_case());
        assert_eq!(case.assertions().count(), 1);
        assert_eq!(propagate(report).status, Status::Failed);
    }

    #[test]
    fn split_header_is_detected() {
        let manifest = SplitManifest {
            structure_file: "report-structure.json".into(),
            assertions_file: "report-assertions.json".into(),
        };
        let parts = split_report(sample());
        let text = encode_split_header(&parts.header, &manifest).unwrap();

        match decode_layout(&text).unwrap() {
            ReportLayout::Split {
                header,
                manifest: got,
            } => {
                assert_eq!(header.uid, Uid::from("plan"));
                assert_eq!(got, manifest);
            }
            other => panic!("expected split layout, got {other:?}"),
        }
        assert!(decode_report(&text).is_err());
    }

    #[test]
    fn split_then_merge_restores_the_report() {
        let parts = split_report(sample());
        assert_eq!(parts.assertions.len(), 2);
        assert!(
            parts.structure[0]
                .find("c1")
                .is_some_and(|c| c.entries.is_empty())
        );

        let structure = assemble_split(parts.header, parts.structure).unwrap();
        let merged = merge(structure, &parts.assertions);
        assert!(merged.diagnostics.is_empty());
        assert_eq!(merged.report, propagate(sample()));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let err = decode_layout(r#"{"version": 7, "uid": "p", "name": "p", "category": "report"}"#)
            .unwrap_err();
        assert!(matches!(err, ReportError::UnsupportedVersion { version: 7 }));
    }

    #[test]
    fn split_header_without_attachments_is_malformed() {
        let err = decode_layout(
            r#"{"version": 2, "uid": "p", "name": "p", "category": "report", "structure_file": "s.json"}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "RPT-2001");
        assert!(err.to_string().contains("assertions_file"));
    }

    #[test]
    fn shape_violations_are_reported() {
        let nested_case = ReportNode::new("plan", "Plan", Category::Report).with_child(
            ReportNode::new("c1", "c1", Category::Case)
                .with_child(ReportNode::new("c2", "c2", Category::Case)),
        );
        assert!(validate_shape(&nested_case).is_err());

        let group_assertion = ReportNode::new("plan", "Plan", Category::Report)
            .with_assertion(AssertionEntry::new("Log", true));
        let err = validate_shape(&group_assertion).unwrap_err();
        assert!(err.to_string().contains("Log"), "{err}");

        let duplicate = ReportNode::new("plan", "Plan", Category::Report)
            .with_child(ReportNode::new("x", "a", Category::Group))
            .with_child(ReportNode::new("x", "b", Category::Group));
        assert!(validate_shape(&duplicate).unwrap_err().to_string().contains("duplicate"));

        let nested_report = ReportNode::new("plan", "Plan", Category::Report)
            .with_child(ReportNode::new("inner", "inner", Category::Report));
        assert!(validate_shape(&nested_report).is_err());
    }

    #[test]
    fn load_follows_split_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = SplitManifest {
            structure_file: "structure.json".into(),
            assertions_file: "assertions.json".into(),
        };
        let parts = split_report(sample());
        fs::write(
            dir.path().join("report.json"),
            encode_split_header(&parts.header, &manifest).unwrap(),
        )
        .unwrap();
        fs::write(
            dir.path().join("structure.json"),
            serde_json::to_string(&parts.structure).unwrap(),
        )
        .unwrap();
        fs::write(
            dir.path().join("assertions.json"),
            serde_json::to_string(&parts.assertions).unwrap(),
        )
        .unwrap();

        let (structure, assertions) = load_report_files(&dir.path().join("report.json")).unwrap();
        let assertions = assertions.expect("split report carries assertions");
        assert_eq!(assertions.len(), 2);
        assert_eq!(merge(structure, &assertions).report, propagate(sample()));
    }

    #[test]
    fn load_reports_missing_attachment_path() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = SplitManifest {
            structure_file: "gone.json".into(),
            assertions_file: "also-gone.json".into(),
        };
        let parts = split_report(sample());
        let path = dir.path().join("report.json");
        fs::write(&path, encode_split_header(&parts.header, &manifest).unwrap()).unwrap();

        let err = load_report_files(&path).unwrap_err();
        assert_eq!(err.code(), "RPT-3002");
        assert!(err.to_string().contains("gone.json"));
    }

    #[test]
    fn attachment_names_must_stay_beside_the_header() {
        for name in ["../secret.json", "/etc/passwd", "nested/structure.json", ".", ".."] {
            let doc = json!({
                "version": 2,
                "uid": "p",
                "name": "p",
                "category": "testplan",
                "structure_file": name,
                "assertions_file": "assertions.json"
            });
            let err = decode_layout(&doc.to_string()).unwrap_err();
            assert_eq!(err.code(), "RPT-2001", "{name}: {err}");
            assert!(err.to_string().contains("structure_file"), "{err}");
        }
    }

    #[test]
    fn testplan_shaped_document_decodes() {
        let interval = |start: &str, end: &str| json!({"run": {"start": start, "end": end}});
        let text = json!({
            "category": "testplan",
            "name": "Sample Testplan",
            "status": "failed",
            "uid": "520a92e4",
            "tags_index": {},
            "status_override": null,
            "meta": {},
            "timer": interval("2018-10-15T14:30:10.998071+00:00", "2018-10-15T14:30:11.296158+00:00"),
            "entries": [{
                "name": "Primary",
                "status": "failed",
                "category": "multitest",
                "description": null,
                "status_override": null,
                "uid": "21739167",
                "type": "TestGroupReport",
                "logs": [],
                "tags": {"simple": ["server"]},
                "timer": interval("2018-10-15T14:30:11.009705+00:00", "2018-10-15T14:30:11.159661+00:00"),
                "entries": [{
                    "category": "testcase",
                    "name": "test_equality_passing",
                    "status": "passed",
                    "status_override": null,
                    "description": null,
                    "uid": "736706ef",
                    "type": "TestCaseReport",
                    "logs": [],
                    "tags": {"colour": ["white"]},
                    "timer": interval("2018-10-15T14:30:11.010072+00:00", "2018-10-15T14:30:11.132214+00:00"),
                    "entries": [{
                        "category": "DEFAULT",
                        "machine_time": "2018-10-15T15:30:11.010098+00:00",
                        "description": "passing equality",
                        "line_no": 24,
                        "label": "==",
                        "second": 1,
                        "meta_type": "assertion",
                        "passed": true,
                        "type": "Equal",
                        "utc_time": "2018-10-15T14:30:11.010094+00:00",
                        "first": 1
                    }]
                }, {
                    "category": "testcase",
                    "name": "test_pending",
                    "uid": "interactive-case",
                    "status": "unknown",
                    "runtime_status": "ready",
                    "status_override": null,
                    "part": null,
                    "timer": {},
                    "counter": {"passed": 0, "failed": 0},
                    "entries": []
                }]
            }]
        })
        .to_string();

        let report = propagate(decode_report(&text).unwrap());
        let multitest = report.find("21739167").unwrap();
        assert_eq!(
            multitest.timer.as_ref().and_then(|t| t.duration()),
            Some(chrono::Duration::microseconds(149_956))
        );
        let pending = report.find("interactive-case").unwrap();
        assert!(pending.timer.as_ref().is_some_and(|t| t.is_empty()));

        let case = report.find("736706ef").unwrap();
        assert_eq!(case.assertions().count(), 1);
        assert_eq!(report.counter.passed, 1);
        assert!(report.tags_index["colour"].contains("white"));
    }

    #[test]
    fn broken_child_node_surfaces_its_decode_error() {
        let text = json!({
            "uid": "plan",
            "name": "Plan",
            "category": "testplan",
            "entries": [{
                "uid": "mt",
                "name": "Primary",
                "category": "multitest",
                "type": "TestGroupReport",
                "timer": {"run": {"end": "2018-10-15T14:30:11+00:00"}},
                "entries": []
            }]
        })
        .to_string();

        let err = decode_report(&text).unwrap_err();
        assert_eq!(err.code(), "RPT-2101");
        assert!(err.to_string().contains("start"), "{err}");
        assert!(!err.to_string().contains("assertion"), "{err}");
    }
}
