//! Report formats (SPEC_FULL.md §6/§0.6): JSON, SARIF 2.1.0, and a line-oriented CLI
//! summary, all derived purely from a `RunReport` — no re-derivation of run state, so
//! the same report is reproducible from a `RunReport` value alone.

use serde::Serialize;

use crate::driver::RunReport;
use crate::types::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    FindingsAtOrAboveThreshold,
    FilesFailed,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub files_failed: usize,
    pub findings_by_severity: Vec<(Severity, usize)>,
}

#[derive(Debug, Serialize)]
pub struct JsonFinding {
    pub file: String,
    pub layer_id: u32,
    pub signature_id: String,
    pub severity: Severity,
    pub category: String,
    pub line: u32,
    pub column: u32,
    pub matched_text: String,
}

#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub scan_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub status: Status,
    pub summary: Summary,
    pub findings: Vec<JsonFinding>,
}

pub fn build_json_report(report: &RunReport, scan_id: String, timestamp: chrono::DateTime<chrono::Utc>, duration_ms: u64, fail_on: Severity) -> JsonReport {
    let files_failed = report.files.iter().filter(|f| f.failed).count();
    let files_changed = report
        .files
        .iter()
        .filter(|f| f.results.iter().any(|r| r.success && r.change_count > 0))
        .count();

    let mut findings = Vec::new();
    for file in &report.files {
        for result in &file.results {
            for finding in &result.findings {
                findings.push(JsonFinding {
                    file: file.path.display().to_string(),
                    layer_id: result.layer_id,
                    signature_id: finding.signature_id.clone(),
                    severity: finding.severity,
                    category: finding.category.clone(),
                    line: finding.line,
                    column: finding.column,
                    matched_text: finding.matched_text.clone(),
                });
            }
        }
    }

    let mut by_severity: Vec<(Severity, usize)> = [Severity::Info, Severity::Low, Severity::Medium, Severity::High, Severity::Critical]
        .into_iter()
        .map(|s| (s, findings.iter().filter(|f| f.severity == s).count()))
        .collect();
    by_severity.retain(|(_, count)| *count > 0);

    let status = if files_failed > 0 {
        Status::FilesFailed
    } else if findings.iter().any(|f| f.severity >= fail_on) {
        Status::FindingsAtOrAboveThreshold
    } else {
        Status::Ok
    };

    JsonReport {
        scan_id,
        timestamp,
        duration_ms,
        status,
        summary: Summary {
            files_scanned: report.files.len(),
            files_changed,
            files_failed,
            findings_by_severity: by_severity,
        },
        findings,
    }
}

/// Minimal SARIF 2.1.0 log wrapping the same findings as the JSON report.
pub fn build_sarif_report(report: &RunReport) -> serde_json::Value {
    let results: Vec<serde_json::Value> = report
        .files
        .iter()
        .flat_map(|file| {
            file.results.iter().flat_map(move |result| {
                result.findings.iter().map(move |finding| {
                    serde_json::json!({
                        "ruleId": finding.signature_id,
                        "level": sarif_level(finding.severity),
                        "message": { "text": format!("{} ({})", finding.signature_id, finding.category) },
                        "locations": [{
                            "physicalLocation": {
                                "artifactLocation": { "uri": file.path.display().to_string() },
                                "region": { "startLine": finding.line, "startColumn": finding.column }
                            }
                        }]
                    })
                })
            })
        })
        .collect();

    serde_json::json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": { "driver": { "name": "neurolint", "version": env!("CARGO_PKG_VERSION") } },
            "results": results
        }]
    })
}

fn sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Info | Severity::Low => "note",
        Severity::Medium => "warning",
        Severity::High | Severity::Critical => "error",
    }
}

/// A line-oriented CLI summary. Lines at severity >= warn belong on stderr; the
/// caller is responsible for routing `warnings_and_above` there and the rest to stdout.
pub struct CliSummary {
    pub info_lines: Vec<String>,
    pub warning_lines: Vec<String>,
}

pub fn build_cli_summary(report: &RunReport) -> CliSummary {
    let mut info_lines = Vec::new();
    let mut warning_lines = Vec::new();

    for file in &report.files {
        if file.failed {
            warning_lines.push(format!("FAILED {}: {}", file.path.display(), file.failure_reason.as_deref().unwrap_or("unknown error")));
            continue;
        }
        for result in &file.results {
            if !result.success {
                warning_lines.push(format!(
                    "{} layer {}: reverted ({})",
                    file.path.display(),
                    result.layer_id,
                    result.error.as_deref().unwrap_or("validator rejected output")
                ));
            } else if result.change_count > 0 {
                info_lines.push(format!("{} layer {}: {} change(s)", file.path.display(), result.layer_id, result.change_count));
            }
            for finding in &result.findings {
                let line = format!("{}:{}:{} [{}] {}", file.path.display(), finding.line, finding.column, finding.severity, finding.signature_id);
                if finding.severity >= Severity::Medium {
                    warning_lines.push(line);
                } else {
                    info_lines.push(line);
                }
            }
        }
    }

    CliSummary { info_lines, warning_lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FileReport;
    use crate::types::{Finding, LayerResult};
    use std::path::PathBuf;

    fn sample_report() -> RunReport {
        let finding = Finding {
            signature_id: "eval-use".to_string(),
            severity: Severity::High,
            category: "injection".to_string(),
            file: PathBuf::from("a.ts"),
            line: 3,
            column: 5,
            matched_text: "eval(".to_string(),
            confidence: 0.8,
            remediation: None,
        };
        let result = LayerResult::with_findings(8, "eval(x);\n", vec![finding]);
        RunReport {
            files: vec![FileReport {
                path: PathBuf::from("a.ts"),
                results: vec![result],
                failed: false,
                failure_reason: None,
            }],
            backup_id: None,
            cancelled: false,
        }
    }

    #[test]
    fn json_report_status_reflects_threshold() {
        let run = sample_report();
        let report = build_json_report(&run, "scan-1".to_string(), chrono::Utc::now(), 10, Severity::High);
        assert_eq!(report.status, Status::FindingsAtOrAboveThreshold);
        assert_eq!(report.summary.files_scanned, 1);
    }

    #[test]
    fn json_report_ok_when_below_threshold() {
        let run = sample_report();
        let report = build_json_report(&run, "scan-2".to_string(), chrono::Utc::now(), 10, Severity::Critical);
        assert_eq!(report.status, Status::Ok);
    }

    #[test]
    fn sarif_report_has_one_result_per_finding() {
        let run = sample_report();
        let sarif = build_sarif_report(&run);
        let results = sarif["runs"][0]["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["ruleId"], "eval-use");
    }

    #[test]
    fn cli_summary_routes_high_severity_findings_to_warnings() {
        let run = sample_report();
        let summary = build_cli_summary(&run);
        assert!(summary.warning_lines.iter().any(|l| l.contains("eval-use")));
    }
}
