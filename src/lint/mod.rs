// SPDX-License-Identifier: MIT
//! Lint dispatcher.
//!
//! Changed files are grouped by language, then each bucket is analyzed with
//! the strategy configured for that language: external analyzer processes
//! for python, javascript, typescript, and go, in-process pattern rules for
//! java and csharp. Strategy failures are isolated per file; the dispatcher
//! always returns a report map covering every recognized language present.

pub mod language;
pub mod model;
pub mod rules;
pub mod tools;

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info};

use crate::diff::DiffDocument;
use language::{group_by_language, Language};
use model::LintReport;

/// Analyze every recognized file in the diff, one report per language.
///
/// Languages with no recognized files are absent from the result. A language
/// whose analysis produced no findings still gets an entry with an empty
/// findings list.
pub async fn analyze(diff: &DiffDocument, tool_timeout: Duration) -> BTreeMap<Language, LintReport> {
    let buckets = group_by_language(diff.files.iter());
    debug!(languages = buckets.len(), "grouped changed files by language");

    let mut reports = BTreeMap::new();
    for (language, bucket) in &buckets {
        let findings = match rules::rules_for(*language) {
            Some(rule_table) => rules::apply(rule_table, bucket),
            None => tools::run_bucket(*language, bucket, tool_timeout).await,
        };
        info!(
            language = %language,
            files = bucket.len(),
            findings = findings.len(),
            "language bucket analyzed"
        );
        reports.insert(
            *language,
            LintReport {
                language: *language,
                findings,
            },
        );
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::Severity;

    #[tokio::test]
    async fn rule_languages_are_analyzed_in_process() {
        let diff = DiffDocument::parse(
            "+++ b/src/Main.java\n+System.out.println(\"hi\");\n".to_string(),
        );
        let reports = analyze(&diff, Duration::from_secs(5)).await;
        assert_eq!(reports.len(), 1);
        let report = &reports[&Language::Java];
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].severity, Severity::Info);
        assert_eq!(report.findings[0].source, "rules");
    }

    #[tokio::test]
    async fn unrecognized_files_produce_no_report() {
        let diff = DiffDocument::parse("+++ b/README.md\n+hello\n".to_string());
        let reports = analyze(&diff, Duration::from_secs(5)).await;
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn clean_rule_bucket_yields_an_empty_report() {
        let diff = DiffDocument::parse(
            "+++ b/src/Ok.java\n+int x = logger.count();\n".to_string(),
        );
        let reports = analyze(&diff, Duration::from_secs(5)).await;
        assert!(reports[&Language::Java].findings.is_empty());
    }
}
