// SPDX-License-Identifier: MIT
//! Review prompt construction.
//!
//! One request text is assembled from the diff, the optional issue-tracker
//! context, and the lint reports, then encoded into the wire form the
//! primary model family expects. The rendered string is final: fallback
//! invocation reuses it byte for byte, even when the fallback model belongs
//! to a different family.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::config::ModelFamily;
use crate::jira::IssueContext;
use crate::lint::language::Language;
use crate::lint::model::LintReport;

/// Fixed reviewer instruction sent with every request.
pub const SYSTEM_INSTRUCTION: &str = "
You are an expert code reviewer with deep knowledge of software engineering best practices, design patterns, and security considerations. Your task is to review a code diff and provide constructive feedback.

Your review should focus on:
1. Potential bugs or logic errors
2. Security vulnerabilities
3. Performance issues
4. Code style and readability
5. Design and architecture concerns
6. Maintainability and testability
7. Suggestions for improvement

Format your response as a Markdown document with the following sections:
- **Summary**: A brief overview of the changes and your overall assessment
- **Key Findings**: The most important issues that need to be addressed
- **Detailed Review**: A file-by-file breakdown of specific issues and suggestions
- **Recommendations**: Concrete steps to improve the code

Be specific in your feedback, referencing line numbers and code snippets where appropriate. Provide explanations for why certain patterns or practices are problematic and suggest alternatives.

Your tone should be professional, constructive, and helpful. Focus on the code, not the developer. Highlight both positive aspects and areas for improvement.
";

/// Assemble the request text: fenced diff, then issue context, then lint
/// findings, then the closing instruction. Optional sections are skipped
/// entirely when absent.
pub fn build_request_text(
    diff: &str,
    issue: Option<&IssueContext>,
    reports: &BTreeMap<Language, LintReport>,
) -> String {
    let mut text = format!("Please review the following code diff:\n\n```diff\n{diff}\n```\n\n");

    if let Some(issue) = issue {
        // write! to String is infallible.
        let _ = write!(
            text,
            "\n## Issue Tracker Information\n\
             - **Key**: {}\n\
             - **Summary**: {}\n\
             - **Description**: {}\n\
             - **Status**: {}\n\
             - **Type**: {}\n\
             - **Priority**: {}\n\n",
            issue.key, issue.summary, issue.description, issue.status, issue.issue_type, issue.priority
        );

        if let Some(epic) = &issue.epic {
            let _ = write!(
                text,
                "\n## Epic Information\n\
                 - **Key**: {}\n\
                 - **Summary**: {}\n\n",
                epic.key, epic.summary
            );
        }
    }

    if !reports.is_empty() {
        text.push_str("## Linter Results\n\n");
        for (language, report) in reports {
            let _ = write!(text, "### {language} Linter Results\n\n");
            if report.findings.is_empty() {
                text.push_str("No issues found.\n\n");
            } else {
                for finding in &report.findings {
                    let _ = writeln!(
                        text,
                        "- **{}**: {} (File: {}, Line: {})",
                        finding.severity, finding.message, finding.file, finding.line
                    );
                }
                text.push('\n');
            }
        }
    }

    text.push_str(
        "\nPlease provide a comprehensive code review based on the diff and any additional \
         information provided. Focus on identifying potential issues, suggesting improvements, \
         and providing constructive feedback.\n",
    );
    text
}

/// Encode the request text for the primary model family's wire format.
pub fn render(family: ModelFamily, request_text: &str) -> String {
    match family {
        ModelFamily::Claude => format!(
            "<human>\n{request_text}\n</human>\n\n<system>\n{SYSTEM_INSTRUCTION}\n</system>"
        ),
        ModelFamily::Titan => {
            format!("System: {SYSTEM_INSTRUCTION}\n\nHuman: {request_text}\n\nAssistant:")
        }
    }
}
