// SPDX-License-Identifier: MIT
//! In-process pattern rules.
//!
//! For languages without a configured external analyzer, a fixed rule list
//! is applied to the raw added-lines content. Each rule is data: a pattern,
//! a message, and a severity — evaluation is one generic loop, so new rules
//! are a table edit, not new code.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lint::language::{Language, LanguageBucket};
use crate::lint::model::{Finding, Severity};

/// One declarative rule: matches of `pattern` become findings with
/// `message` and `severity`.
pub struct LintRule {
    pub pattern: Regex,
    pub message: &'static str,
    pub severity: Severity,
}

fn compile(rules: &[(&'static str, &'static str, Severity)]) -> Vec<LintRule> {
    rules
        .iter()
        .map(|(pattern, message, severity)| LintRule {
            // Patterns are compile-time constants; a bad one is a programmer
            // error caught by the rule-table tests below.
            pattern: Regex::new(pattern).expect("invalid lint rule pattern"),
            message,
            severity: *severity,
        })
        .collect()
}

static JAVA_RULES: Lazy<Vec<LintRule>> = Lazy::new(|| {
    compile(&[
        (
            r"catch\s*\([^)]+\)\s*\{\s*\}",
            "Empty catch block",
            Severity::Warning,
        ),
        (
            r"System\.out\.println",
            "Use a logger instead of System.out.println",
            Severity::Info,
        ),
    ])
});

static CSHARP_RULES: Lazy<Vec<LintRule>> = Lazy::new(|| {
    compile(&[
        (
            r"catch\s*\([^)]+\)\s*\{\s*\}",
            "Empty catch block",
            Severity::Warning,
        ),
        (
            r"Console\.WriteLine",
            "Use a logger instead of Console.WriteLine",
            Severity::Info,
        ),
    ])
});

/// Rule table for `language`, or `None` when the language is handled by an
/// external analyzer instead.
pub fn rules_for(language: Language) -> Option<&'static [LintRule]> {
    match language {
        Language::Java => Some(&JAVA_RULES),
        Language::Csharp => Some(&CSHARP_RULES),
        _ => None,
    }
}

/// Apply `rules` to every file in the bucket, recording 1-based line numbers
/// by counting line breaks before each match. Findings are appended in
/// discovery order: file by file, rule by rule, match by match.
pub fn apply(rules: &[LintRule], bucket: &LanguageBucket) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (path, content) in bucket {
        for rule in rules {
            for m in rule.pattern.find_iter(content) {
                let line = content[..m.start()].matches('\n').count() as u32 + 1;
                findings.push(Finding {
                    file: path.clone(),
                    line,
                    column: 1,
                    message: rule.message.to_string(),
                    severity: rule.severity,
                    source: "rules".to_string(),
                });
            }
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn bucket(path: &str, content: &str) -> LanguageBucket {
        let mut b = BTreeMap::new();
        b.insert(path.to_string(), content.to_string());
        b
    }

    #[test]
    fn rule_tables_compile() {
        assert_eq!(rules_for(Language::Java).unwrap().len(), 2);
        assert_eq!(rules_for(Language::Csharp).unwrap().len(), 2);
        assert!(rules_for(Language::Python).is_none());
    }

    #[test]
    fn empty_catch_block_is_a_warning_with_correct_line() {
        let content = "void f() {\n    try { g(); }\n    catch (Exception e) { }\n}";
        let findings = apply(rules_for(Language::Java).unwrap(), &bucket("A.java", content));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].message, "Empty catch block");
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].line, 3);
    }

    #[test]
    fn console_writes_are_info_findings() {
        let content = "Console.WriteLine(\"a\");\nConsole.WriteLine(\"b\");";
        let findings = apply(
            rules_for(Language::Csharp).unwrap(),
            &bucket("Program.cs", content),
        );
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.severity == Severity::Info));
        assert_eq!(findings[0].line, 1);
        assert_eq!(findings[1].line, 2);
    }

    #[test]
    fn non_empty_catch_block_does_not_match() {
        let content = "catch (Exception e) { log.error(e); }";
        let findings = apply(rules_for(Language::Java).unwrap(), &bucket("A.java", content));
        assert!(findings.is_empty());
    }
}
