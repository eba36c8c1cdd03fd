// SPDX-License-Identifier: MIT
//! External analyzer runner — spawn per-file lint tools in a scratch
//! directory, parse their structured output, normalize severities.
//!
//! Supported output formats:
//! - `eslint-json`  — eslint --format=json (javascript, typescript)
//! - `flake8-json`  — flake8 --format=json (python)
//! - `pylint-json`  — pylint --output-format=json (python)
//! - `govet-text`   — go vet (text on stderr/stdout)
//!
//! Failure isolation is the contract: a tool that cannot be spawned, times
//! out, exits abnormally, or prints garbage contributes zero findings for
//! that one file and never aborts the batch.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::lint::language::{Language, LanguageBucket};
use crate::lint::model::{Finding, Severity};

/// Maximum captured output size (64 KiB). Prevents OOM from runaway tools.
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

// ─── Tool configuration ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    EslintJson,
    Flake8Json,
    PylintJson,
    GoVetText,
}

/// An external analyzer invocation: the target file path is appended to
/// `command` at run time.
#[derive(Debug, Clone, Copy)]
pub struct ToolConfig {
    pub name: &'static str,
    pub command: &'static [&'static str],
    pub format: OutputFormat,
}

/// Analyzer processes configured per language. Languages not listed here are
/// handled by the in-process rule strategy instead.
pub fn tools_for(language: Language) -> &'static [ToolConfig] {
    match language {
        Language::Python => &[
            ToolConfig {
                name: "flake8",
                command: &["flake8", "--format=json"],
                format: OutputFormat::Flake8Json,
            },
            ToolConfig {
                name: "pylint",
                command: &["pylint", "--output-format=json"],
                format: OutputFormat::PylintJson,
            },
        ],
        Language::Javascript | Language::Typescript => &[ToolConfig {
            name: "eslint",
            command: &["eslint", "--format=json"],
            format: OutputFormat::EslintJson,
        }],
        Language::Go => &[ToolConfig {
            name: "go vet",
            command: &["go", "vet"],
            format: OutputFormat::GoVetText,
        }],
        Language::Java | Language::Csharp => &[],
    }
}

// ─── Bucket runner ────────────────────────────────────────────────────────────

/// Run every configured tool against every file in the bucket.
///
/// Files are written to an ephemeral scratch directory preserving their
/// relative paths, then each tool is invoked once per file. Findings carry
/// the repository-relative path, not the scratch path.
pub async fn run_bucket(
    language: Language,
    bucket: &LanguageBucket,
    tool_timeout: Duration,
) -> Vec<Finding> {
    let tools = tools_for(language);
    if tools.is_empty() || bucket.is_empty() {
        return Vec::new();
    }

    let scratch = match write_scratch(language, bucket) {
        Ok(dir) => dir,
        Err(e) => {
            warn!(language = %language, err = %e, "could not create scratch dir — skipping external analysis");
            return Vec::new();
        }
    };

    let mut findings = Vec::new();
    for rel_path in bucket.keys() {
        let abs_path = scratch.path().join(rel_path);
        for tool in tools {
            match run_tool(tool, &abs_path, rel_path, tool_timeout).await {
                Some(mut tool_findings) => findings.append(&mut tool_findings),
                None => {
                    // Already logged; this file/tool pair contributes nothing.
                }
            }
        }
    }
    findings
}

/// Write each file's content under a temp dir, preserving relative paths,
/// plus whatever baseline tool configuration the language needs.
fn write_scratch(language: Language, bucket: &LanguageBucket) -> anyhow::Result<tempfile::TempDir> {
    let dir = tempfile::tempdir()?;
    for (rel_path, content) in bucket {
        let full = dir.path().join(rel_path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, content)?;
    }
    write_tool_configs(language, dir.path())?;
    Ok(dir)
}

/// Baseline analyzer configuration written into the scratch root. Without an
/// eslint config in scope, eslint refuses to run at all (exit > 1), so the
/// scratch dir must carry one.
fn write_tool_configs(language: Language, dir: &Path) -> anyhow::Result<()> {
    match language {
        Language::Javascript => {
            let eslint_config = serde_json::json!({
                "env": {"browser": true, "es2021": true, "node": true},
                "extends": "eslint:recommended",
                "parserOptions": {"ecmaVersion": 12, "sourceType": "module"},
                "rules": {},
            });
            std::fs::write(
                dir.join(".eslintrc.json"),
                serde_json::to_vec(&eslint_config)?,
            )?;
        }
        Language::Typescript => {
            let tsconfig = serde_json::json!({
                "compilerOptions": {
                    "target": "es2020",
                    "module": "commonjs",
                    "strict": true,
                    "esModuleInterop": true,
                    "skipLibCheck": true,
                    "forceConsistentCasingInFileNames": true,
                },
            });
            std::fs::write(dir.join("tsconfig.json"), serde_json::to_vec(&tsconfig)?)?;

            let eslint_config = serde_json::json!({
                "env": {"browser": true, "es2021": true, "node": true},
                "extends": ["eslint:recommended", "plugin:@typescript-eslint/recommended"],
                "parser": "@typescript-eslint/parser",
                "parserOptions": {"ecmaVersion": 12, "sourceType": "module"},
                "plugins": ["@typescript-eslint"],
                "rules": {},
            });
            std::fs::write(
                dir.join(".eslintrc.json"),
                serde_json::to_vec(&eslint_config)?,
            )?;
        }
        Language::Python | Language::Go | Language::Java | Language::Csharp => {}
    }
    Ok(())
}

/// Run a single tool against a single file. `None` means this pair failed
/// (spawn error, timeout, abnormal exit, or unparseable output).
async fn run_tool(
    tool: &ToolConfig,
    abs_path: &Path,
    rel_path: &str,
    timeout: Duration,
) -> Option<Vec<Finding>> {
    debug!(tool = tool.name, file = rel_path, "running analyzer");

    let (binary, args) = tool.command.split_first()?;
    let run = tokio::time::timeout(
        timeout,
        Command::new(binary).args(args).arg(abs_path).output(),
    )
    .await;

    let output = match run {
        Ok(Ok(o)) => o,
        Ok(Err(e)) => {
            warn!(tool = tool.name, file = rel_path, err = %e, "analyzer spawn failed");
            return None;
        }
        Err(_) => {
            warn!(
                tool = tool.name,
                file = rel_path,
                timeout_secs = timeout.as_secs(),
                "analyzer timed out"
            );
            return None;
        }
    };

    // Lint tools exit 1 when they found issues; only >1 means "could not run".
    let runnable = output.status.code().map(|c| c <= 1).unwrap_or(false);
    if !runnable {
        let stderr: String = String::from_utf8_lossy(&output.stderr)
            .chars()
            .take(512)
            .collect();
        warn!(
            tool = tool.name,
            file = rel_path,
            code = ?output.status.code(),
            stderr = %stderr,
            "analyzer exited abnormally"
        );
        return None;
    }

    // go vet reports on stderr; JSON tools report on stdout.
    let raw_bytes = if tool.format == OutputFormat::GoVetText && output.stdout.is_empty() {
        &output.stderr
    } else {
        &output.stdout
    };
    let raw = if raw_bytes.len() > MAX_OUTPUT_BYTES {
        warn!(tool = tool.name, bytes = raw_bytes.len(), "truncating large analyzer output");
        String::from_utf8_lossy(&raw_bytes[..MAX_OUTPUT_BYTES]).into_owned()
    } else {
        String::from_utf8_lossy(raw_bytes).into_owned()
    };

    if raw.trim().is_empty() {
        return Some(Vec::new());
    }

    match parse_output(tool, &raw, rel_path) {
        Ok(findings) => Some(findings),
        Err(e) => {
            warn!(
                tool = tool.name,
                file = rel_path,
                err = %e,
                "failed to parse analyzer output — treating as zero findings"
            );
            None
        }
    }
}

// ─── Output parsers ───────────────────────────────────────────────────────────

fn parse_output(tool: &ToolConfig, raw: &str, rel_path: &str) -> anyhow::Result<Vec<Finding>> {
    match tool.format {
        OutputFormat::EslintJson => parse_eslint_json(raw, rel_path),
        OutputFormat::Flake8Json => parse_flake8_json(raw, rel_path),
        OutputFormat::PylintJson => parse_pylint_json(raw, rel_path),
        OutputFormat::GoVetText => Ok(parse_govet_text(raw, rel_path)),
    }
}

/// `eslint --format=json`: array of file results, each with a `messages`
/// array carrying a numeric severity (2 = error, 1 = warning).
fn parse_eslint_json(raw: &str, rel_path: &str) -> anyhow::Result<Vec<Finding>> {
    let root: serde_json::Value = serde_json::from_str(raw.trim())?;
    let files = root
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("expected array"))?;
    let mut findings = Vec::new();

    for file_obj in files {
        let messages = match file_obj.get("messages").and_then(|v| v.as_array()) {
            Some(m) => m,
            None => continue,
        };
        for msg in messages {
            let raw_severity = msg.get("severity").and_then(|v| v.as_u64()).unwrap_or(0);
            findings.push(Finding {
                file: rel_path.to_string(),
                line: msg.get("line").and_then(|v| v.as_u64()).unwrap_or(1) as u32,
                column: msg.get("column").and_then(|v| v.as_u64()).unwrap_or(1) as u32,
                message: msg
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                severity: Severity::from_numeric(raw_severity),
                source: "eslint".to_string(),
            });
        }
    }
    Ok(findings)
}

/// `flake8 --format=json`: either a bare array of entries or an object
/// keyed by file path; every entry maps to a warning.
fn parse_flake8_json(raw: &str, rel_path: &str) -> anyhow::Result<Vec<Finding>> {
    let root: serde_json::Value = serde_json::from_str(raw.trim())?;
    let entries: Vec<&serde_json::Value> = match &root {
        serde_json::Value::Array(items) => items.iter().collect(),
        serde_json::Value::Object(by_file) => by_file
            .values()
            .filter_map(|v| v.as_array())
            .flatten()
            .collect(),
        _ => anyhow::bail!("expected array or object"),
    };

    Ok(entries
        .into_iter()
        .map(|entry| Finding {
            file: rel_path.to_string(),
            line: entry
                .get("line_number")
                .and_then(|v| v.as_u64())
                .unwrap_or(1) as u32,
            column: entry
                .get("column_number")
                .and_then(|v| v.as_u64())
                .unwrap_or(1) as u32,
            message: entry
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            severity: Severity::Warning,
            source: "flake8".to_string(),
        })
        .collect())
}

/// `pylint --output-format=json`: array of entries with a categorical
/// `type` field ("error"/"fatal"/"warning"/"convention"/…).
fn parse_pylint_json(raw: &str, rel_path: &str) -> anyhow::Result<Vec<Finding>> {
    let root: serde_json::Value = serde_json::from_str(raw.trim())?;
    let items = root
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("expected array"))?;

    Ok(items
        .iter()
        .map(|item| {
            let category = item.get("type").and_then(|v| v.as_str()).unwrap_or("");
            Finding {
                file: rel_path.to_string(),
                line: item.get("line").and_then(|v| v.as_u64()).unwrap_or(1) as u32,
                column: item.get("column").and_then(|v| v.as_u64()).unwrap_or(1) as u32,
                message: item
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                severity: Severity::from_category(category),
                source: "pylint".to_string(),
            }
        })
        .collect())
}

/// `go vet` text output: `path:line:col: message` or `path:line: message`,
/// one diagnostic per line; everything maps to a warning.
fn parse_govet_text(raw: &str, rel_path: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for line in raw.lines() {
        let parts: Vec<&str> = line.splitn(4, ':').collect();
        if parts.len() < 3 {
            continue;
        }
        let Ok(line_number) = parts[1].trim().parse::<u32>() else {
            continue;
        };
        // With 4 parts the third is a column; with 3 the message follows the line.
        let (column, message) = if parts.len() == 4 {
            match parts[2].trim().parse::<u32>() {
                Ok(col) => (col, parts[3].trim()),
                Err(_) => (1, line[parts[0].len() + parts[1].len() + 2..].trim_start_matches(':').trim()),
            }
        } else {
            (1, parts[2].trim())
        };
        if message.is_empty() {
            continue;
        }
        findings.push(Finding {
            file: rel_path.to_string(),
            line: line_number,
            column,
            message: message.to_string(),
            severity: Severity::Warning,
            source: "go vet".to_string(),
        });
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eslint_severities_follow_the_numeric_table() {
        let raw = r#"[
            {
                "filePath": "/scratch/web/index.js",
                "messages": [
                    {"severity": 2, "message": "Unexpected console statement.", "line": 4, "column": 3},
                    {"severity": 1, "message": "'x' is defined but never used.", "line": 9, "column": 7},
                    {"severity": 0, "message": "note", "line": 1, "column": 1}
                ]
            }
        ]"#;
        let findings = parse_eslint_json(raw, "web/index.js").unwrap();
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].severity, Severity::Error);
        assert_eq!(findings[1].severity, Severity::Warning);
        assert_eq!(findings[2].severity, Severity::Info);
        assert!(findings.iter().all(|f| f.file == "web/index.js"));
    }

    #[test]
    fn pylint_severities_follow_the_categorical_table() {
        let raw = r#"[
            {"type": "error", "message": "undefined variable", "line": 2, "column": 0},
            {"type": "fatal", "message": "parse error", "line": 1, "column": 0},
            {"type": "warning", "message": "unused import", "line": 3, "column": 0},
            {"type": "convention", "message": "missing docstring", "line": 1, "column": 0}
        ]"#;
        let findings = parse_pylint_json(raw, "src/app.py").unwrap();
        let severities: Vec<Severity> = findings.iter().map(|f| f.severity).collect();
        assert_eq!(
            severities,
            vec![
                Severity::Error,
                Severity::Error,
                Severity::Warning,
                Severity::Info
            ]
        );
    }

    #[test]
    fn flake8_entries_are_warnings_in_both_shapes() {
        let array = r#"[{"line_number": 5, "column_number": 1, "text": "E302 expected 2 blank lines"}]"#;
        let findings = parse_flake8_json(array, "a.py").unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].line, 5);

        let object = r#"{"a.py": [{"line_number": 7, "column_number": 3, "text": "F401 unused import"}]}"#;
        let findings = parse_flake8_json(object, "a.py").unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 7);
    }

    #[test]
    fn govet_text_lines_parse_with_and_without_column() {
        let raw = "main.go:14:2: unreachable code\nmain.go:20: result of fmt.Errorf call not used\nnot a diagnostic\n";
        let findings = parse_govet_text(raw, "main.go");
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].line, 14);
        assert_eq!(findings[0].column, 2);
        assert_eq!(findings[0].message, "unreachable code");
        assert_eq!(findings[1].line, 20);
        assert_eq!(findings[1].column, 1);
    }

    #[test]
    fn malformed_json_is_an_error_not_a_panic() {
        assert!(parse_eslint_json("not json {{{", "x.js").is_err());
        assert!(parse_pylint_json("[unterminated", "x.py").is_err());
    }

    #[tokio::test]
    async fn missing_binary_is_isolated_to_zero_findings() {
        let tool = ToolConfig {
            name: "definitely-not-installed",
            command: &["reviewd-test-no-such-binary-7c1f"],
            format: OutputFormat::EslintJson,
        };
        let result = run_tool(
            &tool,
            Path::new("/tmp/nope.js"),
            "nope.js",
            Duration::from_secs(5),
        )
        .await;
        assert!(result.is_none());
    }

    #[test]
    fn scratch_dir_preserves_relative_paths() {
        let mut bucket = LanguageBucket::new();
        bucket.insert("pkg/sub/mod.py".to_string(), "x = 1\n".to_string());
        let dir = write_scratch(Language::Python, &bucket).unwrap();
        let written = std::fs::read_to_string(dir.path().join("pkg/sub/mod.py")).unwrap();
        assert_eq!(written, "x = 1\n");
        assert!(!dir.path().join(".eslintrc.json").exists());
    }

    #[test]
    fn javascript_scratch_gets_an_eslint_config() {
        let mut bucket = LanguageBucket::new();
        bucket.insert("web/index.js".to_string(), "var x = 1;\n".to_string());
        let dir = write_scratch(Language::Javascript, &bucket).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(".eslintrc.json")).unwrap();
        let config: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(config["extends"], "eslint:recommended");
        assert!(!dir.path().join("tsconfig.json").exists());
    }

    #[test]
    fn typescript_scratch_gets_tsconfig_and_typescript_eslint() {
        let mut bucket = LanguageBucket::new();
        bucket.insert("src/app.ts".to_string(), "const x = 1;\n".to_string());
        let dir = write_scratch(Language::Typescript, &bucket).unwrap();

        let tsconfig: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("tsconfig.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(tsconfig["compilerOptions"]["strict"], true);

        let eslint: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(".eslintrc.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(eslint["parser"], "@typescript-eslint/parser");
        assert_eq!(eslint["extends"][1], "plugin:@typescript-eslint/recommended");
    }
}
