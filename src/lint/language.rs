// SPDX-License-Identifier: MIT
//! File-extension → language classification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Languages the lint dispatcher knows how to analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Java,
    Csharp,
    Go,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Java => "java",
            Language::Csharp => "csharp",
            Language::Go => "go",
        }
    }

    /// Static extension table. Extensions outside this table classify to
    /// `None` and the file is excluded from every downstream bucket.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" => Some(Language::Python),
            "js" | "jsx" => Some(Language::Javascript),
            "ts" | "tsx" => Some(Language::Typescript),
            "java" => Some(Language::Java),
            "cs" => Some(Language::Csharp),
            "go" => Some(Language::Go),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File path → content map for one language.
pub type LanguageBucket = BTreeMap<String, String>;

/// Group files by classified language. Unrecognized extensions are dropped
/// silently.
pub fn group_by_language<'a, I>(files: I) -> BTreeMap<Language, LanguageBucket>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut buckets: BTreeMap<Language, LanguageBucket> = BTreeMap::new();
    for (path, content) in files {
        let ext = std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str());
        if let Some(language) = ext.and_then(Language::from_extension) {
            buckets
                .entry(language)
                .or_default()
                .insert(path.clone(), content.clone());
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seven_extensions_yield_six_buckets() {
        let files: Vec<(String, String)> = [
            "a.py", "b.js", "c.ts", "d.java", "e.cs", "f.go", "notes.txt",
        ]
        .iter()
        .map(|p| (p.to_string(), "content".to_string()))
        .collect();

        let buckets = group_by_language(files.iter().map(|(p, c)| (p, c)));
        assert_eq!(buckets.len(), 6);
        assert!(buckets
            .values()
            .all(|b| !b.keys().any(|p| p.ends_with(".txt"))));
    }

    #[test]
    fn jsx_and_tsx_share_their_base_language() {
        assert_eq!(Language::from_extension("jsx"), Some(Language::Javascript));
        assert_eq!(Language::from_extension("tsx"), Some(Language::Typescript));
    }

    #[test]
    fn unknown_extension_is_unclassified() {
        assert_eq!(Language::from_extension("rb"), None);
        assert_eq!(Language::from_extension(""), None);
    }
}
