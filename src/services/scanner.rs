use anyhow::Result;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Threat severity. Ordered so that the highest severity of a set of matches
/// is simply its maximum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A suspicious substring and how bad it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub needle: String,
    pub severity: Severity,
}

const DEFAULT_PATTERNS: &[(&str, Severity)] = &[
    ("rm -rf", Severity::High),
    ("eval(", Severity::High),
    ("exec(", Severity::High),
    ("bitcoin", Severity::Medium),
    ("malware", Severity::Medium),
    ("virus", Severity::Medium),
    ("hack", Severity::Medium),
    ("exploit", Severity::High),
    ("shell_exec", Severity::High),
    ("system(", Severity::High),
    ("passwd", Severity::Medium),
    ("ssh-key", Severity::Medium),
];

/// Ordered set of patterns, matched case-insensitively
#[derive(Debug, Clone)]
pub struct PatternTable {
    patterns: Vec<Pattern>,
}

impl PatternTable {
    pub fn new(patterns: impl IntoIterator<Item = (String, Severity)>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .filter(|(needle, _)| !needle.is_empty())
                .map(|(needle, severity)| Pattern {
                    needle: needle.to_lowercase(),
                    severity,
                })
                .collect(),
        }
    }

    /// Every pattern contained in `content`, in table order.
    /// `content` must already be lower-cased.
    pub fn matches<'a>(&'a self, content: &str) -> Vec<&'a Pattern> {
        self.patterns
            .iter()
            .filter(|p| content.contains(p.needle.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_PATTERNS
                .iter()
                .map(|(needle, severity)| (needle.to_string(), *severity)),
        )
    }
}

/// Result of a content scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    /// No pattern matched
    Clean,
    /// At least one pattern matched
    Infected {
        threats: Vec<String>,
        severity: Severity,
    },
}

/// Trait for content scanning implementations
#[async_trait::async_trait]
pub trait ContentScanner: Send + Sync {
    /// Scan the full content of a file
    async fn scan(&self, content: &[u8]) -> Result<ScanResult>;
}

/// Keyword scanner over the decoded text of a file
pub struct PatternScanner {
    table: PatternTable,
}

impl PatternScanner {
    pub fn new(table: PatternTable) -> Self {
        Self { table }
    }
}

impl Default for PatternScanner {
    fn default() -> Self {
        Self::new(PatternTable::default())
    }
}

#[async_trait::async_trait]
impl ContentScanner for PatternScanner {
    async fn scan(&self, content: &[u8]) -> Result<ScanResult> {
        let text = String::from_utf8_lossy(content).to_lowercase();
        let matched = self.table.matches(&text);

        let Some(severity) = matched.iter().map(|p| p.severity).max() else {
            return Ok(ScanResult::Clean);
        };

        tracing::debug!("Pattern scanner matched {} pattern(s)", matched.len());

        Ok(ScanResult::Infected {
            threats: matched.into_iter().map(|p| p.needle.clone()).collect(),
            severity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert_eq!(
            [Severity::Medium, Severity::High, Severity::Medium]
                .into_iter()
                .max(),
            Some(Severity::High)
        );
    }

    #[test]
    fn test_default_table() {
        let table = PatternTable::default();
        assert_eq!(table.len(), 12);
        assert!(!table.is_empty());
    }

    #[test]
    fn test_table_lowercases_and_drops_empty_needles() {
        let table = PatternTable::new(vec![
            ("DROP TABLE".to_string(), Severity::High),
            (String::new(), Severity::Medium),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.matches("; drop table users").len(), 1);
    }

    #[tokio::test]
    async fn test_clean_content() {
        let scanner = PatternScanner::default();
        let result = scanner
            .scan(b"Quarterly report: revenue is up.")
            .await
            .unwrap();
        assert_eq!(result, ScanResult::Clean);
    }

    #[tokio::test]
    async fn test_empty_content_is_clean() {
        let scanner = PatternScanner::default();
        assert_eq!(scanner.scan(b"").await.unwrap(), ScanResult::Clean);
    }

    #[tokio::test]
    async fn test_match_is_case_insensitive_anywhere() {
        let scanner = PatternScanner::default();
        let result = scanner
            .scan(b"harmless prefix ... x = EVAL(payload)")
            .await
            .unwrap();
        assert_eq!(
            result,
            ScanResult::Infected {
                threats: vec!["eval(".to_string()],
                severity: Severity::High,
            }
        );
    }

    #[tokio::test]
    async fn test_medium_only_matches() {
        let scanner = PatternScanner::default();
        let result = scanner
            .scan(b"Send BITCOIN to remove the Virus")
            .await
            .unwrap();
        assert_eq!(
            result,
            ScanResult::Infected {
                threats: vec!["bitcoin".to_string(), "virus".to_string()],
                severity: Severity::Medium,
            }
        );
    }

    #[tokio::test]
    async fn test_all_matches_reported_in_table_order() {
        let scanner = PatternScanner::default();
        let result = scanner
            .scan(b"cat /etc/passwd; rm -rf /; shell_exec('id')")
            .await
            .unwrap();
        match result {
            ScanResult::Infected { threats, severity } => {
                assert_eq!(threats, vec!["rm -rf", "exec(", "shell_exec", "passwd"]);
                assert_eq!(severity, Severity::High);
            }
            other => panic!("Expected infected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decoded_lossily() {
        let scanner = PatternScanner::default();
        let mut content = vec![0xFF, 0xFE, 0x00];
        content.extend_from_slice(b"MALWARE");
        let result = scanner.scan(&content).await.unwrap();
        assert!(matches!(result, ScanResult::Infected { .. }));
    }
}
