//! Keyword groups, the title filter, and the result-file signature.

use serde::{Deserialize, Serialize};

/// A set of alternative keywords. A title satisfies the group if it contains
/// any one of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordGroup {
    /// Label used in logs and notifications
    #[serde(default)]
    pub name: String,

    /// Alternatives, matched case-insensitively as substrings
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    pub fn new(name: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Lowercased, trimmed, non-blank keywords.
    fn normalized(&self) -> Vec<String> {
        self.keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

/// Conjunction of keyword groups: every group must match at least once.
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    groups: Vec<Vec<String>>,
    signature: String,
}

impl KeywordFilter {
    /// Build a filter from the active groups.
    pub fn new(groups: &[KeywordGroup]) -> Self {
        Self {
            groups: groups
                .iter()
                .map(KeywordGroup::normalized)
                .filter(|g| !g.is_empty())
                .collect(),
            signature: signature(groups),
        }
    }

    /// Check whether a title satisfies every group.
    pub fn matches(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.groups
            .iter()
            .all(|group| group.iter().any(|k| title.contains(k.as_str())))
    }

    /// Canonical keyword signature for result-file naming.
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// Canonical, order-independent representation of a set of keyword groups.
///
/// Keywords are case-folded, de-duplicated and sorted within each group, and
/// the group fragments are sorted as well, so any permutation of the same
/// input yields the same string. Keywords within a group are joined with `+`
/// and groups with `_`; those separators, `%`, and characters unsafe in file
/// names are percent-escaped inside a keyword, so distinct keyword sets never
/// share a signature.
pub fn signature(groups: &[KeywordGroup]) -> String {
    let mut fragments: Vec<String> = groups
        .iter()
        .map(|group| {
            let mut keywords: Vec<String> =
                group.normalized().iter().map(|k| escape(k)).collect();
            keywords.sort();
            keywords.dedup();
            keywords.join("+")
        })
        .filter(|f| !f.is_empty())
        .collect();

    if fragments.is_empty() {
        return "all".to_string();
    }

    fragments.sort();
    fragments.dedup();
    fragments.join("_")
}

fn escape(keyword: &str) -> String {
    let mut out = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        let reserved = matches!(
            c,
            '%' | '+' | '_' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'
        );
        if reserved || c.is_whitespace() || c.is_control() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}
