//! Parser for the textual table printed by `<binary> list`.

use serde::{Deserialize, Serialize};

/// Default header keyword of the `list` table.
pub const DEFAULT_HEADER_KEYWORD: &str = "NAME";

/// Default log-noise prefix (gin request logs leaking into stdout).
pub const DEFAULT_NOISE_PREFIX: &str = "[GIN]";

/// Line/token based parser for `list` output.
///
/// The first whitespace-delimited token of each line is the model name,
/// unless it equals the header keyword or starts with one of the noise
/// prefixes. The noise markers are an implementation detail of the
/// supervised tool, so they are configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingParser {
    pub header_keyword: String,
    pub noise_prefixes: Vec<String>,
}

impl ListingParser {
    pub fn new(header_keyword: impl Into<String>, noise_prefixes: Vec<String>) -> Self {
        Self {
            header_keyword: header_keyword.into(),
            noise_prefixes,
        }
    }

    /// Model name carried by a single line, if any.
    pub fn parse_line<'a>(&self, line: &'a str) -> Option<&'a str> {
        let first = line.split_whitespace().next()?;
        if first == self.header_keyword {
            return None;
        }
        if self
            .noise_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && first.starts_with(prefix.as_str()))
        {
            return None;
        }
        Some(first)
    }

    /// Parse a whole output, keeping first-seen order and dropping duplicates.
    pub fn parse<'a, I>(&self, lines: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut names: Vec<String> = Vec::new();
        for name in lines.into_iter().filter_map(|l| self.parse_line(l)) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }
}

impl Default for ListingParser {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_KEYWORD, vec![DEFAULT_NOISE_PREFIX.to_string()])
    }
}
