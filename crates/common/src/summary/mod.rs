//! Summary text parser
//!
//! Summaries are produced by the chat model under a fixed prompt that asks
//! for four markdown headings in a fixed order. Parsing is all-or-nothing:
//! either all four headings appear in order and every section is extracted,
//! or the whole text is returned untouched as `other`.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Section headings, in the order they must appear
pub const HEADINGS: [&str; 4] = [
    "### Simple Summary",
    "### Action Checklist",
    "### Risk Red Flags",
    "### Deadline Highlights",
];

fn sections_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?s)### Simple Summary(.*?)### Action Checklist(.*?)### Risk Red Flags(.*?)### Deadline Highlights(.*)",
        )
        .expect("summary section pattern is valid")
    })
}

/// A summary split into its labelled parts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySections {
    pub summary: String,
    pub checklist: String,
    pub risks: String,
    pub deadlines: String,
    /// Entire input when it did not follow the four-heading layout
    pub other: String,
}

impl SummarySections {
    /// Whether the input followed the four-heading layout
    pub fn is_structured(&self) -> bool {
        self.other.is_empty()
    }
}

/// Split summary text into its four sections
pub fn parse_sections(text: &str) -> SummarySections {
    let Some(caps) = sections_pattern().captures(text) else {
        return SummarySections {
            other: text.to_string(),
            ..SummarySections::default()
        };
    };

    let section = |i: usize| {
        caps.get(i)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    };

    SummarySections {
        summary: section(1),
        checklist: section(2),
        risks: section(3),
        deadlines: section(4),
        other: String::new(),
    }
}
