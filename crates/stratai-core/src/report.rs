//! Turns raw agent text into ordered report sections.
//!
//! Paragraphs are separated by a blank line. A paragraph opening with `####`
//! is a medium title, one opening with `###` a large title; everything else
//! is body text kept verbatim.

use serde::{Deserialize, Serialize};

use crate::output::RunResult;

pub const PLACEHOLDER: &str = "No research results available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionLevel {
    TitleLarge,
    TitleMedium,
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub level: SectionLevel,
    pub text: String,
}

impl ReportSection {
    pub fn body(text: impl Into<String>) -> Self {
        Self {
            level: SectionLevel::Body,
            text: text.into(),
        }
    }

    fn placeholder() -> Self {
        Self::body(PLACEHOLDER)
    }
}

pub fn format_report(raw: Option<&str>) -> Vec<ReportSection> {
    let sections: Vec<ReportSection> = raw
        .unwrap_or_default()
        .split("\n\n")
        .filter(|chunk| !chunk.trim().is_empty())
        .map(classify)
        .collect();

    if sections.is_empty() {
        vec![ReportSection::placeholder()]
    } else {
        sections
    }
}

fn classify(chunk: &str) -> ReportSection {
    let level = if chunk.starts_with("####") {
        SectionLevel::TitleMedium
    } else if chunk.starts_with("###") {
        SectionLevel::TitleLarge
    } else {
        return ReportSection::body(chunk);
    };

    ReportSection {
        level,
        text: chunk.trim_matches('#').trim().to_string(),
    }
}

/// Sections of every task output, in task order.
pub fn report_sections(result: &RunResult) -> Vec<ReportSection> {
    let sections: Vec<ReportSection> = result
        .outputs()
        .iter()
        .filter(|output| !output.raw.trim().is_empty())
        .flat_map(|output| format_report(Some(&output.raw)))
        .collect();

    if sections.is_empty() {
        vec![ReportSection::placeholder()]
    } else {
        sections
    }
}
