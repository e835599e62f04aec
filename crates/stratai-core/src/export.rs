//! PDF export of a research report.
//!
//! Layout is computed up front by [`paginate`], which places wrapped lines
//! on letter-size pages; [`render_document`] then draws those lines with the
//! built-in Helvetica faces.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};
use tracing::{debug, instrument};

use crate::output::RunResult;
use crate::report::{PLACEHOLDER, SectionLevel, report_sections};
use crate::StratAiError;

pub const PDF_MIME: &str = "application/pdf";

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN_LEFT: f32 = 72.0;
const MARGIN_RIGHT: f32 = 72.0;
const MARGIN_TOP: f32 = 72.0;
const MARGIN_BOTTOM: f32 = 18.0;
const LINE_SPACING: f32 = 1.2;
/// Average Helvetica glyph advance as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    Title,
    HeadingLarge,
    HeadingMedium,
    Body,
}

impl BlockStyle {
    fn font_size(self) -> f32 {
        match self {
            BlockStyle::Title => 18.0,
            BlockStyle::HeadingLarge => 14.0,
            BlockStyle::HeadingMedium => 12.0,
            BlockStyle::Body => 10.0,
        }
    }

    fn space_after(self) -> f32 {
        match self {
            BlockStyle::Title => 12.0,
            _ => 6.0,
        }
    }

    fn is_bold(self) -> bool {
        !matches!(self, BlockStyle::Body)
    }
}

impl From<SectionLevel> for BlockStyle {
    fn from(level: SectionLevel) -> Self {
        match level {
            SectionLevel::TitleLarge => BlockStyle::HeadingLarge,
            SectionLevel::TitleMedium => BlockStyle::HeadingMedium,
            SectionLevel::Body => BlockStyle::Body,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentBlock {
    pub style: BlockStyle,
    pub text: String,
}

/// One line of text positioned on a page, coordinates in points from the
/// bottom-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub style: BlockStyle,
    pub text: String,
    pub x: f32,
    pub y: f32,
}

pub type PageLayout = Vec<PlacedLine>;

/// Title block followed by the report sections. A result without task
/// outputs is rendered as its text; no result renders the placeholder.
pub fn document_blocks(
    company: &str,
    industry: &str,
    result: Option<&RunResult>,
) -> Vec<DocumentBlock> {
    let mut blocks = vec![DocumentBlock {
        style: BlockStyle::Title,
        text: format!("AI Use Case Research: {company} - {industry}"),
    }];

    match result {
        Some(result) if result.has_outputs() => {
            blocks.extend(report_sections(result).into_iter().map(|section| DocumentBlock {
                style: section.level.into(),
                text: section.text,
            }));
        }
        other => {
            let text = other
                .map(RunResult::to_string)
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| PLACEHOLDER.to_string());
            blocks.push(DocumentBlock {
                style: BlockStyle::Body,
                text,
            });
        }
    }

    blocks
}

fn max_chars(style: BlockStyle) -> usize {
    let usable = PAGE_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    ((usable / (style.font_size() * GLYPH_WIDTH)) as usize).max(1)
}

fn estimated_width(text: &str, style: BlockStyle) -> f32 {
    text.chars().count() as f32 * style.font_size() * GLYPH_WIDTH
}

/// Greedy word wrap. Explicit line breaks are kept; words wider than a line
/// are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(width);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let current_len = current.chars().count();
            if current_len > 0 && current_len + 1 + word.len() > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.extend(word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

/// Place every block's wrapped lines top to bottom, starting a new page when
/// the next line would cross the bottom margin.
pub fn paginate(blocks: &[DocumentBlock]) -> Vec<PageLayout> {
    let top = PAGE_HEIGHT - MARGIN_TOP;
    let mut pages: Vec<PageLayout> = vec![Vec::new()];
    let mut cursor = top;

    for block in blocks {
        let leading = block.style.font_size() * LINE_SPACING;
        for line in wrap(&block.text, max_chars(block.style)) {
            if cursor - leading < MARGIN_BOTTOM {
                pages.push(Vec::new());
                cursor = top;
            }
            cursor -= leading;

            let x = if block.style == BlockStyle::Title {
                ((PAGE_WIDTH - estimated_width(&line, block.style)) / 2.0).max(MARGIN_LEFT)
            } else {
                MARGIN_LEFT
            };

            if let Some(page) = pages.last_mut() {
                page.push(PlacedLine {
                    style: block.style,
                    text: line,
                    x,
                    y: cursor,
                });
            }
        }
        cursor -= block.style.space_after();
    }

    pages
}

/// Built-in PDF fonts only cover a Latin subset; map common typography to
/// ASCII and replace anything else.
pub fn sanitize_for_builtin_font(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => out.push('"'),
            '\u{2010}'..='\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2022}' | '\u{00B7}' | '\u{25CF}' => out.push('*'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\t' => out.push(' '),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c if c.is_control() => {}
            _ => out.push('?'),
        }
    }
    out
}

fn pt_to_mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

fn draw_page(
    doc: &PdfDocumentReference,
    page: printpdf::PdfPageIndex,
    layer: printpdf::PdfLayerIndex,
    lines: &[PlacedLine],
    regular: &IndirectFontRef,
    bold: &IndirectFontRef,
) {
    let layer = doc.get_page(page).get_layer(layer);
    for line in lines {
        let font = if line.style.is_bold() { bold } else { regular };
        layer.use_text(
            sanitize_for_builtin_font(&line.text),
            line.style.font_size(),
            pt_to_mm(line.x),
            pt_to_mm(line.y),
            font,
        );
    }
}

/// Render the report as PDF bytes.
#[instrument(name = "export.pdf", skip(result))]
pub fn render_document(
    company: &str,
    industry: &str,
    result: Option<&RunResult>,
) -> Result<Vec<u8>, StratAiError> {
    let blocks = document_blocks(company, industry, result);
    let pages = paginate(&blocks);
    let title = sanitize_for_builtin_font(&blocks[0].text);

    let (doc, first_page, first_layer) = PdfDocument::new(
        title,
        pt_to_mm(PAGE_WIDTH),
        pt_to_mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|err| StratAiError::Render(format!("{err:?}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|err| StratAiError::Render(format!("{err:?}")))?;

    for (index, lines) in pages.iter().enumerate() {
        let (page, layer) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(pt_to_mm(PAGE_WIDTH), pt_to_mm(PAGE_HEIGHT), "Layer 1")
        };
        draw_page(&doc, page, layer, lines, &regular, &bold);
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|err| StratAiError::Render(format!("{err:?}")))?;
    debug!(pages = pages.len(), bytes = bytes.len(), "pdf rendered");
    Ok(bytes)
}

pub fn download_file_name(company: &str, industry: &str) -> String {
    format!("{company}_{industry}_AI_Use_Cases.pdf")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentKind;
    use crate::output::TaskOutput;

    fn result(raw: &str) -> RunResult {
        RunResult::from_outputs(vec![TaskOutput {
            task_id: "research".into(),
            agent: AgentKind::IndustryResearcher,
            agent_role: "Advanced Industry Analyst".into(),
            description: String::new(),
            raw: raw.into(),
        }])
    }

    #[test]
    fn blocks_follow_title_and_sections() {
        let blocks = document_blocks("Tata", "Automotive", Some(&result("### A\n\n#### B\n\nc")));
        let styles: Vec<BlockStyle> = blocks.iter().map(|b| b.style).collect();
        assert_eq!(
            styles,
            vec![
                BlockStyle::Title,
                BlockStyle::HeadingLarge,
                BlockStyle::HeadingMedium,
                BlockStyle::Body
            ]
        );
        assert_eq!(blocks[0].text, "AI Use Case Research: Tata - Automotive");
    }

    #[test]
    fn missing_or_empty_result_falls_back_to_placeholder() {
        for result in [None, Some(&RunResult::Empty)] {
            let blocks = document_blocks("Tata", "Automotive", result);
            assert_eq!(blocks.len(), 2);
            assert_eq!(blocks[1].text, PLACEHOLDER);
        }
    }

    #[test]
    fn empty_result_renders_without_error() {
        let bytes = render_document("Tata", "Automotive", Some(&RunResult::Empty)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn renders_unicode_and_multiple_pages() {
        let long = (0..400)
            .map(|i| format!("Paragraph {i} about “EV” adoption in 東京 – growth"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let bytes = render_document("Énergie", "Utilities", Some(&result(&long))).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn wrap_respects_width_and_line_breaks() {
        let lines = wrap("alpha beta gamma\ndelta", 11);
        assert_eq!(lines, vec!["alpha beta", "gamma", "delta"]);

        let lines = wrap("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn paginate_breaks_pages_within_margins() {
        let blocks: Vec<DocumentBlock> = (0..200)
            .map(|i| DocumentBlock {
                style: BlockStyle::Body,
                text: format!("line {i}"),
            })
            .collect();
        let pages = paginate(&blocks);

        assert!(pages.len() > 1);
        for line in pages.iter().flatten() {
            assert!(line.y >= MARGIN_BOTTOM);
            assert!(line.y <= PAGE_HEIGHT - MARGIN_TOP);
            assert_eq!(line.x, MARGIN_LEFT);
        }
        let placed: usize = pages.iter().map(Vec::len).sum();
        assert_eq!(placed, 200);
    }

    #[test]
    fn sanitizes_typography() {
        assert_eq!(
            sanitize_for_builtin_font("“Smart” – EV’s… 東"),
            "\"Smart\" - EV's... ?"
        );
    }

    #[test]
    fn file_name_embeds_inputs() {
        assert_eq!(
            download_file_name("Tata", "Automotive"),
            "Tata_Automotive_AI_Use_Cases.pdf"
        );
    }
}
