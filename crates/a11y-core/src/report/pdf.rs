//! PDF report rendering
//!
//! Lays the report out on A4 pages with the built-in Helvetica faces:
//! header, summary line, then one block per issue with its recommendation.
//! Text is wrapped by character count and a new page is started whenever
//! the next block would cross the bottom margin.

use super::{ScanDigest, ScanReport};
use crate::{CoreError, CoreResult, IssueType};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Rgb,
};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const BODY_SIZE: f32 = 9.0;
const WRAP_COLUMNS: usize = 105;
const CODE_COLUMNS: usize = 80;

pub fn generate(report: &ScanReport) -> CoreResult<Vec<u8>> {
    let mut writer = PageWriter::new("Accessibility Scan Report")?;

    // Header
    writer.line("Accessibility Scan Report", 18.0, true, heading_color());
    writer.gap(2.0);
    writer.paragraph(&format!("Scanned URL: {}", report.url), BODY_SIZE, false, text_color());
    if let Some(title) = &report.document_title {
        writer.paragraph(&format!("Page title: {}", title), BODY_SIZE, false, text_color());
    }
    writer.line(
        &format!("Scan date: {}", report.created_at.format("%Y-%m-%d %H:%M")),
        BODY_SIZE,
        false,
        text_color(),
    );
    writer.gap(6.0);

    // Executive summary
    let summary = &report.summary;
    writer.line("Executive Summary", 12.0, true, heading_color());
    writer.line(
        &format!(
            "Total issues: {}    Errors: {}    Warnings: {}    Notices: {}    Score: {}/100",
            summary.total_issues,
            summary.errors,
            summary.warnings,
            summary.notices,
            summary.accessibility_score
        ),
        BODY_SIZE + 1.0,
        false,
        text_color(),
    );
    writer.gap(6.0);

    if report.issues.is_empty() {
        writer.line("No accessibility issues found.", 12.0, true, heading_color());
    } else {
        writer.line("Detailed Issues", 12.0, true, heading_color());
        writer.gap(2.0);

        for issue in &report.issues {
            let message = wrap_text(&issue.message, WRAP_COLUMNS);
            let recommendation = wrap_text(&issue.recommendation, WRAP_COLUMNS);
            let block_height =
                line_height(BODY_SIZE) * (3 + message.len() + recommendation.len()) as f32;
            writer.ensure_space(block_height);

            writer.line(
                &format!(
                    "[{}] {}",
                    issue.issue_type.as_str().to_uppercase(),
                    format_rule_code(&issue.code)
                ),
                BODY_SIZE,
                true,
                type_color(issue.issue_type),
            );
            writer.line("Issue:", BODY_SIZE, true, text_color());
            for line in &message {
                writer.line(line, BODY_SIZE, false, text_color());
            }
            writer.line("Recommendation:", BODY_SIZE, true, text_color());
            for line in &recommendation {
                writer.line(line, BODY_SIZE, false, text_color());
            }
            writer.gap(3.0);
        }
    }

    writer.gap(6.0);
    writer.line(
        "Generated by AdaptiveTest - Automated Accessibility Scanner",
        8.0,
        false,
        Rgb::new(0.5, 0.5, 0.5, None),
    );

    writer.finish()
}

/// One page-spanning listing of every stored scan
pub fn generate_digest(scans: &[ScanDigest]) -> CoreResult<Vec<u8>> {
    let mut writer = PageWriter::new("Scan Results Report")?;

    writer.line("Scan Results Report", 16.0, true, heading_color());
    writer.line(&format!("Scans: {}", scans.len()), BODY_SIZE, false, text_color());
    writer.gap(4.0);

    if scans.is_empty() {
        writer.line("No scans recorded yet.", BODY_SIZE + 1.0, true, heading_color());
    }

    for scan in scans {
        let entry = format!(
            "ID: {} | Title: {} | URL: {} | Status: {} | Issues: {} | Created: {}",
            scan.scan_id,
            scan.document_title.as_deref().unwrap_or("-"),
            scan.url,
            scan.status,
            scan.issue_count,
            scan.created_at.format("%Y-%m-%d %H:%M")
        );
        let lines = wrap_text(&entry, WRAP_COLUMNS);
        writer.ensure_space(line_height(BODY_SIZE) * lines.len() as f32);
        for line in &lines {
            writer.line(line, BODY_SIZE, false, text_color());
        }
        writer.gap(1.5);
    }

    writer.finish()
}

struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> CoreResult<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Page 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| CoreError::Report(format!("font setup failed: {:?}", e)))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| CoreError::Report(format!("font setup failed: {:?}", e)))?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
            pages: 1,
        })
    }

    fn ensure_space(&mut self, height: f32) {
        if self.y - height < MARGIN {
            self.new_page();
        }
    }

    fn new_page(&mut self) {
        self.pages += 1;
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            format!("Page {}", self.pages),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn line(&mut self, text: &str, size: f32, bold: bool, color: Rgb) {
        let height = line_height(size);
        self.ensure_space(height);
        self.y -= height;

        let font = if bold { &self.bold } else { &self.regular };
        self.layer.set_fill_color(Color::Rgb(color));
        self.layer
            .use_text(pdf_safe(text), size, Mm(MARGIN), Mm(self.y), font);
    }

    /// Wrapped text, one `line` per wrapped row
    fn paragraph(&mut self, text: &str, size: f32, bold: bool, color: Rgb) {
        for row in wrap_text(text, WRAP_COLUMNS) {
            self.line(&row, size, bold, color.clone());
        }
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn finish(self) -> CoreResult<Vec<u8>> {
        self.doc
            .save_to_bytes()
            .map_err(|e| CoreError::Report(format!("PDF serialization failed: {:?}", e)))
    }
}

fn line_height(size: f32) -> f32 {
    // points to millimetres, with 40% leading
    size * 0.3528 * 1.4
}

fn heading_color() -> Rgb {
    Rgb::new(0.18, 0.22, 0.28, None)
}

fn text_color() -> Rgb {
    Rgb::new(0.1, 0.1, 0.1, None)
}

fn type_color(issue_type: IssueType) -> Rgb {
    match issue_type {
        IssueType::Error => Rgb::new(0.8, 0.1, 0.1, None),
        IssueType::Warning => Rgb::new(0.85, 0.5, 0.0, None),
        IssueType::Notice => Rgb::new(0.1, 0.3, 0.8, None),
    }
}

/// Built-in PDF fonts only cover Latin-1; anything else is replaced.
fn pdf_safe(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

/// Shorten verbose WCAG technique codes for display
pub(crate) fn format_rule_code(code: &str) -> String {
    let simplified = code
        .replace("WCAG2AA.Principle", "P")
        .replace("WCAG2A.Principle", "P")
        .replace("Guideline", "G");
    if simplified.chars().count() > CODE_COLUMNS {
        let truncated: String = simplified.chars().take(CODE_COLUMNS).collect();
        format!("{}...", truncated)
    } else {
        simplified
    }
}

/// Greedy word wrap; words longer than `width` are split hard.
pub(crate) fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IssueRecord, ScanRecord, ScanStatus};

    fn report(issue_count: usize) -> ScanReport {
        let scan = ScanRecord {
            id: 1,
            url: "https://example.com".to_string(),
            status: ScanStatus::Completed,
            document_title: Some("Example Domain".to_string()),
            page_url: Some("https://example.com/".to_string()),
            created_at: chrono::Utc::now(),
            completed_at: None,
        };
        let issues: Vec<IssueRecord> = (0..issue_count)
            .map(|i| IssueRecord {
                id: i as i64,
                scan_id: 1,
                code: "WCAG2AA.Principle1.Guideline1_4.1_4_3.G18.Fail".to_string(),
                message: "This element has insufficient contrast at this conformance level. \
                          Expected a contrast ratio of at least 4.5:1."
                    .to_string(),
                context: None,
                selector: None,
                issue_type: match i % 3 {
                    0 => IssueType::Error,
                    1 => IssueType::Warning,
                    _ => IssueType::Notice,
                },
                recommendation_text: Some("Increase the contrast \u{2013} use darker text.".to_string()),
            })
            .collect();
        ScanReport::assemble(&scan, &issues)
    }

    #[test]
    fn test_pdf_header() {
        let bytes = generate(&report(3)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_pdf_empty_report() {
        let bytes = generate(&report(0)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    /// Page objects (`/Type /Page`, not the `/Pages` tree node)
    fn page_count(pdf: &[u8]) -> usize {
        let text = String::from_utf8_lossy(pdf);
        text.match_indices("/Page")
            .filter(|(i, _)| {
                let after = text[i + "/Page".len()..].chars().next();
                text[..*i].trim_end().ends_with("/Type")
                    && !after.map_or(false, |c| c.is_ascii_alphanumeric())
            })
            .count()
    }

    #[test]
    fn test_pdf_paginates_long_reports() {
        assert_eq!(page_count(&generate(&report(2)).unwrap()), 1);
        let long = generate(&report(150)).unwrap();
        assert!(long.starts_with(b"%PDF"));
        assert!(page_count(&long) > 1);
    }

    #[test]
    fn test_long_url_is_wrapped() {
        let mut long = report(0);
        long.url = format!("https://example.com/{}", "segment/".repeat(40));
        let rows = wrap_text(&format!("Scanned URL: {}", long.url), WRAP_COLUMNS);
        assert!(rows.len() > 1);
        assert!(rows.iter().all(|r| r.chars().count() <= WRAP_COLUMNS));
        assert!(generate(&long).unwrap().starts_with(b"%PDF"));
    }

    fn digest(count: usize) -> Vec<ScanDigest> {
        (0..count)
            .map(|i| ScanDigest {
                scan_id: i as i64 + 1,
                url: format!("https://example.com/page/{}", i),
                status: ScanStatus::Completed,
                document_title: Some("Example Domain".to_string()),
                created_at: chrono::Utc::now(),
                issue_count: 4,
            })
            .collect()
    }

    #[test]
    fn test_digest_pdf() {
        let empty = generate_digest(&[]).unwrap();
        assert!(empty.starts_with(b"%PDF"));
        assert_eq!(page_count(&empty), 1);

        let many = generate_digest(&digest(200)).unwrap();
        assert!(many.starts_with(b"%PDF"));
        assert!(page_count(&many) > 1);
    }

    #[test]
    fn test_wrap_text() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 10);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps over", "the lazy", "dog"]);
        assert!(lines.iter().all(|l| l.len() <= 10));
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let lines = wrap_text("abcdefghijkl xy", 5);
        assert_eq!(lines, vec!["abcde", "fghij", "kl xy"]);
        assert!(wrap_text("   ", 5).is_empty());
    }

    #[test]
    fn test_format_rule_code() {
        assert_eq!(
            format_rule_code("WCAG2AA.Principle1.Guideline1_1.1_1_1.H37"),
            "P1.G1_1.1_1_1.H37"
        );
        assert_eq!(format_rule_code("color-contrast"), "color-contrast");
        assert!(format_rule_code(&"x".repeat(200)).ends_with("..."));
    }

    #[test]
    fn test_pdf_safe_replaces_non_ascii() {
        assert_eq!(pdf_safe("a\u{2013}b\n"), "a?b?");
    }
}
