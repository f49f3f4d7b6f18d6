//! Markup attached to runs where the font, size, style or baseline changes.

use std::fmt::Write as _;

use crate::content::fequal;
use crate::font::{FontId, FontTable};
use crate::layout::{RTF_LINE_SPACING, TextRun};
use crate::options::{ConvertOptions, OutputFormat};

/// Script runs in word-processor RTF are set larger so they stay legible
/// once the processor shrinks them.
pub const RTF_WORD_SCRIPT_SCALE: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shift {
    None,
    Super,
    Sub,
}

impl Shift {
    fn of(run: &TextRun) -> Self {
        if fequal(run.ty, run.y) {
            Shift::None
        } else if run.ty > run.y {
            Shift::Super
        } else {
            Shift::Sub
        }
    }
}

/// What changed at a run relative to the previous tagged run.
struct Change {
    font: bool,
    bold: bool,
    italic: bool,
    shift: Shift,
}

/// Tracks the font across runs; bold and italic follow the run's font.
#[derive(Default)]
struct FontTracker {
    current: Option<FontId>,
}

impl FontTracker {
    fn observe(&mut self, run: &TextRun, fonts: &FontTable) -> Change {
        let mut change = Change {
            font: false,
            bold: false,
            italic: false,
            shift: Shift::of(run),
        };
        if let Some(font) = run.font.and_then(|id| fonts.get(id)) {
            if run.font != self.current {
                change.font = true;
                self.current = run.font;
            }
            change.bold = font.bold;
            change.italic = font.italic;
        }
        change
    }
}

/// Attach RTF control words to the page's runs.
pub fn rtf_tags(runs: &mut [TextRun], fonts: &FontTable, opts: &ConvertOptions) {
    let mut tracker = FontTracker::default();
    let mut current_size = 0;
    let (mut bold, mut italic) = (false, false);

    for run in runs.iter_mut().filter(|r| r.is_visible() && !r.is_whitespace) {
        let change = tracker.observe(run, fonts);
        let shifted = change.shift != Shift::None;

        let scale = if shifted && opts.format == OutputFormat::RtfWord { RTF_WORD_SCRIPT_SCALE } else { 1.0 };
        let mut font_size = (run.f * 2.0 * scale).round() as i64;
        if font_size == 0 {
            font_size = 24;
        }
        let mut line_spacing = (run.f * 20.0 * RTF_LINE_SPACING).round() as i64;
        if line_spacing == 0 {
            line_spacing = (12.0 * 20.0 * RTF_LINE_SPACING).round() as i64;
        }
        let size_changed = font_size != current_size;
        if size_changed {
            current_size = font_size;
        }

        if !(change.font || size_changed || shifted) {
            continue;
        }

        let mut pre = String::new();
        if opts.style_changes {
            if !change.bold && bold {
                pre.push_str("\\b0");
                bold = false;
            }
            if !change.italic && italic {
                pre.push_str("\\i0");
                italic = false;
            }
        }
        if opts.font_changes && change.font {
            if let Some(font) = run.font.and_then(|id| fonts.get(id)) {
                let _ = write!(pre, "\\f{}", font.index);
            }
        }
        if opts.size_changes && size_changed {
            let _ = write!(pre, "\\fs{font_size}\\sl{line_spacing}");
        }
        if opts.style_changes {
            if change.bold && !bold {
                pre.push_str("\\b");
                bold = true;
            }
            if change.italic && !italic {
                pre.push_str("\\i");
                italic = true;
            }
        }
        if opts.super_sub_changes {
            match change.shift {
                Shift::Super => pre.push_str("\\super"),
                Shift::Sub => pre.push_str("\\sub"),
                Shift::None => {}
            }
        }

        if !pre.is_empty() {
            pre.push(' ');
            run.pre = Some(pre.into_bytes());
        }
        if shifted && opts.super_sub_changes {
            run.post = Some(b"\\nosupersub {}".to_vec());
        }
    }
}

/// HTML state left open when a page's runs end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenTags {
    pub font: bool,
    pub bold: bool,
    pub italic: bool,
}

impl OpenTags {
    pub fn closing(self) -> String {
        let mut out = String::new();
        if self.font {
            out.push_str("</font>");
        }
        if self.bold {
            out.push_str("</b>");
        }
        if self.italic {
            out.push_str("</i>");
        }
        out
    }
}

/// Escape a run's Windows Latin-1 bytes for HTML text.
pub fn escape_html_text(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for chunk in text.split_inclusive(|&b| b > 127) {
        let (ascii, high) = match chunk.split_last() {
            Some((&last, rest)) if last > 127 => (rest, Some(last)),
            _ => (chunk, None),
        };
        // ascii bytes are valid UTF-8 by construction
        let plain = String::from_utf8_lossy(ascii);
        out.extend_from_slice(html_escape::encode_text(&plain).as_bytes());
        if let Some(b) = high {
            out.extend_from_slice(format!("&#{b};").as_bytes());
        }
    }
    out
}

fn html_font_size(f: f64) -> i64 {
    match f.round() as i64 {
        i64::MIN..=8 => 1,
        9..=10 => 2,
        11..=12 => 3,
        13..=14 => 4,
        15..=18 => 5,
        19..=24 => 6,
        _ => 7,
    }
}

/// Escape run text and attach HTML tags, returning what is still open.
pub fn html_tags(runs: &mut [TextRun], fonts: &FontTable, opts: &ConvertOptions) -> OpenTags {
    let mut tracker = FontTracker::default();
    let mut current_size = 1;
    let mut open = OpenTags::default();

    for run in runs.iter_mut().filter(|r| r.is_visible() && !r.is_whitespace) {
        if run.text.iter().any(|&b| b > 127 || matches!(b, b'&' | b'<' | b'>')) {
            run.text = escape_html_text(&run.text);
        }

        let change = tracker.observe(run, fonts);
        let shifted = change.shift != Shift::None;
        let font_size = html_font_size(run.f);
        let size_changed = font_size != current_size;
        if size_changed {
            current_size = font_size;
        }

        if !(change.font || size_changed || shifted) {
            continue;
        }

        let mut pre = String::new();
        if opts.style_changes {
            if !change.bold && open.bold {
                pre.push_str("</b>");
                open.bold = false;
            }
            if !change.italic && open.italic {
                pre.push_str("</i>");
                open.italic = false;
            }
        }
        if (opts.font_changes && change.font) || (opts.size_changes && size_changed) {
            if open.font {
                pre.push_str("</font>");
            }
            match tracker.current.and_then(|id| fonts.get(id)) {
                Some(font) => {
                    let face = html_escape::encode_double_quoted_attribute(&font.base_font);
                    let _ = write!(pre, "<font face=\"{face}\" size={current_size}>");
                }
                None => {
                    let _ = write!(pre, "<font size={current_size}>");
                }
            }
            open.font = true;
        }
        if opts.style_changes {
            if change.bold && !open.bold {
                pre.push_str("<b>");
                open.bold = true;
            }
            if change.italic && !open.italic {
                pre.push_str("<i>");
                open.italic = true;
            }
        }

        let mut post = String::new();
        if opts.super_sub_changes {
            match change.shift {
                Shift::Super => {
                    pre.push_str("<sup>");
                    post.push_str("</sup>");
                }
                Shift::Sub => {
                    pre.push_str("<sub>");
                    post.push_str("</sub>");
                }
                Shift::None => {}
            }
        }

        if !pre.is_empty() {
            run.pre = Some(pre.into_bytes());
        }
        if !post.is_empty() {
            run.post = Some(post.into_bytes());
        }
    }
    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{EncoderTable, FontSpec};
    use crate::layout::run::make_run;

    fn fonts(format: OutputFormat) -> FontTable {
        let mut encoders = EncoderTable::new(format.encoding());
        let mut table = FontTable::new();
        for (key, base) in [("F1", "Helvetica"), ("F2", "Helvetica-Bold")] {
            let spec = FontSpec {
                key: key.to_string(),
                base_font: base.to_string(),
                ..Default::default()
            };
            table.add(spec, format, &mut encoders);
        }
        table
    }

    fn run_in(font: FontId, text: &str, f: f64) -> TextRun {
        let mut run = make_run(text, 0.0, 700.0, f);
        run.font = Some(font);
        run
    }

    fn pre(run: &TextRun) -> &str {
        run.pre.as_deref().map_or("", |p| std::str::from_utf8(p).unwrap())
    }

    #[test]
    fn test_rtf_tags_only_on_transitions() {
        let table = fonts(OutputFormat::Rtf);
        let mut runs = vec![run_in(0, "a", 12.0), run_in(0, "b", 12.0), run_in(1, "c", 12.0), run_in(0, "d", 10.0)];
        rtf_tags(&mut runs, &table, &ConvertOptions::with_format(OutputFormat::Rtf));
        assert_eq!(pre(&runs[0]), "\\f0\\fs24\\sl276 ");
        assert!(runs[1].pre.is_none());
        assert_eq!(pre(&runs[2]), "\\f1\\b ");
        assert_eq!(pre(&runs[3]), "\\b0\\f0\\fs20\\sl230 ");
    }

    #[test]
    fn test_rtf_superscript() {
        let table = fonts(OutputFormat::RtfWord);
        let mut runs = vec![run_in(0, "x", 12.0), run_in(0, "2", 6.0)];
        runs[1].ty = runs[1].y + 3.0;
        rtf_tags(&mut runs, &table, &ConvertOptions::with_format(OutputFormat::RtfWord));
        assert_eq!(pre(&runs[1]), "\\fs18\\sl138\\super ");
        assert_eq!(runs[1].post.as_deref(), Some(&b"\\nosupersub {}"[..]));
    }

    #[test]
    fn test_html_tags_and_escaping() {
        let table = fonts(OutputFormat::Html);
        let mut runs = vec![run_in(0, "a<b", 12.0), run_in(1, "bold", 12.0)];
        runs[1].text.push(0xE9);
        let open = html_tags(&mut runs, &table, &ConvertOptions::with_format(OutputFormat::Html));
        assert_eq!(runs[0].text, b"a&lt;b");
        assert_eq!(pre(&runs[0]), "<font face=\"Helvetica\" size=3>");
        assert_eq!(runs[1].text, b"bold&#233;");
        assert_eq!(pre(&runs[1]), "</font><font face=\"Helvetica\" size=3><b>");
        assert_eq!(open, OpenTags { font: true, bold: true, italic: false });
        assert_eq!(open.closing(), "</font></b>");
    }

    #[test]
    fn test_html_font_size_buckets() {
        assert_eq!(html_font_size(8.0), 1);
        assert_eq!(html_font_size(10.4), 2);
        assert_eq!(html_font_size(12.0), 3);
        assert_eq!(html_font_size(20.0), 6);
        assert_eq!(html_font_size(36.0), 7);
    }
}
