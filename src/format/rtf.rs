//! Page buffer to RTF paragraphs.

use std::fmt::Write as _;

use crate::layout::Grid;
use crate::options::OutputFormat;

/// Page margins in points, capped at a inch and a half.
pub const MAX_MARGIN: i64 = 108;

/// Margins lifted out of a page's leading blank lines and common indent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Margins {
    pub top: i64,
    pub left: i64,
}

fn is_token(b: u8) -> bool {
    matches!(b, b'\\' | b'{' | b'}')
}

fn control_word_at(data: &[u8], i: usize) -> bool {
    data[i] == b'\\' && i > 0 && data[i - 1] != b'\\' && !data.get(i + 1).is_some_and(|&b| is_token(b))
}

fn group_at(data: &[u8], i: usize) -> bool {
    data[i] == b'{' && i > 0 && data[i - 1] != b'\\'
}

/// Index of the first `stop` byte at or after `i`, or the buffer end.
fn skip_to(data: &[u8], i: usize, stop: u8) -> usize {
    data[i..].iter().position(|&b| b == stop).map_or(data.len(), |p| i + p)
}

/// Smallest indent in columns over lines that start with spaces, ignoring
/// control words and groups.
fn common_indent(data: &[u8], cols: i64) -> i64 {
    let mut indent = cols;
    let mut feed = false;
    let mut spaces = 0;
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if b == b'\n' {
            feed = true;
            spaces = 0;
        } else if feed {
            if b == b' ' {
                spaces += 1;
            } else if group_at(data, i) {
                i = skip_to(data, i, b'}');
            } else if control_word_at(data, i) {
                i = skip_to(data, i, b' ');
            } else {
                if spaces != 0 && spaces < indent {
                    indent = spaces;
                }
                feed = false;
            }
        }
        i += 1;
    }
    indent
}

/// Convert newlines to RTF line breaks and leading spaces to `\li` indents.
///
/// Word-processor RTF moves the page's leading blank lines and common
/// indent into section margins instead.
pub fn page_to_rtf(data: &[u8], grid: &Grid, format: OutputFormat, strip: bool) -> (Vec<u8>, Margins) {
    let mut margins = Margins::default();
    let mut depth = 0;
    let mut indent = 0;

    if !strip {
        depth = data.iter().take_while(|&&b| b == b'\n').count();
        indent = common_indent(data, grid.cols);

        if format == OutputFormat::RtfWord {
            margins.top = (depth as f64 / grid.ys).round() as i64;
            if margins.top > MAX_MARGIN {
                margins.top = MAX_MARGIN;
                depth = (grid.ys * MAX_MARGIN as f64).round() as usize;
            }
            margins.left = (indent as f64 / grid.xs).round() as i64;
            if margins.left > MAX_MARGIN {
                margins.left = MAX_MARGIN;
                indent = (grid.xs * MAX_MARGIN as f64).round() as i64;
            }
        } else {
            depth = 0;
            indent = 0;
        }
    }

    let newlines = data.iter().filter(|&&b| b == b'\n').count();
    let mut out = Vec::with_capacity(data.len() + newlines * 16);
    let mut feed = false;
    let mut margin: i64 = 0;
    let mut margin_set: i64 = 0;
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        if b == b'\n' {
            if i >= depth {
                out.extend_from_slice(b"\\\n");
            }
            feed = true;
            margin = 0;
        } else if control_word_at(data, i) {
            let end = skip_to(data, i, b' ');
            out.extend_from_slice(&data[i..(end + 1).min(data.len())]);
            i = end;
        } else if b == b' ' && feed {
            margin += 1;
        } else {
            if feed {
                if margin != 0 {
                    margin -= indent;
                    if margin != margin_set {
                        if margin > 0 {
                            let twips = 20 * (margin as f64 / grid.xs).round() as i64;
                            let mut entry = String::new();
                            let _ = writeln!(entry, "\\li{twips}");
                            out.extend_from_slice(entry.as_bytes());
                        } else {
                            out.extend_from_slice(b"\\li0\n");
                            margin = 0;
                        }
                        margin_set = margin;
                    }
                    margin = 0;
                } else if margin_set != 0 {
                    out.extend_from_slice(b"\\li0\n");
                    margin_set = 0;
                }
                feed = false;
            }

            if group_at(data, i) {
                let end = skip_to(data, i, b'}');
                out.extend_from_slice(&data[i..(end + 1).min(data.len())]);
                i = end;
            } else {
                out.push(b);
            }
        }
        i += 1;
    }

    (out, margins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PageRuns;

    fn grid() -> Grid {
        Grid::for_page(612.0, 792.0, &PageRuns::default())
    }

    #[test]
    fn test_line_breaks_and_indent() {
        let page = b"\nfirst\n      second\nthird";
        let (out, margins) = page_to_rtf(page, &grid(), OutputFormat::Rtf, false);
        assert_eq!(margins, Margins::default());
        assert_eq!(out, b"\\\nfirst\\\n\\li720\nsecond\\\n\\li0\nthird");
    }

    #[test]
    fn test_word_margins_absorb_indent() {
        let page = b"\n\n  \\f1 a\n    b";
        let (out, margins) = page_to_rtf(page, &grid(), OutputFormat::RtfWord, false);
        assert_eq!(margins, Margins { top: 24, left: 12 });
        assert_eq!(out, b"\\f1 a\\\n\\li240\nb");
    }

    #[test]
    fn test_group_copied_whole() {
        let page = b"x{\\u8226?} y";
        let (out, _) = page_to_rtf(page, &grid(), OutputFormat::Rtf, true);
        assert_eq!(out, page);
    }
}
