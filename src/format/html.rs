//! Page buffer to HTML lines.

use super::rtf::MAX_MARGIN;
use super::tags::OpenTags;
use crate::layout::Grid;

const NBSP: &[u8] = b"&nbsp;";

/// Smallest indent over lines that start with spaces, ignoring tags.
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
            } else if b == b'<' {
                i = data[i..].iter().position(|&c| c == b'>').map_or(data.len(), |p| i + p);
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

/// Convert newlines to `<br>` and runs of spaces to `&nbsp;`, closing any
/// tags still open at the end of the page. Returns the left margin in
/// points that the page's common indent was folded into.
pub fn page_to_html(data: &[u8], grid: &Grid, strip: bool, open: OpenTags) -> (Vec<u8>, i64) {
    let mut indent = 0;
    let mut left_margin = 0;
    if !strip {
        indent = common_indent(data, grid.cols);
        left_margin = (indent as f64 / grid.xs).round() as i64;
        if left_margin > MAX_MARGIN {
            left_margin = MAX_MARGIN;
            indent = (grid.xs * MAX_MARGIN as f64).round() as i64;
        }
    }

    let newlines = data.iter().filter(|&&b| b == b'\n').count();
    let mut out = Vec::with_capacity(data.len() + newlines * 4 + 16);
    let mut feed = true;
    let mut margin: i64 = 0;
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        if b == b'\n' {
            out.extend_from_slice(b"<br>\n");
            feed = true;
            margin = 0;
        } else if b == b' ' && feed {
            margin += 1;
            if !strip && margin > indent {
                out.extend_from_slice(NBSP);
            }
        } else {
            feed = false;
            if b == b'<' {
                let end = data[i..].iter().position(|&c| c == b'>').map_or(data.len(), |p| i + p);
                out.extend_from_slice(&data[i..(end + 1).min(data.len())]);
                i = end;
            } else if b == b' ' && data.get(i + 1) == Some(&b' ') {
                out.extend_from_slice(NBSP);
            } else {
                out.push(b);
            }
        }
        i += 1;
    }

    out.extend_from_slice(open.closing().as_bytes());
    (out, left_margin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PageRuns;

    fn grid() -> Grid {
        Grid::for_page(612.0, 792.0, &PageRuns::default())
    }

    #[test]
    fn test_breaks_and_spaces() {
        let page = b"\n  a  b c\n    <b>d</b>";
        let (out, margin) = page_to_html(page, &grid(), false, OpenTags::default());
        assert_eq!(margin, 12);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<br>\na&nbsp; b c<br>\n&nbsp;&nbsp;<b>d</b>"
        );
    }

    #[test]
    fn test_closes_open_tags() {
        let open = OpenTags {
            font: true,
            bold: false,
            italic: true,
        };
        let (out, margin) = page_to_html(b"x", &grid(), true, open);
        assert_eq!(margin, 0);
        assert_eq!(out, b"x</font></i>");
    }
}
