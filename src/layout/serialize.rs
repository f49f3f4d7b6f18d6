use super::grid::Grid;
use super::tabs::TabStops;
use super::whitespace::Spacing;
use super::TextRun;
use crate::content::MIN_MIDLINE_SPACING;
use crate::error::Result;
use crate::options::ConvertOptions;

/// Pop padding spaces while the run sits left of the current column.
fn backtrack(out: &mut Vec<u8>, column: i64, current_col: &mut i64) {
    while out.len() >= 2 && out.ends_with(b"  ") && column < *current_col {
        out.pop();
        *current_col -= 1;
    }
}

/// Walk the laid-out runs once and produce the page's character buffer.
///
/// Returns an empty buffer when the page has nothing to emit.
pub fn serialize(
    runs: &[TextRun],
    grid: &Grid,
    tabs: &TabStops,
    spacing: Spacing,
    opts: &ConvertOptions,
) -> Result<Vec<u8>> {
    let content: usize = runs.iter().filter(|r| r.is_visible()).map(TextRun::markup_len).sum();
    let size = content + spacing.extra;
    let mut out = Vec::new();
    if size == 0 {
        return Ok(out);
    }
    out.try_reserve(size)?;

    let markup = opts.format.is_markup();
    let mut current_x = 0.0;
    let mut current_col: i64 = 0;

    for run in runs.iter().filter(|r| r.is_visible()) {
        if run.line != 0 {
            out.extend(std::iter::repeat_n(b'\n', run.line.max(0) as usize));
            current_col = 0;
            if run.column != 0 {
                out.extend(std::iter::repeat_n(b' ', run.column.max(0) as usize));
                current_col += run.column;
            }
        } else if run.column != 0 && !run.is_whitespace {
            if markup {
                if !opts.pad_strip && tabs.contains(run.column) && run.x > current_x {
                    let from = (current_x * grid.xs).round() as i64;
                    let count = tabs.tabs_to_col(from, run.column);
                    out.extend(std::iter::repeat_n(b'\t', count));
                    current_col = run.column;
                } else if run.column < current_col {
                    backtrack(&mut out, run.column, &mut current_col);
                }
            } else if run.column > current_col {
                let mut offset = run.column - current_col;
                if opts.relaxed_spacing || offset >= MIN_MIDLINE_SPACING {
                    if opts.relaxed_spacing && opts.tight_spacing && offset > 1 && offset < MIN_MIDLINE_SPACING {
                        current_col += offset - 1;
                        offset = 1;
                    }
                    out.extend(std::iter::repeat_n(b' ', offset as usize));
                    current_col += offset;
                }
            } else {
                backtrack(&mut out, run.column, &mut current_col);
            }
        }

        current_x = run.tx;
        if let Some(pre) = &run.pre {
            out.extend_from_slice(pre);
        }
        out.extend_from_slice(&run.text);
        current_col += run.width as i64;
        if let Some(post) = &run.post {
            out.extend_from_slice(post);
        }
    }

    out.extend(std::iter::repeat_n(b'\n', spacing.page_spacing));
    Ok(out)
}
