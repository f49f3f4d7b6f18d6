//! Turning grid positions into newline and space counts.

use super::grid::Grid;
use super::tabs::TabStops;
use super::{RTF_LINE_SPACING, TextRun};
use crate::content::{EPS, MIN_MIDLINE_SPACING, fequal};
use crate::error::Result;
use crate::options::{ConvertOptions, OutputFormat};

/// Whitespace added to a page by [`calc_whitespace`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Spacing {
    /// Newline and space bytes the serializer will emit.
    pub extra: usize,
    /// Blank lines closing the page; zero for markup pages that keep tabs.
    pub page_spacing: usize,
}

/// Rewrite each visible run's `line` as a newline count and its `column` as
/// a space count, registering tab stops for wide midline gaps.
pub fn calc_whitespace(runs: &mut [TextRun], grid: &Grid, tabs: &mut TabStops, opts: &ConvertOptions) -> Spacing {
    let format = opts.format;
    let markup = format.is_markup();
    let keeps_tabs = markup && !opts.pad_strip;
    let leading = if format == OutputFormat::Rtf { 1.0 / RTF_LINE_SPACING } else { 1.0 };

    let mut current_x = 0.0;
    let mut current_y = grid.ymax;
    let mut current_f = 0.0;
    let mut current_col: i64 = 0;

    let base_x = 1.0 / grid.xs;
    let base_y = 1.0 / grid.ys;
    let base_f = 2.0 * base_x + EPS;

    let mut extra: i64 = 0;

    for run in runs.iter_mut().filter(|r| r.is_visible()) {
        if run.line != 0 || run.x < current_x {
            let mut w = 1;
            if grid.lines != 0 && opts.pad_lines {
                let size = if !markup || fequal(current_f, 0.0) { base_y } else { current_f };
                let mut delta = leading * (current_y - run.y);
                w = (delta / size).round() as i64;
                if w > 2 {
                    delta -= run.f * RTF_LINE_SPACING;
                    w = (delta / size).round() as i64;
                }
                w = w.clamp(1, grid.lines);
            }

            current_col = 0;
            extra += w;
            run.line = w;

            if grid.cols != 0 && opts.pad_columns {
                let col = run.column.clamp(0, grid.cols);
                extra += col;
                run.column = col;
                current_col += col;
            } else {
                run.column = 0;
            }
        } else if opts.pad_columns && grid.cols != 0 && !run.is_whitespace {
            let mut w = run.column.clamp(0, grid.cols);
            if w > current_col {
                let offset = w - current_col;
                let mid_offset = if markup && run.f > base_f {
                    (offset as f64 * base_x / run.f).round() as i64
                } else {
                    offset
                };

                if opts.relaxed_spacing || mid_offset >= MIN_MIDLINE_SPACING {
                    if keeps_tabs {
                        tabs.add(w);
                        current_col = run.column;
                    } else {
                        current_col += offset;
                    }
                } else {
                    w = offset + current_col;
                }
            }
            extra += w;
            run.column = w;
        } else {
            run.column = 0;
        }

        current_x = run.x;
        current_y = run.y;
        if fequal(run.y, run.ty) {
            current_f = run.f;
        }
        current_col += run.width as i64;
    }

    let mut page_spacing = 0;
    if keeps_tabs {
        tabs.sort();
    } else {
        page_spacing = 2;
        if grid.lines != 0 {
            let lines = if !markup || fequal(current_f, 0.0) {
                leading * current_y * grid.ys
            } else {
                leading * current_y / current_f
            };
            page_spacing = (lines.round() as i64).clamp(2, grid.lines.max(2));
        }
        extra += page_spacing;
    }

    Spacing {
        extra: extra.max(0) as usize,
        page_spacing: page_spacing as usize,
    }
}

/// Promote columns that most rows align to, right of a two-inch margin,
/// into tab stops.
pub fn calc_extra_tabs(runs: &[TextRun], grid: &Grid, tabs: &mut TabStops) -> Result<()> {
    if grid.cols <= 0 {
        return Ok(());
    }
    let slots = grid.cols as usize + 1;
    let mut spread: Vec<i64> = Vec::new();
    spread.try_reserve_exact(slots)?;
    spread.resize(slots, 0);
    let mut line_count = 0_i64;

    for run in runs.iter().filter(|r| r.is_visible() && !r.is_whitespace) {
        if run.line != 0 {
            line_count += 1;
        }
        if run.column != 0 && !tabs.contains(run.column) {
            if let Some(slot) = usize::try_from(run.column).ok().and_then(|c| spread.get_mut(c)) {
                *slot += 1;
            }
        }
    }

    let line_count = (line_count / 2).max(1);
    let threshold = (144.0 * grid.xs) as i64;

    let mut added = false;
    for (column, &count) in spread.iter().enumerate().skip(threshold.max(0) as usize) {
        if count > line_count {
            tabs.add(column as i64);
            added = true;
        }
    }
    if added {
        tabs.sort();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::grid::{MAX_GRID, fit, normalize, sort_runs};
    use crate::layout::run::make_run;
    use crate::layout::PageRuns;

    fn prepare(runs: &mut Vec<TextRun>) -> Grid {
        let mut grid = Grid::for_page(612.0, 792.0, &PageRuns::default());
        normalize(runs, &mut grid);
        sort_runs(runs);
        fit(runs, &grid);
        grid
    }

    #[test]
    fn test_wide_gap_becomes_tab_stop_in_markup() {
        let mut runs = vec![make_run("Name:", 0.0, 700.0, 12.0), make_run("Alice", 120.0, 700.0, 12.0)];
        let grid = prepare(&mut runs);
        assert_eq!(runs[1].column, 20);
        let mut tabs = TabStops::new();
        let opts = ConvertOptions::with_format(OutputFormat::Rtf);
        let spacing = calc_whitespace(&mut runs, &grid, &mut tabs, &opts);
        assert_eq!(tabs.as_slice(), &[20]);
        assert_eq!(spacing.page_spacing, 0);
        assert_eq!(runs[1].column, 20);
    }

    #[test]
    fn test_narrow_gap_in_text_keeps_absolute_column() {
        let mut runs = vec![make_run("ab", 0.0, 700.0, 12.0), make_run("cd", 24.0, 700.0, 12.0)];
        let grid = prepare(&mut runs);
        let mut tabs = TabStops::new();
        calc_whitespace(&mut runs, &grid, &mut tabs, &ConvertOptions::default());
        assert!(tabs.is_empty());
        assert_eq!(runs[1].column, 4);
    }

    #[test]
    fn test_first_run_line_count_from_gap() {
        let mut runs = vec![make_run("Hello", 72.0, 700.0, 12.0)];
        let grid = prepare(&mut runs);
        let mut tabs = TabStops::new();
        let spacing = calc_whitespace(&mut runs, &grid, &mut tabs, &ConvertOptions::default());
        // 92pt below the top at 12pt per line, less one line of leading
        assert_eq!(runs[0].line, ((92.0 - 12.0 * RTF_LINE_SPACING) / 12.0_f64).round() as i64);
        assert_eq!(runs[0].column, 12);
        assert_eq!(spacing.page_spacing, (700.0_f64 / 12.0).round() as usize);
    }

    #[test]
    fn test_oversized_page_grid_is_bounded() {
        let mut runs = vec![make_run("Name:", 0.0, 700.0, 12.0), make_run("Alice", 1e11, 700.0, 12.0)];
        let mut grid = Grid::for_page(1e12, 792.0, &PageRuns::default());
        assert_eq!(grid.cols, MAX_GRID);
        normalize(&mut runs, &mut grid);
        fit(&mut runs, &grid);
        let mut tabs = TabStops::new();
        let opts = ConvertOptions::with_format(OutputFormat::Rtf);
        let spacing = calc_whitespace(&mut runs, &grid, &mut tabs, &opts);
        calc_extra_tabs(&runs, &grid, &mut tabs).unwrap();
        assert!(runs.iter().all(|r| r.column <= MAX_GRID));
        assert!(spacing.extra <= (2 * MAX_GRID) as usize + 2);
    }

    #[test]
    fn test_extra_tabs_strictly_ascending() {
        let mut runs = Vec::new();
        for row in 0..6 {
            let y = 700.0 - 20.0 * row as f64;
            runs.push(make_run("x", 0.0, y, 12.0));
            runs.push(make_run("y", 300.0, y, 12.0));
            runs.push(make_run("z", 200.0, y, 12.0));
        }
        let grid = prepare(&mut runs);
        let mut tabs = TabStops::new();
        let mut opts = ConvertOptions::with_format(OutputFormat::Rtf);
        opts.pad_strip = true;
        calc_whitespace(&mut runs, &grid, &mut tabs, &opts);
        assert!(tabs.is_empty());
        calc_extra_tabs(&runs, &grid, &mut tabs).unwrap();
        assert_eq!(tabs.as_slice(), &[33, 50]);
        assert_eq!((runs[1].column, runs[2].column), (33, 50));
        assert!(tabs.as_slice().windows(2).all(|w| w[0] < w[1]));
    }
}
