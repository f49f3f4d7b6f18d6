use super::{PageRuns, TextRun};
use crate::content::fequal;

/// Nominal cell size used when a page has no text statistics.
pub const CELL_WIDTH: f64 = 6.0;
pub const CELL_HEIGHT: f64 = 12.0;

/// Upper bound on grid columns and lines, whatever the page box says.
pub const MAX_GRID: i64 = 8192;

/// Character grid a page is rendered onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    /// Page size in points, already clamped to at least 72.
    pub width: f64,
    pub height: f64,
    pub cols: i64,
    pub lines: i64,
    /// Columns and lines per point.
    pub xs: f64,
    pub ys: f64,
    /// Extent of the content after normalization.
    pub xmax: f64,
    pub ymax: f64,
}

impl Grid {
    /// Size the grid from the page box and the average glyph weight.
    pub fn for_page(width: f64, height: f64, page: &PageRuns) -> Self {
        let mut cols = (width / CELL_WIDTH).round() as i64;
        let mut lines = (height / CELL_HEIGHT).round() as i64;

        if page.length > 0 {
            if page.weight > 0 {
                let total = if page.widths == 0 { page.length } else { page.widths } as i64;
                let mut average = page.weight / total.max(1);
                let rem = average % 4;
                if rem != 0 {
                    average += 4 - rem;
                }
                let average = average.clamp(4, 72) as f64;
                cols = (2.0 * width / average).round() as i64;
                lines = (height / average).round() as i64;
            }
            cols = cols.max(12);
            lines = lines.max(6);
        }
        let cols = cols.clamp(0, MAX_GRID);
        let lines = lines.clamp(0, MAX_GRID);

        Self {
            width,
            height,
            cols,
            lines,
            xs: if cols == 0 { 1.0 } else { cols as f64 / width },
            ys: if lines == 0 { 1.0 } else { lines as f64 / height },
            xmax: 0.0,
            ymax: 0.0,
        }
    }
}

/// Bring run coordinates into the page's positive quadrant.
///
/// An axis whose maximum is zero holds only negative coordinates and is
/// mirrored; mirrored content wider than the page is scaled down to fit.
pub fn normalize(runs: &mut [TextRun], grid: &mut Grid) {
    let (mut xmin, mut ymin) = (0.0_f64, 0.0_f64);
    let (mut xmax, mut ymax) = (0.0_f64, 0.0_f64);
    for run in runs.iter() {
        xmin = xmin.min(run.x);
        ymin = ymin.min(run.y);
        xmax = xmax.max(run.x);
        ymax = ymax.max(run.y);
    }

    let flip_x = fequal(xmax, 0.0);
    if flip_x {
        xmax = -xmin;
    }
    let flip_y = fequal(ymax, 0.0);
    if flip_y {
        ymax = -ymin;
    }
    grid.xmax = xmax.max(grid.width);
    grid.ymax = ymax.max(grid.height);

    if !flip_x && !flip_y {
        return;
    }

    let (mut cx, mut cy) = (0.0_f64, 0.0_f64);
    for run in runs.iter_mut() {
        if flip_x {
            run.x += grid.xmax;
            run.tx += grid.xmax;
        }
        if flip_y {
            run.y += grid.ymax;
            run.ty += grid.ymax;
        }
        cx = cx.max(run.x);
        cy = cy.max(run.y);
    }

    let xa = if cx > grid.width { grid.width / cx } else { 1.0 };
    let ya = if cy > grid.height { grid.height / cy } else { 1.0 };
    if xa != 1.0 || ya != 1.0 {
        for run in runs.iter_mut() {
            run.x *= xa;
            run.tx *= xa;
            run.y *= ya;
            run.ty *= ya;
        }
    }
}

/// Reading order: runs whose rounded baselines are within one point share a
/// row and go left to right; rows go top to bottom.
fn reads_before(a: &TextRun, b: &TextRun) -> bool {
    let d = a.y.round() as i64 - b.y.round() as i64;
    if (-1..=1).contains(&d) {
        a.x < b.x
    } else {
        b.y.round() < a.y.round()
    }
}

/// Stable merge sort into reading order.
///
/// The row tolerance makes the ordering non-transitive, so this uses a
/// plain merge that only ever asks "does `b` read before `a`".
pub fn sort_runs(runs: &mut Vec<TextRun>) {
    let n = runs.len();
    if n < 2 {
        return;
    }
    let mut order: Vec<usize> = (0..n).collect();
    let mut scratch = vec![0; n];
    merge_sort(&mut order, &mut scratch, &|a, b| reads_before(&runs[a], &runs[b]));

    let mut slots: Vec<Option<TextRun>> = runs.drain(..).map(Some).collect();
    runs.extend(order.iter().filter_map(|&i| slots[i].take()));
}

fn merge_sort(items: &mut [usize], scratch: &mut [usize], less: &impl Fn(usize, usize) -> bool) {
    let n = items.len();
    if n < 2 {
        return;
    }
    let mid = n / 2;
    merge_sort(&mut items[..mid], &mut scratch[..mid], less);
    merge_sort(&mut items[mid..], &mut scratch[mid..], less);

    scratch[..n].copy_from_slice(items);
    let (mut i, mut j) = (0, mid);
    for slot in items.iter_mut() {
        let take_right = j < n && (i >= mid || less(scratch[j], scratch[i]));
        if take_right {
            *slot = scratch[j];
            j += 1;
        } else {
            *slot = scratch[i];
            i += 1;
        }
    }
}

/// Assign grid columns, and line deltas relative to the previous run.
pub fn fit(runs: &mut [TextRun], grid: &Grid) {
    let mut prev_y = grid.ymax;
    for run in runs.iter_mut() {
        run.column = (run.x * grid.xs).round() as i64;
        run.line = ((prev_y - run.y) * grid.ys).round() as i64;
        prev_y = run.y;
    }
}

/// Drop rows, and row tails, made only of whitespace runs.
pub fn calc_lines(runs: &mut [TextRun]) {
    let mut head = 0;
    let mut all_ws = false;
    let mut current_x = 0.0;

    for i in 0..runs.len() {
        let (line, x, ws) = (runs[i].line, runs[i].x, runs[i].is_whitespace);
        if line != 0 || x < current_x {
            if all_ws {
                for run in &mut runs[head..i] {
                    run.drop_text();
                }
            }
            head = i;
            all_ws = ws;
        } else if all_ws && !ws {
            all_ws = false;
        } else if !all_ws && ws {
            head = i;
            all_ws = true;
        }
        current_x = x;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::run::make_run;

    fn page_of(runs: Vec<TextRun>) -> PageRuns {
        let mut page = PageRuns::default();
        for run in runs {
            page.push(run);
        }
        page
    }

    #[test]
    fn test_grid_without_text_uses_cells() {
        let grid = Grid::for_page(612.0, 792.0, &PageRuns::default());
        assert_eq!((grid.cols, grid.lines), (102, 66));
    }

    #[test]
    fn test_grid_from_weight() {
        // 12pt text averages to a weight of 12 per character
        let page = page_of(vec![make_run("Hello", 72.0, 700.0, 12.0)]);
        let grid = Grid::for_page(612.0, 792.0, &page);
        assert_eq!((grid.cols, grid.lines), (102, 66));
        assert!((grid.xs - 102.0 / 612.0).abs() < 1e-12);
    }

    #[test]
    fn test_grid_weight_rounds_up_and_clamps() {
        let page = page_of(vec![make_run("ab", 0.0, 0.0, 13.0)]);
        let grid = Grid::for_page(612.0, 792.0, &page);
        // 26 / 2 = 13, rounded up to 16
        assert_eq!(grid.cols, (2.0 * 612.0_f64 / 16.0).round() as i64);
        let page = page_of(vec![make_run("a", 0.0, 0.0, 1.0)]);
        let grid = Grid::for_page(100.0, 100.0, &page);
        assert_eq!((grid.cols, grid.lines), (50, 25));
    }

    #[test]
    fn test_normalize_mirrors_negative_axis() {
        let mut runs = vec![make_run("a", 10.0, -100.0, 12.0), make_run("b", 10.0, -700.0, 12.0)];
        let mut grid = Grid::for_page(612.0, 792.0, &PageRuns::default());
        normalize(&mut runs, &mut grid);
        assert_eq!(grid.ymax, 792.0);
        assert_eq!(runs[0].y, 692.0);
        assert_eq!(runs[1].y, 92.0);
    }

    #[test]
    fn test_sort_reading_order() {
        let mut runs = vec![
            make_run("low", 10.0, 100.0, 12.0),
            make_run("right", 300.0, 700.4, 12.0),
            make_run("left", 10.0, 699.6, 12.0),
        ];
        sort_runs(&mut runs);
        let texts: Vec<_> = runs.iter().map(|r| r.text.as_slice()).collect();
        assert_eq!(texts, vec![&b"left"[..], b"right", b"low"]);
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let mut runs = vec![make_run("one", 10.0, 500.0, 12.0), make_run("two", 10.0, 500.0, 12.0)];
        sort_runs(&mut runs);
        assert_eq!(runs[0].text, b"one");
    }

    #[test]
    fn test_fit_columns_non_decreasing_within_row() {
        let mut runs = vec![
            make_run("c", 200.0, 700.0, 12.0),
            make_run("a", 10.0, 700.0, 12.0),
            make_run("b", 120.0, 700.0, 12.0),
            make_run("next", 10.0, 680.0, 12.0),
        ];
        let mut grid = Grid::for_page(612.0, 792.0, &PageRuns::default());
        normalize(&mut runs, &mut grid);
        sort_runs(&mut runs);
        fit(&mut runs, &grid);
        assert_ne!(runs[0].line, 0);
        assert_eq!((runs[1].line, runs[2].line), (0, 0));
        assert!(runs[0].column <= runs[1].column && runs[1].column <= runs[2].column);
        assert_eq!(runs[3].line, (20.0 * grid.ys).round() as i64);
    }

    #[test]
    fn test_calc_lines_drops_whitespace_rows() {
        let mut runs = vec![
            make_run("text", 10.0, 700.0, 12.0),
            make_run("   ", 10.0, 680.0, 12.0),
            make_run("more", 10.0, 660.0, 12.0),
        ];
        let grid = Grid::for_page(612.0, 792.0, &PageRuns::default());
        fit(&mut runs, &grid);
        calc_lines(&mut runs);
        assert!(runs[0].is_visible());
        assert!(!runs[1].is_visible());
        assert!(runs[2].is_visible());
    }
}
