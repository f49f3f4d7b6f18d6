use crate::font::FontId;

/// One placed span of output bytes.
#[derive(Debug, Clone, Default)]
pub struct TextRun {
    pub x: f64,
    pub y: f64,
    /// Position after the run's advance, and its baseline before any
    /// superscript snapping.
    pub tx: f64,
    pub ty: f64,
    /// Effective font size.
    pub f: f64,
    pub text: Vec<u8>,
    /// Characters to account for on the grid, before markup padding.
    pub width: usize,
    pub font: Option<FontId>,
    pub pre: Option<Vec<u8>>,
    pub post: Option<Vec<u8>>,
    pub column: i64,
    pub line: i64,
    pub is_whitespace: bool,
}

impl TextRun {
    /// Dropped runs keep their slot but render nothing.
    pub fn is_visible(&self) -> bool {
        !self.text.is_empty()
    }

    pub fn drop_text(&mut self) {
        self.text.clear();
    }

    pub fn markup_len(&self) -> usize {
        self.pre.as_ref().map_or(0, Vec::len) + self.text.len() + self.post.as_ref().map_or(0, Vec::len)
    }
}

/// Page-scoped run list plus the statistics used to size the grid.
#[derive(Debug, Default)]
pub struct PageRuns {
    pub runs: Vec<TextRun>,
    pub length: usize,
    pub weight: i64,
    pub widths: usize,
}

impl PageRuns {
    pub fn push(&mut self, run: TextRun) {
        self.length += run.text.len();
        self.weight += (run.f * run.width as f64).round() as i64;
        self.widths += run.width;
        self.runs.push(run);
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }
}

#[cfg(test)]
pub(crate) fn make_run(text: &str, x: f64, y: f64, f: f64) -> TextRun {
    TextRun {
        x,
        y,
        tx: x + f * text.len() as f64 * 0.5,
        ty: y,
        f,
        text: text.as_bytes().to_vec(),
        width: text.len(),
        is_whitespace: text.bytes().all(|b| b.is_ascii_whitespace()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_runs_statistics() {
        let mut page = PageRuns::default();
        page.push(make_run("Hello", 0.0, 700.0, 12.0));
        page.push(make_run("ab", 0.0, 680.0, 10.0));
        assert_eq!(page.len(), 2);
        assert_eq!(page.length, 7);
        assert_eq!(page.weight, 60 + 20);
        assert_eq!(page.widths, 7);
    }

    #[test]
    fn test_drop_text() {
        let mut run = make_run("  ", 0.0, 0.0, 12.0);
        assert!(run.is_whitespace && run.is_visible());
        run.drop_text();
        assert!(!run.is_visible());
    }
}
