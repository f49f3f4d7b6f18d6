use std::fmt::Write as _;

/// Page-scoped set of grid columns that markup output reaches with tabs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabStops {
    stops: Vec<i64>,
}

impl TabStops {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a column; duplicates are ignored.
    pub fn add(&mut self, column: i64) {
        if !self.stops.contains(&column) {
            self.stops.push(column);
        }
    }

    pub fn sort(&mut self) {
        self.stops.sort_unstable();
    }

    pub fn contains(&self, column: i64) -> bool {
        self.stops.contains(&column)
    }

    pub fn index_of(&self, column: i64) -> Option<usize> {
        self.stops.iter().position(|&c| c == column)
    }

    /// Number of stops in `(start, end]`.
    pub fn tabs_to_col(&self, start: i64, end: i64) -> usize {
        self.stops.iter().filter(|&&c| c > start && c <= end).count()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.stops
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// RTF `\tx` definitions in twips, shifted left by `left_margin` points.
    pub fn rtf_definitions(&self, xs: f64, left_margin: i64) -> String {
        let mut out = String::new();
        for &stop in &self.stops {
            let points = (stop as f64 / xs).round() as i64 - left_margin;
            let _ = write!(out, "\\tx{}", 20 * points);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_dedupes_and_sorts() {
        let mut tabs = TabStops::new();
        tabs.add(40);
        tabs.add(20);
        tabs.add(40);
        tabs.sort();
        assert_eq!(tabs.as_slice(), &[20, 40]);
        assert_eq!(tabs.index_of(40), Some(1));
        assert_eq!(tabs.index_of(30), None);
    }

    #[test]
    fn test_tabs_to_col_is_half_open() {
        let mut tabs = TabStops::new();
        for c in [10, 20, 30] {
            tabs.add(c);
        }
        assert_eq!(tabs.tabs_to_col(0, 20), 2);
        assert_eq!(tabs.tabs_to_col(10, 30), 2);
        assert_eq!(tabs.tabs_to_col(30, 40), 0);
    }

    #[test]
    fn test_rtf_definitions() {
        let mut tabs = TabStops::new();
        tabs.add(20);
        tabs.add(40);
        let xs = 102.0 / 612.0;
        assert_eq!(tabs.rtf_definitions(xs, 0), "\\tx2400\\tx4800");
        assert_eq!(tabs.rtf_definitions(xs, 36), "\\tx1680\\tx4080");
        assert_eq!(TabStops::new().rtf_definitions(xs, 0), "");
    }
}
