//! Fitting placed runs onto a character grid.
//!
//! A page goes through [`grid::normalize`], [`grid::sort_runs`], [`grid::fit`],
//! [`grid::calc_lines`] and [`whitespace::calc_whitespace`] in that order;
//! `column` and `line` on a run mean nothing before the sequence has run.

pub mod grid;
pub mod run;
pub mod serialize;
pub mod tabs;
pub mod whitespace;

pub use grid::Grid;
pub use run::{PageRuns, TextRun};
pub use serialize::serialize;
pub use tabs::TabStops;
pub use whitespace::{Spacing, calc_extra_tabs, calc_whitespace};

/// Line spacing RTF applies on top of the font size.
pub const RTF_LINE_SPACING: f64 = 1.15;
