//! Finishing a serialized page for its output format.

pub mod clean;
pub mod html;
pub mod newline;
pub mod rewrap;
pub mod rtf;
pub mod tags;

pub use clean::{clean, strip};
pub use html::page_to_html;
pub use newline::fix_newlines;
pub use rewrap::rewrap;
pub use rtf::{Margins, page_to_rtf};
pub use tags::{OpenTags, html_tags, rtf_tags};
