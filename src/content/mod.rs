pub mod chunk;
pub mod interpreter;
pub mod lexer;

use indexmap::IndexMap;

use crate::font::{EncoderTable, FontTable};
use crate::options::OutputFormat;

pub use interpreter::Interpreter;
pub use lexer::{Lexer, StringByte, Token};

/// Most recent numeric operands kept for operators.
pub const MAX_OPERANDS: usize = 6;
/// Depth of the `q`/`Q` save stack and of nested form invocation.
pub const MAX_Q_DEPTH: usize = 8;
/// Tolerance for coordinate comparisons.
pub const EPS: f64 = 0.01;
/// Chunks longer than this are never treated as super/subscripts.
pub const MIN_SCRIPT_LENGTH: usize = 8;
/// Gaps narrower than this many columns are padded with spaces.
pub const MIN_MIDLINE_SPACING: i64 = 4;

pub fn fequal(a: f64, b: f64) -> bool {
    (a - b).abs() < EPS
}

/// C `isspace` over bytes.
pub fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0B | 0x0C | b'\r')
}

/// Named form streams invoked with `Do`, shared by every page of a document.
#[derive(Debug, Default)]
pub struct XObjectTable {
    forms: IndexMap<String, Vec<u8>>,
}

impl XObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a form's content. Pages commonly reuse names such as `Fm0`
    /// for different forms, so a later page's form replaces the earlier one.
    pub fn insert(&mut self, name: &str, data: Vec<u8>) {
        self.forms.insert(name.to_string(), data);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.forms.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

/// Document-scoped tables and settings the interpreter reads.
pub struct RenderContext<'a> {
    pub fonts: &'a FontTable,
    pub encoders: &'a EncoderTable,
    pub xobjects: &'a XObjectTable,
    pub format: OutputFormat,
    pub relaxed_spacing: bool,
}

/// Page extent used to clip runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    /// Crop box origin, when the crop box is in effect.
    pub crop_origin: Option<(f64, f64)>,
}

impl PageGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            crop_origin: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fequal() {
        assert!(fequal(1.0, 1.005));
        assert!(!fequal(1.0, 1.02));
    }

    #[test]
    fn test_xobject_table_replaces_by_name() {
        let mut table = XObjectTable::new();
        table.insert("Fm0", b"BT ET".to_vec());
        table.insert("Fm0", b"q Q".to_vec());
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("Fm0"), Some(&b"q Q"[..]));
        assert_eq!(table.get("Fm1"), None);
    }
}
