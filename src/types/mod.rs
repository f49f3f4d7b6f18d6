pub mod object;

pub use object::{ObjRef, PdfDict, PdfObject, rect_from_array};
