pub mod content;
pub mod discovery;
pub mod error;
pub mod font;
pub mod format;
pub mod layout;
pub mod options;
pub mod page;
pub mod provider;
pub mod session;
pub mod tree;
pub mod types;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::{ConvertError, Result};
pub use options::{ConvertOptions, Newline, OutputFormat};
pub use page::{RenderedPage, render_page};
pub use provider::{DocumentProvider, LopdfDocument, MemoryDocument, Page, Rect};
pub use session::{ConversionSession, ConvertedDocument, PasswordPrompt, Progress, check_header};
pub use types::{ObjRef, PdfDict, PdfObject};
