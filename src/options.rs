//! Conversion settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};
use crate::font::TextEncoding;

/// Output flavor of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// 7-bit text.
    Ascii,
    /// Text in the Mac Roman character set.
    #[default]
    PlainText,
    /// Page dictionaries transcribed as XML.
    Xml,
    /// Page dictionaries transcribed as an Apple property list.
    PropertyList,
    Html,
    Rtf,
    /// RTF tuned for word processors: real page margins, sections per page.
    RtfWord,
}

impl OutputFormat {
    /// RTF flavors, which carry tab stops and escaped braces.
    pub fn is_markup(self) -> bool {
        matches!(self, OutputFormat::Rtf | OutputFormat::RtfWord)
    }

    pub fn is_tree(self) -> bool {
        matches!(self, OutputFormat::Xml | OutputFormat::PropertyList)
    }

    /// Targets that show cleaned-up font names to a reader.
    pub fn simplifies_font_names(self) -> bool {
        matches!(self, OutputFormat::RtfWord | OutputFormat::Html)
    }

    pub fn encoding(self) -> TextEncoding {
        match self {
            OutputFormat::Ascii => TextEncoding::Ascii,
            OutputFormat::Html => TextEncoding::WinAnsi,
            _ => TextEncoding::MacRoman,
        }
    }
}

/// Line-ending convention of text and HTML output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Newline {
    #[default]
    Unix,
    Mac,
    Dos,
}

impl Newline {
    pub fn as_str(self) -> &'static str {
        match self {
            Newline::Unix => "\n",
            Newline::Mac => "\r",
            Newline::Dos => "\r\n",
        }
    }

    pub fn as_bytes(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub format: OutputFormat,
    pub newline: Newline,
    /// Pad runs to their grid column.
    pub pad_columns: bool,
    /// Keep vertical gaps as blank lines.
    pub pad_lines: bool,
    /// Squeeze page whitespace instead of preserving the layout.
    pub pad_strip: bool,
    /// Join wrapped lines back into paragraphs.
    pub rewrap: bool,
    pub relaxed_spacing: bool,
    pub tight_spacing: bool,
    /// Reorder runs by position; off keeps content-stream order.
    pub sort: bool,
    pub font_changes: bool,
    pub size_changes: bool,
    pub style_changes: bool,
    pub super_sub_changes: bool,
    pub show_breaks: bool,
    /// Demo policy: three pages and a watermark.
    pub restricted: bool,
    pub prompt_for_password: bool,
    pub title: Option<String>,
    pub first_page: Option<usize>,
    pub last_page: Option<usize>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::PlainText,
            newline: Newline::Unix,
            pad_columns: true,
            pad_lines: true,
            pad_strip: false,
            rewrap: false,
            relaxed_spacing: false,
            tight_spacing: false,
            sort: true,
            font_changes: true,
            size_changes: true,
            style_changes: true,
            super_sub_changes: true,
            show_breaks: false,
            restricted: false,
            prompt_for_password: false,
            title: None,
            first_page: None,
            last_page: None,
        }
    }
}

impl ConvertOptions {
    pub fn with_format(format: OutputFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Load options from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| ConvertError::Config(err.to_string()))
    }

    pub fn output_encoding(&self) -> TextEncoding {
        self.format.encoding()
    }

    /// 1-based inclusive page range clamped to `page_count`.
    pub fn page_range(&self, page_count: usize) -> Result<(usize, usize)> {
        let first = self.first_page.unwrap_or(1);
        let last = self.last_page.unwrap_or(page_count).min(page_count);
        if first == 0 || first > page_count {
            return Err(ConvertError::BadPage(first));
        }
        if last < first {
            return Err(ConvertError::BadPage(last));
        }
        Ok((first, last))
    }
}
