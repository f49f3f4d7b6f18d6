//! Whole-document conversion: header checks, unlocking, discovery, the page
//! loop and the document-level framing around each page.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{debug, info, instrument, warn};

use crate::discovery::FontDiscovery;
use crate::error::{ConvertError, Result};
use crate::font::FontTable;
use crate::layout::RTF_LINE_SPACING;
use crate::options::{ConvertOptions, OutputFormat};
use crate::page::{DocumentTables, RenderedPage, render_page};
use crate::provider::DocumentProvider;
use crate::tree::{TreeFlavor, TreeWriter};

/// Newest container version the converter accepts.
const MAX_VERSION: (u32, u32) = (1, 7);

/// Pages converted in restricted mode.
const RESTRICTED_PAGES: usize = 3;

/// Password attempts before giving up on an encrypted document.
const MAX_PASSWORD_ATTEMPTS: usize = 3;

const PAGE_BREAK: &str = "------------------------------[PAGE BREAK]------------------------------";
const WATERMARK_RULE: &str = "=====================================";
const WATERMARK_LIMITED: &str = " Conversion limited to three pages.";
const WATERMARK_THANKS: &str = "   Thank you for trying Trapeze!";

/// Asked for a password when an encrypted document cannot be opened;
/// `None` means the user declined.
pub type PasswordPrompt = Box<dyn FnMut() -> Option<String> + Send>;

/// Reject input that is not a PDF or is newer than the supported version.
pub fn check_header(data: &[u8]) -> Result<()> {
    let Some(rest) = data.strip_prefix(b"%PDF") else {
        return Err(ConvertError::Format);
    };
    let Some(version) = rest.strip_prefix(b"-") else {
        return Ok(());
    };
    let text: String = version
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .map(|&b| b as char)
        .collect();
    let mut parts = text.split('.').map(|p| p.parse::<u32>());
    if let (Some(Ok(major)), Some(Ok(minor))) = (parts.next(), parts.next()) {
        if (major, minor) > MAX_VERSION {
            return Err(ConvertError::UnsupportedVersion(text));
        }
    }
    Ok(())
}

/// Page counter readable while a conversion runs.
#[derive(Debug, Default)]
pub struct Progress {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl Progress {
    pub fn get(&self) -> (usize, usize) {
        (self.current.load(Ordering::Relaxed), self.max.load(Ordering::Relaxed))
    }

    fn start(&self, max: usize) {
        self.current.store(0, Ordering::Relaxed);
        self.max.store(max, Ordering::Relaxed);
    }

    fn advance(&self, page: usize) {
        self.current.store(page, Ordering::Relaxed);
    }
}

/// Converted output split into its document-level pieces.
#[derive(Debug, Clone, Default)]
pub struct ConvertedDocument {
    pub header: Vec<u8>,
    /// Each entry holds a page's text plus the framing written around it.
    pub pages: Vec<Vec<u8>>,
    pub footer: Vec<u8>,
}

impl ConvertedDocument {
    pub fn len(&self) -> usize {
        self.header.len() + self.pages.iter().map(Vec::len).sum::<usize>() + self.footer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.try_reserve_exact(self.len())?;
        out.extend_from_slice(&self.header);
        for page in &self.pages {
            out.extend_from_slice(page);
        }
        out.extend_from_slice(&self.footer);
        Ok(out)
    }
}

/// One document conversion with its options, abort flag and progress.
pub struct ConversionSession {
    options: ConvertOptions,
    abort: Arc<AtomicBool>,
    progress: Arc<Progress>,
    password_prompt: Option<PasswordPrompt>,
}

impl ConversionSession {
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            abort: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(Progress::default()),
            password_prompt: None,
        }
    }

    pub fn with_password_prompt(mut self, prompt: PasswordPrompt) -> Self {
        self.password_prompt = Some(prompt);
        self
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Setting the returned flag stops the conversion after the current page.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn progress_handle(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Pages done and pages planned.
    pub fn progress(&self) -> (usize, usize) {
        self.progress.get()
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Convert the whole document into one buffer.
    pub fn convert(&mut self, provider: &mut dyn DocumentProvider) -> Result<Vec<u8>> {
        self.render_document(provider)?.into_bytes()
    }

    #[instrument(skip_all, fields(format = ?self.options.format))]
    pub fn render_document(&mut self, provider: &mut dyn DocumentProvider) -> Result<ConvertedDocument> {
        check_header(provider.header())?;
        self.unlock(provider)?;

        let page_count = provider.page_count();
        if page_count == 0 {
            return Err(ConvertError::NoPages);
        }
        let provider: &dyn DocumentProvider = &*provider;
        if self.options.format.is_tree() {
            let (first, last) = self.options.page_range(page_count)?;
            return self.render_tree(provider, first, last);
        }

        // the requested range is ignored, not validated, in restricted mode
        let (first, last) = if self.options.restricted {
            (1, page_count.min(RESTRICTED_PAGES))
        } else {
            self.options.page_range(page_count)?
        };
        self.progress.start(last + 1 - first);
        info!(pages = page_count, first, last, "converting document");

        let mut tables = DocumentTables::new(&self.options);
        FontDiscovery::new(provider, self.options.format, &self.abort).run(&mut tables.fonts, &mut tables.encoders)?;
        if self.aborted() {
            return Err(ConvertError::UserAbort);
        }

        let mut doc = ConvertedDocument {
            header: self.document_header(&tables.fonts),
            ..Default::default()
        };
        let mut text_bytes = 0;
        for number in first..=last {
            if self.aborted() {
                break;
            }
            let rendered = render_page(provider, number, &mut tables, &self.options)?;
            self.progress.advance(number + 1 - first);
            if rendered.data.is_empty() {
                warn!(page = number, "no usable text on page");
            }
            let is_last = number == last;
            let (mut bytes, len) = self.frame_page(rendered, number, is_last, tables.fonts.len())?;
            text_bytes += len;
            if is_last && self.options.restricted {
                let watermark = self.watermark(page_count, tables.fonts.len());
                bytes.try_reserve(watermark.len())?;
                bytes.extend_from_slice(&watermark);
            }
            doc.pages.push(bytes);
        }
        doc.footer = self.document_footer();

        if self.aborted() {
            return Err(ConvertError::UserAbort);
        }
        if text_bytes == 0 {
            return Err(ConvertError::NoText);
        }
        debug!(pages = doc.pages.len(), bytes = doc.len(), "document converted");
        Ok(doc)
    }

    fn unlock(&mut self, provider: &mut dyn DocumentProvider) -> Result<()> {
        if !provider.is_encrypted() || provider.is_unlocked() {
            return Ok(());
        }
        let prompt = match self.password_prompt.as_mut() {
            Some(prompt) if self.options.prompt_for_password => prompt,
            _ => return Err(ConvertError::DecryptRequired),
        };
        for attempt in 1..=MAX_PASSWORD_ATTEMPTS {
            let Some(password) = prompt() else {
                return Err(ConvertError::DecryptDeclined);
            };
            if provider.unlock(&password) {
                debug!(attempt, "document unlocked");
                return Ok(());
            }
            warn!(attempt, "wrong password");
        }
        Err(ConvertError::DecryptDeclined)
    }

    fn render_tree(&self, provider: &dyn DocumentProvider, first: usize, last: usize) -> Result<ConvertedDocument> {
        let flavor = match self.options.format {
            OutputFormat::PropertyList => TreeFlavor::PropertyList,
            _ => TreeFlavor::Xml,
        };
        self.progress.start(last + 1 - first);
        let tree = TreeWriter::new(provider, flavor).transcribe(first, last, &self.abort)?;
        self.progress.advance(last + 1 - first);
        Ok(ConvertedDocument {
            pages: vec![tree],
            ..Default::default()
        })
    }

    fn newline(&self) -> &'static str {
        self.options.newline.as_str()
    }

    fn document_header(&self, fonts: &FontTable) -> Vec<u8> {
        let opts = &self.options;
        let mut out = String::new();
        if opts.format.is_markup() {
            out.push_str("{\\rtf1\\mac\\ansicpg10000\n");
            if !opts.pad_strip {
                out.push_str("\\viewkind1\\viewscale100\\viewzk2\n");
            }
            if !fonts.is_empty() {
                out.push_str("{\\fonttbl");
                for font in fonts.iter() {
                    out.push_str(&format!(
                        "\\f{}\\f{}\\fcharset77 {};",
                        font.index,
                        font.family.rtf_keyword(),
                        font.base_font
                    ));
                }
                out.push_str(&format!("\\f{}\\fmodern\\fcharset77 Courier;}}", fonts.len()));
            }
        } else if opts.format == OutputFormat::Html {
            let nl = self.newline();
            let title = opts.title.as_deref().unwrap_or("Untitled");
            out.push_str(&format!("<html>{nl}<head>{nl}"));
            out.push_str(&format!(
                "\t<meta http-equiv=\"content-type\" content=\"text/html; charset=iso-8859-1\">{nl}"
            ));
            out.push_str(&format!("\t<meta name=\"GENERATOR\" content=\"Trapeze\">{nl}"));
            out.push_str(&format!("\t<title>{}</title>{nl}</head>{nl}", html_escape::encode_text(title)));
        }
        out.into_bytes()
    }

    fn document_footer(&self) -> Vec<u8> {
        if self.options.format.is_markup() {
            b"\n}\n".to_vec()
        } else if self.options.format == OutputFormat::Html {
            format!("</html>{}", self.newline()).into_bytes()
        } else {
            Vec::new()
        }
    }

    /// Wrap a rendered page in its per-page framing. Also returns the
    /// number of text bytes the page contributed.
    fn frame_page(&self, page: RenderedPage, number: usize, is_last: bool, font_count: usize) -> Result<(Vec<u8>, usize)> {
        let opts = &self.options;
        let format = opts.format;
        let markup = format.is_markup();
        let nl = self.newline();
        let mut out = String::new();

        if markup {
            let spacing = (12.0 * 20.0 * RTF_LINE_SPACING).round() as i64;
            out.push_str(&format!("\\plain\\pard\\li0\\sl{spacing}\n"));
        } else if format == OutputFormat::Html {
            out.push_str(&format!("{nl}<a name=\"page_{number}\"></a>{nl}"));
        }

        let indent = if format == OutputFormat::Html && !opts.pad_strip { page.html_indent } else { 0 };
        match format {
            OutputFormat::RtfWord => {
                if opts.pad_strip {
                    out.push_str("\\margl0\\margr0\\margt0\\margb0\n");
                } else {
                    if page.margins.left != 0 {
                        out.push_str(&format!("\\marglsxn{}\\margrsxn0\n", 20 * page.margins.left));
                    }
                    if page.margins.top != 0 {
                        out.push_str(&format!("\\margtsxn{}\\margbsxn0\n", 20 * page.margins.top));
                    }
                }
                if page.width != 0 && page.height != 0 {
                    out.push_str(&format!("\\pgwsxn{}\\pghsxn{}\n", 20 * page.width, 20 * page.height));
                }
            }
            OutputFormat::Rtf if !opts.pad_strip => out.push_str("\\margl0\\margr0\\margt0\\margb0\n"),
            OutputFormat::Html if indent != 0 => out.push_str(&format!("{nl}<blockquote width={indent}>{nl}")),
            _ => {}
        }
        if markup && !page.tabs.is_empty() {
            out.push_str(&page.tabs);
            out.push('\n');
        }

        let mut data = page.data;
        if !markup && is_last && !opts.pad_strip {
            let nl = nl.as_bytes();
            while data.len() > nl.len() && data.ends_with(nl) && data[..data.len() - nl.len()].ends_with(nl) {
                data.truncate(data.len() - nl.len());
            }
        }
        let text_len = data.len();

        let mut tail = String::new();
        if indent != 0 {
            tail.push_str(&format!("{nl}</blockquote>{nl}"));
        }
        if !is_last {
            if !markup && opts.pad_strip {
                tail.push_str(nl);
            }
            match format {
                OutputFormat::RtfWord if !opts.pad_strip => tail.push_str("\\sect\n"),
                OutputFormat::Rtf if !opts.pad_strip => tail.push_str("\\page\n"),
                _ if opts.show_breaks => {
                    if markup {
                        tail.push_str(&format!("\\plain\\li0\\f{font_count} {PAGE_BREAK}\\\n"));
                    } else if format == OutputFormat::Html {
                        tail.push_str(&format!("{nl}<pre>{nl}{PAGE_BREAK}{nl}</pre>{nl}"));
                    } else {
                        tail.push_str(&format!("{PAGE_BREAK}{nl}"));
                    }
                }
                _ => {}
            }
        }

        let mut bytes = Vec::new();
        bytes.try_reserve_exact(out.len() + data.len() + tail.len())?;
        bytes.extend_from_slice(out.as_bytes());
        bytes.extend_from_slice(&data);
        bytes.extend_from_slice(tail.as_bytes());
        Ok((bytes, text_len))
    }

    /// Footer appended after the last page in restricted mode.
    fn watermark(&self, page_count: usize, font_count: usize) -> Vec<u8> {
        let format = self.options.format;
        let nl = self.newline();
        let mut out = String::new();
        if format.is_markup() {
            out.push_str(&format!("\\plain\\li0\\f{font_count} \\\n{WATERMARK_RULE}\\\n"));
            if page_count > RESTRICTED_PAGES {
                out.push_str(&format!("\\plain\\f{font_count} {WATERMARK_LIMITED}\\\n"));
            }
            out.push_str(&format!("\\plain\\f{font_count} {WATERMARK_THANKS}\\\n"));
            out.push_str(&format!("\\plain\\f{font_count} {WATERMARK_RULE}\\\n"));
        } else {
            let html = format == OutputFormat::Html;
            if html {
                out.push_str(&format!("{nl}<pre>{nl}"));
            }
            out.push_str(&format!("{nl}{WATERMARK_RULE}{nl}"));
            if page_count > RESTRICTED_PAGES {
                out.push_str(&format!("{WATERMARK_LIMITED}{nl}"));
            }
            out.push_str(&format!("{WATERMARK_THANKS}{nl}{WATERMARK_RULE}{nl}"));
            if html {
                out.push_str(&format!("</pre>{nl}"));
            }
        }
        out.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Newline;
    use crate::provider::MemoryDocument;
    use crate::types::{PdfDict, PdfObject};

    fn helvetica() -> PdfDict {
        let mut d = PdfDict::new();
        d.insert("Type".into(), PdfObject::Name("Font".into()));
        d.insert("BaseFont".into(), PdfObject::Name("Helvetica".into()));
        d
    }

    fn doc_with_pages(n: usize) -> MemoryDocument {
        let mut doc = MemoryDocument::new();
        doc.add_font("F1", helvetica());
        for i in 1..=n {
            let content = format!("BT /F1 12 Tf 72 700 Td (Page {i}) Tj ET");
            doc.add_page(612.0, 792.0, content.as_bytes());
        }
        doc
    }

    fn convert(doc: &mut MemoryDocument, opts: ConvertOptions) -> Result<String> {
        let mut session = ConversionSession::new(opts);
        session.convert(doc).map(|b| String::from_utf8_lossy(&b).into_owned())
    }

    fn stripped(format: OutputFormat) -> ConvertOptions {
        let mut opts = ConvertOptions::with_format(format);
        opts.pad_strip = true;
        opts
    }

    #[test]
    fn test_check_header() {
        assert!(check_header(b"%PDF-1.4\n").is_ok());
        assert!(check_header(b"%PDF-1.7\n").is_ok());
        assert!(matches!(check_header(b"%!PS-Adobe"), Err(ConvertError::Format)));
        assert!(matches!(check_header(b""), Err(ConvertError::Format)));
        match check_header(b"%PDF-2.0\n") {
            Err(ConvertError::UnsupportedVersion(v)) => assert_eq!(v, "2.0"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_format_error_from_provider_header() {
        let mut doc = doc_with_pages(1).with_header(b"GIF89a");
        assert!(matches!(convert(&mut doc, ConvertOptions::default()), Err(ConvertError::Format)));
    }

    #[test]
    fn test_no_pages() {
        let mut doc = MemoryDocument::new();
        assert!(matches!(convert(&mut doc, ConvertOptions::default()), Err(ConvertError::NoPages)));
    }

    #[test]
    fn test_no_text() {
        let mut doc = MemoryDocument::new();
        doc.add_page(612.0, 792.0, b"0 0 m 100 100 l S");
        assert!(matches!(convert(&mut doc, ConvertOptions::default()), Err(ConvertError::NoText)));
    }

    #[test]
    fn test_plain_text_pages_joined() {
        let mut doc = doc_with_pages(2);
        let text = convert(&mut doc, stripped(OutputFormat::PlainText)).unwrap();
        assert_eq!(text, "Page 1\nPage 2");
    }

    #[test]
    fn test_show_breaks_between_pages() {
        let mut doc = doc_with_pages(2);
        let mut opts = stripped(OutputFormat::PlainText);
        opts.show_breaks = true;
        let text = convert(&mut doc, opts).unwrap();
        assert_eq!(text, format!("Page 1\n{PAGE_BREAK}\nPage 2"));
    }

    #[test]
    fn test_encrypted_without_prompt() {
        let mut doc = doc_with_pages(1).with_password("pw");
        assert!(matches!(convert(&mut doc, ConvertOptions::default()), Err(ConvertError::DecryptRequired)));
    }

    #[test]
    fn test_encrypted_prompt_declined_and_accepted() {
        let mut opts = stripped(OutputFormat::PlainText);
        opts.prompt_for_password = true;

        let mut doc = doc_with_pages(1).with_password("pw");
        let mut session = ConversionSession::new(opts.clone()).with_password_prompt(Box::new(|| None));
        assert!(matches!(session.convert(&mut doc), Err(ConvertError::DecryptDeclined)));

        let mut doc = doc_with_pages(1).with_password("pw");
        let mut session = ConversionSession::new(opts).with_password_prompt(Box::new(|| Some("pw".to_string())));
        assert_eq!(session.convert(&mut doc).unwrap(), b"Page 1");
    }

    #[test]
    fn test_abort_before_first_page() {
        let mut doc = doc_with_pages(2);
        let mut session = ConversionSession::new(ConvertOptions::default());
        session.abort_handle().store(true, Ordering::Relaxed);
        assert!(matches!(session.convert(&mut doc), Err(ConvertError::UserAbort)));
    }

    #[test]
    fn test_progress_reaches_max() {
        let mut doc = doc_with_pages(4);
        let mut opts = ConvertOptions::default();
        opts.first_page = Some(2);
        let mut session = ConversionSession::new(opts);
        assert_eq!(session.progress(), (0, 0));
        session.convert(&mut doc).unwrap();
        assert_eq!(session.progress(), (3, 3));
    }

    #[test]
    fn test_restricted_watermark_text() {
        let mut doc = doc_with_pages(5);
        let mut opts = stripped(OutputFormat::PlainText);
        opts.restricted = true;
        let text = convert(&mut doc, opts).unwrap();
        assert!(text.starts_with("Page 1\nPage 2\nPage 3\n===="));
        assert!(!text.contains("Page 4"));
        assert!(text.contains(WATERMARK_LIMITED));
        assert!(text.ends_with(&format!("{WATERMARK_THANKS}\n{WATERMARK_RULE}\n")));
    }

    #[test]
    fn test_restricted_short_document_omits_limit_line() {
        let mut doc = doc_with_pages(2);
        let mut opts = stripped(OutputFormat::PlainText);
        opts.restricted = true;
        let text = convert(&mut doc, opts).unwrap();
        assert!(text.contains(WATERMARK_THANKS));
        assert!(!text.contains(WATERMARK_LIMITED));
    }

    #[test]
    fn test_restricted_ignores_requested_range() {
        let mut doc = doc_with_pages(2);
        let mut opts = stripped(OutputFormat::PlainText);
        opts.restricted = true;
        opts.first_page = Some(5);
        opts.last_page = Some(9);
        let text = convert(&mut doc, opts).unwrap();
        assert!(text.starts_with("Page 1\nPage 2\n"));
        assert!(text.contains(WATERMARK_THANKS));
    }

    #[test]
    fn test_rtf_document_frame() {
        let mut doc = doc_with_pages(2);
        let text = convert(&mut doc, ConvertOptions::with_format(OutputFormat::Rtf)).unwrap();
        assert!(text.starts_with(
            "{\\rtf1\\mac\\ansicpg10000\n\\viewkind1\\viewscale100\\viewzk2\n{\\fonttbl\\f0\\fswiss\\fcharset77 Helvetica;\\f1\\fmodern\\fcharset77 Courier;}"
        ));
        assert_eq!(text.matches("\\plain\\pard\\li0\\sl276\n").count(), 2);
        assert_eq!(text.matches("\\page\n").count(), 1);
        assert!(text.ends_with("\n}\n"));
    }

    #[test]
    fn test_rtf_word_sections() {
        let mut doc = doc_with_pages(2);
        let text = convert(&mut doc, ConvertOptions::with_format(OutputFormat::RtfWord)).unwrap();
        assert_eq!(text.matches("\\sect\n").count(), 1);
        assert_eq!(text.matches("\\pgwsxn12240\\pghsxn15840\n").count(), 2);
    }

    #[test]
    fn test_html_frame_uses_newline_convention() {
        let mut doc = doc_with_pages(1);
        let mut opts = stripped(OutputFormat::Html);
        opts.newline = Newline::Dos;
        opts.title = Some("Q&A".into());
        let text = convert(&mut doc, opts).unwrap();
        assert!(text.starts_with("<html>\r\n<head>\r\n"));
        assert!(text.contains("<title>Q&amp;A</title>\r\n</head>\r\n"));
        assert!(text.contains("\r\n<a name=\"page_1\"></a>\r\n"));
        assert!(text.ends_with("</html>\r\n"));
    }

    #[test]
    fn test_xml_format_routes_to_tree() {
        let mut doc = doc_with_pages(2);
        let text = convert(&mut doc, ConvertOptions::with_format(OutputFormat::Xml)).unwrap();
        assert!(text.starts_with("<?xml"));
        assert_eq!(text.matches("<dictionary key=\"Page\">").count(), 2);
    }

    #[test]
    fn test_converted_document_pieces() {
        let mut doc = doc_with_pages(2);
        let mut session = ConversionSession::new(stripped(OutputFormat::Html));
        let converted = session.render_document(&mut doc).unwrap();
        assert_eq!(converted.pages.len(), 2);
        assert!(!converted.header.is_empty());
        let len = converted.len();
        assert_eq!(converted.into_bytes().unwrap().len(), len);
    }
}
