//! Document walks that run once before rendering: the font catalog walk and
//! the per-page lookup of content streams and form XObjects.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, instrument, trace, warn};

use crate::content::XObjectTable;
use crate::error::{ConvertError, Result};
use crate::font::glyphs::{glyph_to_char, numbered_glyph_code};
use crate::font::{EncoderTable, FontSpec, FontTable, TextEncoding, UnicodeTable, parse_tounicode_cmap, try_table};
use crate::options::OutputFormat;
use crate::provider::{DocumentProvider, Page};
use crate::types::{ObjRef, PdfDict, PdfObject};

/// Catalog walk collecting every font dictionary reachable from the page
/// tree. Each indirect object is visited at most once.
pub struct FontDiscovery<'a> {
    provider: &'a dyn DocumentProvider,
    format: OutputFormat,
    abort: &'a AtomicBool,
    visited: HashSet<ObjRef>,
}

impl<'a> FontDiscovery<'a> {
    pub fn new(provider: &'a dyn DocumentProvider, format: OutputFormat, abort: &'a AtomicBool) -> Self {
        Self {
            provider,
            format,
            abort,
            visited: HashSet::new(),
        }
    }

    #[instrument(skip_all)]
    pub fn run(&mut self, fonts: &mut FontTable, encoders: &mut EncoderTable) -> Result<()> {
        let catalog = self.provider.catalog()?;
        for (key, value) in &catalog {
            self.walk(key, value, fonts, encoders)?;
        }
        debug!(fonts = fonts.len(), encoders = encoders.len(), visited = self.visited.len(), "font discovery done");
        Ok(())
    }

    fn walk(&mut self, key: &str, value: &PdfObject, fonts: &mut FontTable, encoders: &mut EncoderTable) -> Result<()> {
        if self.abort.load(Ordering::Relaxed) {
            return Ok(());
        }

        let resolved;
        let obj = match value {
            PdfObject::Ref(id) => {
                if !self.visited.insert(*id) {
                    return Ok(());
                }
                resolved = self.provider.resolve(*id);
                match &resolved {
                    Some(obj) => obj,
                    None => return Ok(()),
                }
            }
            direct => direct,
        };

        match obj {
            PdfObject::Array(items) if key == "Kids" => {
                for item in items {
                    self.walk(key, item, fonts, encoders)?;
                }
            }
            PdfObject::Dict(dict) if key != "Parent" && key != "Annots" => {
                if dict.get("Type").and_then(PdfObject::as_name) == Some("Font") {
                    self.extract_font(key, dict, fonts, encoders)?;
                }
                for (k, v) in dict {
                    self.walk(k, v, fonts, encoders)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn get(&self, dict: &PdfDict, key: &str) -> Option<PdfObject> {
        dict.get(key).and_then(|v| self.provider.deref(v))
    }

    fn extract_font(&self, key: &str, dict: &PdfDict, fonts: &mut FontTable, encoders: &mut EncoderTable) -> Result<()> {
        let Some(base_font) = self.get(dict, "BaseFont").and_then(|o| o.as_name().map(str::to_string)) else {
            trace!(%key, "font without BaseFont skipped");
            return Ok(());
        };

        let mut spec = FontSpec {
            key: key.to_string(),
            widths: self.widths(dict)?,
            ..Default::default()
        };

        let unicode = self
            .get(dict, "ToUnicode")
            .and_then(|s| s.as_stream().and_then(|(_, data)| parse_tounicode_cmap(data)));

        match self.get(dict, "Encoding") {
            Some(PdfObject::Name(name)) => spec.encoding = Some(name),
            Some(PdfObject::Stream { .. }) => {
                // CMap-encoded fonts: codes are passed through unmapped
                spec.base_font = base_font;
                fonts.add(spec, self.format, encoders);
                return Ok(());
            }
            Some(PdfObject::Dict(enc)) => self.apply_encoding_dict(&base_font, &enc, &mut spec)?,
            _ => {}
        }

        if let Some(unicode) = unicode {
            let source = TextEncoding::from_pdf_name(spec.encoding.as_deref());
            spec.fallback = fold_unicode(source, unicode, &mut spec.remap)?;
        }

        spec.base_font = base_font;
        fonts.add(spec, self.format, encoders);
        Ok(())
    }

    fn widths(&self, dict: &PdfDict) -> Result<Option<Box<[f64; 256]>>> {
        let Some(PdfObject::Array(items)) = self.get(dict, "Widths") else {
            return Ok(None);
        };
        if items.is_empty() {
            return Ok(None);
        }
        let first = self.get(dict, "FirstChar").and_then(|o| o.as_int()).unwrap_or(0).max(0) as usize;
        let mut widths = try_table::<f64>().ok_or(ConvertError::OutOfMemory)?;
        for (i, item) in items.iter().enumerate() {
            let Some(slot) = widths.get_mut(first + i) else {
                break;
            };
            if let Some(w) = self.provider.deref(item).and_then(|o| o.as_real()) {
                *slot = w;
            }
        }
        Ok(Some(widths))
    }

    /// `Encoding` given as a dictionary: a base encoding plus `Differences`.
    fn apply_encoding_dict(&self, base_font: &str, enc: &PdfDict, spec: &mut FontSpec) -> Result<()> {
        let symbol = base_font.contains("Symbol");
        let dingbat = !symbol && base_font.contains("Dingbat");
        let windows = !symbol
            && !dingbat
            && self.get(enc, "BaseEncoding").and_then(|o| o.as_name().map(|n| n == "WinAnsiEncoding")) == Some(true);

        let mut custom = if symbol {
            TextEncoding::MacSymbol
        } else if dingbat {
            TextEncoding::MacDingbats
        } else if windows {
            TextEncoding::WinAnsi
        } else {
            TextEncoding::MacRoman
        };

        if let Some(PdfObject::Array(diffs)) = self.get(enc, "Differences") {
            // names convert into the final source encoding; ligatures force WinAnsi
            let ligatures = diffs
                .iter()
                .any(|d| matches!(self.provider.deref(d), Some(PdfObject::Name(n)) if n == "fi" || n == "fl"));
            let converter = if ligatures {
                TextEncoding::WinAnsi
            } else if symbol {
                TextEncoding::MacSymbol
            } else if windows {
                TextEncoding::WinAnsi
            } else {
                TextEncoding::MacRoman
            };

            let mut map = try_table::<u8>().ok_or(ConvertError::OutOfMemory)?;
            for (i, slot) in map.iter_mut().enumerate() {
                *slot = i as u8;
            }

            let mut offset = 0usize;
            let mut adobe = false;
            for entry in &diffs {
                match self.provider.deref(entry) {
                    Some(PdfObject::Int(n)) => offset = n.clamp(0, 256) as usize,
                    Some(PdfObject::Name(name)) => {
                        if offset < 256 {
                            let code = offset as u8;
                            if name == "fi" {
                                spec.fi = code;
                            } else if name == "fl" {
                                spec.fl = code;
                            } else if let Some(c) = glyph_to_char(&name).and_then(|ch| converter.encode(ch)).filter(|c| *c != 0) {
                                map[offset] = c;
                            } else if let Some(c) = numbered_glyph_code(&name) {
                                map[offset] = c;
                                adobe = true;
                            }
                        }
                        offset += 1;
                    }
                    _ => {}
                }
            }
            spec.remap = Some(map);

            if spec.fi != 0 || spec.fl != 0 {
                custom = TextEncoding::WinAnsi;
            } else if adobe {
                custom = TextEncoding::MacRoman;
            }
        }

        spec.encoding = Some(custom.pdf_name().to_string());
        Ok(())
    }
}

/// Move every code point the source encoding can represent into the byte
/// remap; the rest stay as the font's Unicode fallback.
fn fold_unicode(
    source: TextEncoding,
    mut unicode: UnicodeTable,
    remap: &mut Option<Box<[u8; 256]>>,
) -> Result<Option<UnicodeTable>> {
    for code in 0..256 {
        let u = unicode[code];
        if u == 0 {
            continue;
        }
        let Some(byte) = char::from_u32(u).and_then(|ch| source.encode(ch)) else {
            continue;
        };
        let map = match remap {
            Some(map) => map,
            None => {
                let mut map = try_table::<u8>().ok_or(ConvertError::OutOfMemory)?;
                for (i, slot) in map.iter_mut().enumerate() {
                    *slot = i as u8;
                }
                remap.insert(map)
            }
        };
        map[code] = byte;
        unicode[code] = 0;
    }
    Ok(unicode.iter().any(|&u| u != 0).then_some(unicode))
}

/// Register the page's form XObjects by resource name.
pub fn register_forms(provider: &dyn DocumentProvider, page: &Page, forms: &mut XObjectTable) {
    let Some(resources) = page.dict.get("Resources").and_then(|r| provider.deref(r)) else {
        return;
    };
    let Some(xobjects) = resources.as_dict().and_then(|r| r.get("XObject")).and_then(|x| provider.deref(x)) else {
        return;
    };
    let Some(xobjects) = xobjects.as_dict() else {
        return;
    };

    for (name, value) in xobjects {
        let Some(PdfObject::Stream { dict, data, raw }) = provider.deref(value) else {
            continue;
        };
        let is_form = name.starts_with("Fm") || dict.get("Subtype").and_then(PdfObject::as_name) == Some("Form");
        if !is_form {
            continue;
        }
        if raw {
            warn!(%name, "form stream not decoded, skipped");
            continue;
        }
        trace!(%name, bytes = data.len(), "form registered");
        forms.insert(name, data);
    }
}

/// The page's content streams, joined with newlines.
pub fn page_content(provider: &dyn DocumentProvider, page: &Page) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    let Some(contents) = page.dict.get("Contents").and_then(|c| provider.deref(c)) else {
        return Ok(content);
    };

    let mut append = |stream: &PdfObject| -> Result<()> {
        let Some((_, data)) = stream.as_stream() else {
            return Ok(());
        };
        if matches!(stream, PdfObject::Stream { raw: true, .. }) {
            warn!("content stream not decoded, skipped");
            return Ok(());
        }
        content.try_reserve(data.len() + 1)?;
        if !content.is_empty() {
            content.push(b'\n');
        }
        content.extend_from_slice(data);
        Ok(())
    };

    match &contents {
        PdfObject::Array(items) => {
            for item in items {
                if let Some(stream) = provider.deref(item) {
                    append(&stream)?;
                }
            }
        }
        stream => append(stream)?,
    }
    Ok(content)
}
