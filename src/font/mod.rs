pub mod cmap;
pub mod encoding;
pub mod glyphs;

use std::borrow::Cow;

use tracing::debug;

use crate::options::OutputFormat;
pub use cmap::{UnicodeTable, parse_tounicode_cmap};
pub use encoding::{Encoder, EncoderId, EncoderTable, TextEncoding};

/// Generic family a font name is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Roman,
    Swiss,
    Modern,
    Script,
    Decor,
    Tech,
    None,
}

impl Family {
    pub fn classify(name: &str) -> Self {
        let has = |needles: &[&str]| needles.iter().any(|n| name.contains(n));
        if has(&["Times", "Palatino"]) {
            Family::Roman
        } else if has(&["Helvetica", "Geneva", "Arial"]) {
            Family::Swiss
        } else if has(&["Courier", "Monaco"]) {
            Family::Modern
        } else if has(&["Cursive", "Script"]) {
            Family::Script
        } else if has(&["Chancery"]) {
            Family::Decor
        } else if has(&["Symbol", "Dingbats"]) {
            Family::Tech
        } else {
            Family::None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Family::Roman => "roman",
            Family::Swiss => "swiss",
            Family::Modern => "modern",
            Family::Script => "script",
            Family::Decor => "decor",
            Family::Tech => "tech",
            Family::None => "none",
        }
    }

    /// Keyword used in an RTF font table (`\fnil` for the default).
    pub fn rtf_keyword(self) -> &'static str {
        match self {
            Family::None => "nil",
            other => other.as_str(),
        }
    }
}

/// Raw font description gathered by discovery.
#[derive(Debug, Clone, Default)]
pub struct FontSpec {
    pub key: String,
    pub base_font: String,
    pub encoding: Option<String>,
    pub remap: Option<Box<[u8; 256]>>,
    pub fallback: Option<UnicodeTable>,
    pub widths: Option<Box<[f64; 256]>>,
    pub fi: u8,
    pub fl: u8,
}

/// A resolved font, owned by the document's [`FontTable`].
#[derive(Debug, Clone)]
pub struct Font {
    pub key: String,
    pub base_font: String,
    pub family: Family,
    pub bold: bool,
    pub italic: bool,
    pub widths: Option<Box<[f64; 256]>>,
    pub remap: Option<Box<[u8; 256]>>,
    pub fallback: Option<UnicodeTable>,
    pub fi: u8,
    pub fl: u8,
    /// `None` when the font's encoding already matches the output.
    pub encoder: Option<EncoderId>,
    pub map_in_place: bool,
    pub index: usize,
}

impl Font {
    pub fn width(&self, byte: u8) -> f64 {
        self.widths.as_ref().map_or(0.0, |w| w[byte as usize])
    }

    pub fn text_width(&self, text: &[u8]) -> f64 {
        match &self.widths {
            Some(w) => text.iter().map(|&b| w[b as usize]).sum(),
            None => 0.0,
        }
    }

    pub fn has_widths(&self) -> bool {
        self.widths.is_some()
    }

    /// Replace font codes by output bytes. Borrows the input when nothing
    /// has to change or when the remap was already applied while decoding.
    pub fn map<'a>(&self, text: &'a [u8], format: OutputFormat) -> Cow<'a, [u8]> {
        if self.map_in_place {
            return Cow::Borrowed(text);
        }
        if self.fallback.is_none() && self.remap.is_none() && self.fi == 0 && self.fl == 0 {
            return Cow::Borrowed(text);
        }

        let mut out = Vec::with_capacity(text.len() * 2);
        for &b in text {
            let u = self.fallback.as_ref().map_or(0, |f| f[b as usize]);
            if u != 0 {
                if format.is_markup() {
                    out.extend_from_slice(format!("{{\\u{u}?}}").as_bytes());
                } else if format == OutputFormat::PlainText {
                    out.push(0xA5);
                } else {
                    out.push(b'-');
                }
            } else if self.fi != 0 && b == self.fi {
                out.extend_from_slice(b"fi");
            } else if self.fl != 0 && b == self.fl {
                out.extend_from_slice(b"fl");
            } else {
                out.push(self.remap.as_ref().map_or(b, |m| m[b as usize]));
            }
        }
        Cow::Owned(out)
    }
}

/// Transcode mapped bytes into the output encoding.
pub fn encode(text: &mut [u8], encoder: &Encoder, output: TextEncoding) {
    if output == TextEncoding::Ascii {
        let bullet = if encoder.source == TextEncoding::MacSymbol { 0xB7 } else { 0xA5 };
        for b in text.iter_mut() {
            if *b == bullet {
                *b = b'-';
            }
        }
    }
    encoder.transcode(text);
}

/// Bold/italic flags and display name derived from a PostScript font name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameStyle {
    pub name: String,
    pub bold: bool,
    pub italic: bool,
}

pub fn strip_subset_tag(name: &str) -> &str {
    if name.len() > 7 && name.as_bytes()[6] == b'+' {
        &name[7..]
    } else {
        name
    }
}

/// Derive style flags; `simplify` also trims the style part and vendor
/// suffixes and spaces out mixed-case words, for targets that show font
/// names to people.
pub fn analyze_name(base_font: &str, simplify: bool) -> NameStyle {
    let mut name = strip_subset_tag(base_font).to_string();
    let mut bold = false;
    let mut italic = false;

    let separator = name.find('-').or_else(|| name.find(','));
    if separator.is_some() {
        let styled = |s: &str| name.contains(&format!("-{s}")) || name.contains(&format!(",{s}"));
        if styled("BoldItal") {
            bold = true;
            italic = true;
        } else if styled("Bold") {
            bold = true;
        } else if styled("Ital") {
            italic = true;
        }
    }
    if !bold && ["Bold", "BdMS", "BdItMS"].iter().any(|s| name.contains(s)) {
        bold = true;
    }
    if !italic && ["Oblique", "Italic", "ItMS"].iter().any(|s| name.contains(s)) {
        italic = true;
    }

    if simplify {
        if let Some(pos) = separator {
            name.truncate(pos);
        }
        for (suffix, min_len) in [
            ("BdItMS", 6),
            ("BdMS", 4),
            ("ItMS", 4),
            ("PSMT", 4),
            ("ITC", 3),
            ("PS", 2),
            ("MT", 2),
            ("MS", 2),
        ] {
            if name.len() > min_len && name.ends_with(suffix) {
                name.truncate(name.len() - suffix.len());
                break;
            }
        }
        name = respace_mixed_case(&name);
    }

    NameStyle { name, bold, italic }
}

/// "TimesNewRoman" becomes "Times New Roman"; acronyms stay together.
fn respace_mixed_case(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.char_indices() {
        out.push(ch);
        if i + 2 < bytes.len()
            && bytes[i].is_ascii_lowercase()
            && bytes[i + 1].is_ascii_uppercase()
            && bytes[i + 2].is_ascii_lowercase()
        {
            out.push(' ');
        }
    }
    out
}

/// Index into a [`FontTable`].
pub type FontId = usize;

/// Document-scoped fonts, one per key.
#[derive(Debug, Default)]
pub struct FontTable {
    fonts: Vec<Font>,
}

impl FontTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `spec` into a font. A key that is already present keeps its
    /// first definition.
    pub fn add(&mut self, spec: FontSpec, format: OutputFormat, encoders: &mut EncoderTable) -> FontId {
        if let Some(id) = self.lookup(&spec.key) {
            return id;
        }

        let source = TextEncoding::from_pdf_name(spec.encoding.as_deref());
        let encoder = encoders.acquire(source);
        let style = analyze_name(&spec.base_font, format.simplifies_font_names());
        let family = Family::classify(&style.name);
        let map_in_place = spec.remap.is_some() && spec.fallback.is_none() && spec.fi == 0 && spec.fl == 0;

        debug!(
            key = %spec.key,
            name = %style.name,
            family = family.as_str(),
            bold = style.bold,
            italic = style.italic,
            ?source,
            "font registered"
        );

        let index = self.fonts.len();
        self.fonts.push(Font {
            key: spec.key,
            base_font: style.name,
            family,
            bold: style.bold,
            italic: style.italic,
            widths: spec.widths,
            remap: spec.remap,
            fallback: spec.fallback,
            fi: spec.fi,
            fl: spec.fl,
            encoder,
            map_in_place,
            index,
        });
        index
    }

    pub fn lookup(&self, key: &str) -> Option<FontId> {
        self.fonts.iter().position(|f| f.key == key)
    }

    pub fn get(&self, id: FontId) -> Option<&Font> {
        self.fonts.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Font> {
        self.fonts.iter()
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// Zero-filled 256-entry table, or `None` when the allocation fails.
pub fn try_table<T: Copy + Default>() -> Option<Box<[T; 256]>> {
    let mut v: Vec<T> = Vec::new();
    v.try_reserve_exact(256).ok()?;
    v.resize(256, T::default());
    v.into_boxed_slice().try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_remap() -> Box<[u8; 256]> {
        let mut map = try_table::<u8>().unwrap();
        for (i, slot) in map.iter_mut().enumerate() {
            *slot = i as u8;
        }
        map
    }

    fn make_font(spec: FontSpec) -> Font {
        let mut table = FontTable::new();
        let mut encoders = EncoderTable::new(TextEncoding::MacRoman);
        let id = table.add(spec, OutputFormat::PlainText, &mut encoders);
        table.get(id).unwrap().clone()
    }

    #[test]
    fn test_encoder_only_when_encodings_differ() {
        let mac = make_font(FontSpec {
            key: "F1".into(),
            base_font: "Times-Roman".into(),
            ..Default::default()
        });
        assert_eq!(mac.encoder, None);
        let win = make_font(FontSpec {
            key: "F2".into(),
            base_font: "Times-Roman".into(),
            encoding: Some("WinAnsiEncoding".into()),
            ..Default::default()
        });
        assert!(win.encoder.is_some());
    }

    #[test]
    fn test_strip_subset_tag() {
        assert_eq!(strip_subset_tag("ABCDEF+Times-Roman"), "Times-Roman");
        assert_eq!(strip_subset_tag("Times-Roman"), "Times-Roman");
        assert_eq!(strip_subset_tag("ABCDEF+"), "ABCDEF+");
    }

    #[test]
    fn test_analyze_name_styles() {
        let s = analyze_name("Helvetica-BoldOblique", false);
        assert!(s.bold && s.italic);
        assert_eq!(s.name, "Helvetica-BoldOblique");

        let s = analyze_name("Arial,Italic", false);
        assert!(!s.bold && s.italic);

        let s = analyze_name("TimesNewRomanPS-BoldItalicMT", false);
        assert!(s.bold && s.italic);

        let s = analyze_name("ArialBdMS", false);
        assert!(s.bold && !s.italic);
    }

    #[test]
    fn test_analyze_name_simplified() {
        let s = analyze_name("ABCDEF+TimesNewRomanPS-BoldMT", true);
        assert_eq!(s.name, "Times New Roman");
        assert!(s.bold);

        let s = analyze_name("ArialMT", true);
        assert_eq!(s.name, "Arial");

        let s = analyze_name("GillSansITC", true);
        assert_eq!(s.name, "Gill Sans");

        let s = analyze_name("MS", true);
        assert_eq!(s.name, "MS");
    }

    #[test]
    fn test_family_classify() {
        assert_eq!(Family::classify("Times-Roman"), Family::Roman);
        assert_eq!(Family::classify("Arial"), Family::Swiss);
        assert_eq!(Family::classify("Courier"), Family::Modern);
        assert_eq!(Family::classify("ZapfChancery"), Family::Decor);
        assert_eq!(Family::classify("Symbol"), Family::Tech);
        assert_eq!(Family::classify("Futura"), Family::None);
        assert_eq!(Family::None.as_str(), "none");
        assert_eq!(Family::None.rtf_keyword(), "nil");
    }

    #[test]
    fn test_font_table_first_key_wins() {
        let mut table = FontTable::new();
        let mut encoders = EncoderTable::new(TextEncoding::MacRoman);
        let a = table.add(
            FontSpec { key: "F1".into(), base_font: "Times-Roman".into(), ..Default::default() },
            OutputFormat::PlainText,
            &mut encoders,
        );
        let b = table.add(
            FontSpec { key: "F1".into(), base_font: "Courier".into(), ..Default::default() },
            OutputFormat::PlainText,
            &mut encoders,
        );
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(a).unwrap().family, Family::Roman);
    }

    #[test]
    fn test_map_in_place_borrows_input() {
        let font = make_font(FontSpec {
            key: "F1".into(),
            base_font: "Times-Roman".into(),
            remap: Some(identity_remap()),
            ..Default::default()
        });
        assert!(font.map_in_place);
        let text = b"hello".to_vec();
        let mapped = font.map(&text, OutputFormat::PlainText);
        assert!(matches!(mapped, Cow::Borrowed(_)));
        assert!(std::ptr::eq(mapped.as_ptr(), text.as_ptr()));
    }

    #[test]
    fn test_map_fallback_and_ligatures() {
        let mut fallback = try_table::<u32>().unwrap();
        fallback[b'x' as usize] = 0x2192;
        let font = make_font(FontSpec {
            key: "F2".into(),
            base_font: "Times-Roman".into(),
            fallback: Some(fallback),
            fi: 0x01,
            ..Default::default()
        });
        assert!(!font.map_in_place);
        assert_eq!(&*font.map(b"\x01x", OutputFormat::Rtf), b"fi{\\u8594?}");
        assert_eq!(&*font.map(b"\x01x", OutputFormat::PlainText), b"fi\xa5");
        assert_eq!(&*font.map(b"x", OutputFormat::Ascii), b"-");
    }

    #[test]
    fn test_encode_ascii_bullet() {
        let encoder = Encoder::new(TextEncoding::MacRoman, TextEncoding::Ascii);
        let mut text = *b"\xa5 item";
        encode(&mut text, &encoder, TextEncoding::Ascii);
        assert_eq!(&text, b"- item");
    }
}
