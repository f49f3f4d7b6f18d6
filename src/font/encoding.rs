use serde::{Deserialize, Serialize};

/// Single-byte text encodings a font can be declared in, or the converter
/// can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEncoding {
    MacRoman,
    WinAnsi,
    Ascii,
    MacSymbol,
    MacDingbats,
}

impl TextEncoding {
    /// Resolve a PDF `/Encoding` name. Unknown or missing names fall back to
    /// Mac Roman, and MacExpertEncoding is treated as Mac Roman.
    pub fn from_pdf_name(name: Option<&str>) -> Self {
        match name {
            Some("WinAnsiEncoding") => TextEncoding::WinAnsi,
            Some("MacSymbolEncoding") => TextEncoding::MacSymbol,
            Some("MacDingbatEncoding") => TextEncoding::MacDingbats,
            _ => TextEncoding::MacRoman,
        }
    }

    pub fn pdf_name(self) -> &'static str {
        match self {
            TextEncoding::MacRoman => "MacRomanEncoding",
            TextEncoding::WinAnsi => "WinAnsiEncoding",
            TextEncoding::Ascii => "StandardEncoding",
            TextEncoding::MacSymbol => "MacSymbolEncoding",
            TextEncoding::MacDingbats => "MacDingbatEncoding",
        }
    }

    /// Decode one byte to its character, if the encoding defines it.
    pub fn decode(self, byte: u8) -> Option<char> {
        if byte < 0x20 {
            return Some(byte as char);
        }
        let ch = match self {
            TextEncoding::Ascii => (byte < 0x80).then_some(byte as char),
            TextEncoding::MacRoman => {
                if byte < 0x80 {
                    Some(byte as char)
                } else {
                    Some(MAC_ROMAN_HIGH[(byte - 0x80) as usize])
                }
            }
            TextEncoding::WinAnsi => match byte {
                0x00..=0x7F => Some(byte as char),
                0x80..=0x9F => WIN_ANSI_C1[(byte - 0x80) as usize],
                _ => char::from_u32(byte as u32),
            },
            TextEncoding::MacSymbol => symbol_char(byte),
            TextEncoding::MacDingbats => dingbat_char(byte),
        };
        ch.filter(|&c| c != '\0')
    }

    /// Encode one character, if the encoding can represent it.
    pub fn encode(self, ch: char) -> Option<u8> {
        if (ch as u32) < 0x20 {
            return Some(ch as u8);
        }
        if matches!(self, TextEncoding::MacRoman | TextEncoding::WinAnsi | TextEncoding::Ascii)
            && (ch as u32) < 0x80
        {
            return Some(ch as u8);
        }
        (0x20..=0xFFu8).find(|&b| self.decode(b) == Some(ch))
    }
}

/// Mac OS Roman, bytes 0x80..=0xFF
const MAC_ROMAN_HIGH: [char; 128] = [
    'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è',
    'ê', 'ë', 'í', 'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü',
    '†', '°', '¢', '£', '§', '•', '¶', 'ß', '®', '©', '™', '´', '¨', '≠', 'Æ', 'Ø',
    '∞', '±', '≤', '≥', '¥', 'µ', '∂', '∑', '∏', 'π', '∫', 'ª', 'º', 'Ω', 'æ', 'ø',
    '¿', '¡', '¬', '√', 'ƒ', '≈', '∆', '«', '»', '…', '\u{A0}', 'À', 'Ã', 'Õ', 'Œ', 'œ',
    '–', '—', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}', '÷', '◊', 'ÿ', 'Ÿ', '⁄', '€', '‹', '›', 'ﬁ', 'ﬂ',
    '‡', '·', '‚', '„', '‰', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô',
    '\u{F8FF}', 'Ò', 'Ú', 'Û', 'Ù', 'ı', 'ˆ', '˜', '¯', '˘', '˙', '˚', '¸', '˝', '˛', 'ˇ',
];

/// Windows-1252 C1 range; the five undefined slots are `None`.
const WIN_ANSI_C1: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

const SYMBOL_UPPER: &str = "ΑΒΧΔΕΦΓΗΙϑΚΛΜΝΟΠΘΡΣΤΥςΩΞΨΖ";
const SYMBOL_LOWER: &str = "αβχδεφγηιϕκλμνοπθρστυϖωξψζ";

fn symbol_char(byte: u8) -> Option<char> {
    let ch = match byte {
        b'A'..=b'Z' => SYMBOL_UPPER.chars().nth((byte - b'A') as usize)?,
        b'a'..=b'z' => SYMBOL_LOWER.chars().nth((byte - b'a') as usize)?,
        0x22 => '∀',
        0x24 => '∃',
        0x27 => '∋',
        0x2A => '∗',
        0x2D => '−',
        0x40 => '≅',
        0x5C => '∴',
        0x5E => '⊥',
        0x7E => '∼',
        0x20..=0x7E => byte as char,
        0xA1 => 'ϒ',
        0xA2 => '′',
        0xA3 => '≤',
        0xA4 => '⁄',
        0xA5 => '∞',
        0xA6 => 'ƒ',
        0xAB => '↔',
        0xAC => '←',
        0xAD => '↑',
        0xAE => '→',
        0xAF => '↓',
        0xB0 => '°',
        0xB1 => '±',
        0xB2 => '″',
        0xB3 => '≥',
        0xB4 => '×',
        0xB5 => '∝',
        0xB6 => '∂',
        0xB7 => '•',
        0xB8 => '÷',
        0xB9 => '≠',
        0xBA => '≡',
        0xBB => '≈',
        0xBC => '…',
        0xC5 => '⊕',
        0xC6 => '∅',
        0xC7 => '∩',
        0xC8 => '∪',
        0xCE => '∈',
        0xD0 => '∠',
        0xD1 => '∇',
        0xD2 => '®',
        0xD3 => '©',
        0xD4 => '™',
        0xD5 => '∏',
        0xD6 => '√',
        0xD7 => '⋅',
        0xD8 => '¬',
        0xD9 => '∧',
        0xDA => '∨',
        0xE0 => '◊',
        0xE5 => '∑',
        0xF2 => '∫',
        _ => return None,
    };
    Some(ch)
}

fn dingbat_char(byte: u8) -> Option<char> {
    match byte {
        0x20 => Some(' '),
        0x6C => Some('●'),
        0x6E => Some('■'),
        0x75 => Some('◆'),
        0x21..=0x7E => char::from_u32(0x2700 + (byte - 0x20) as u32),
        _ => None,
    }
}

/// Closest representable stand-in for characters the output encoding lacks.
fn approximate(ch: char) -> Option<char> {
    let near = match ch {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '′' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '″' => '"',
        '–' | '—' | '−' => '-',
        '•' | '●' | '■' | '◆' | '·' | '⋅' => '•',
        '∗' => '*',
        '∼' | '˜' => '~',
        'ˆ' => '^',
        '‹' => '<',
        '›' => '>',
        '\u{A0}' => ' ',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'Ç' => 'C',
        'ç' => 'c',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'ì' | 'í' | 'î' | 'ï' | 'ı' => 'i',
        'Ñ' => 'N',
        'ñ' => 'n',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => 'O',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ÿ' | 'Ÿ' => 'y',
        _ => return None,
    };
    Some(near)
}

/// Source-to-output byte transcoder shared by every font declared in the
/// same encoding.
#[derive(Debug, Clone)]
pub struct Encoder {
    pub source: TextEncoding,
    table: Option<Box<[u8; 256]>>,
}

impl Encoder {
    pub fn new(source: TextEncoding, output: TextEncoding) -> Self {
        let table = (source != output).then(|| {
            let mut table = Box::new([b'?'; 256]);
            for (byte, slot) in table.iter_mut().enumerate() {
                let byte = byte as u8;
                *slot = match source.decode(byte) {
                    Some(ch) => output
                        .encode(ch)
                        .or_else(|| approximate(ch).and_then(|near| output.encode(near)))
                        .or_else(|| (near_bullet(ch) && output == TextEncoding::Ascii).then_some(b'-'))
                        .unwrap_or(b'?'),
                    None => b'?',
                };
            }
            table
        });
        Encoder { source, table }
    }

    pub fn is_identity(&self) -> bool {
        self.table.is_none()
    }

    pub fn transcode(&self, bytes: &mut [u8]) {
        if let Some(table) = &self.table {
            for b in bytes.iter_mut() {
                *b = table[*b as usize];
            }
        }
    }
}

fn near_bullet(ch: char) -> bool {
    approximate(ch) == Some('•')
}

/// Index into an [`EncoderTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderId(pub usize);

/// Document-scoped set of encoders, at most one per source encoding.
#[derive(Debug)]
pub struct EncoderTable {
    output: TextEncoding,
    encoders: Vec<Encoder>,
}

impl EncoderTable {
    pub fn new(output: TextEncoding) -> Self {
        Self {
            output,
            encoders: Vec::new(),
        }
    }

    pub fn output(&self) -> TextEncoding {
        self.output
    }

    /// Find the encoder for `source`, creating it on first use. Text already
    /// in the output encoding needs none and is copied through.
    pub fn acquire(&mut self, source: TextEncoding) -> Option<EncoderId> {
        if source == self.output {
            return None;
        }
        if let Some(pos) = self.encoders.iter().position(|e| e.source == source) {
            return Some(EncoderId(pos));
        }
        self.encoders.push(Encoder::new(source, self.output));
        Some(EncoderId(self.encoders.len() - 1))
    }

    pub fn get(&self, id: EncoderId) -> Option<&Encoder> {
        self.encoders.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }
}
