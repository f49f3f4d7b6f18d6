//! Single-byte view of a `ToUnicode` CMap.
//!
//! Only source codes 0..=255 are kept since the converter works on simple
//! fonts. Destinations spelling several UTF-16 units keep their first
//! character.

/// Code point per source byte; 0 means "no mapping".
pub type UnicodeTable = Box<[u32; 256]>;

/// Parse the `bfchar` and `bfrange` sections of a CMap stream.
///
/// Returns `None` when the stream maps no single-byte code.
pub fn parse_tounicode_cmap(data: &[u8]) -> Option<UnicodeTable> {
    let mut table: UnicodeTable = Box::new([0u32; 256]);

    for section in sections(data, b"beginbfchar", b"endbfchar") {
        let tokens = tokenize(section);
        for pair in tokens.chunks(2) {
            if let [Token::Hex(src), Token::Hex(dst)] = pair {
                set(&mut table, code_of(src), first_char(dst));
            }
        }
    }

    for section in sections(data, b"beginbfrange", b"endbfrange") {
        let tokens = tokenize(section);
        let mut i = 0;
        while i + 2 < tokens.len() {
            let (Token::Hex(lo), Token::Hex(hi)) = (&tokens[i], &tokens[i + 1]) else {
                i += 1;
                continue;
            };
            let (lo, hi) = (code_of(lo), code_of(hi));
            match &tokens[i + 2] {
                Token::Hex(dst) => {
                    let start = first_char(dst);
                    for (offset, code) in (lo..=hi.min(lo.saturating_add(255))).enumerate() {
                        set(&mut table, code, start.map(|u| u + offset as u32));
                    }
                    i += 3;
                }
                Token::Array(items) => {
                    for (code, dst) in (lo..=hi).zip(items.iter()) {
                        set(&mut table, code, first_char(dst));
                    }
                    i += 3;
                }
            }
        }
    }

    table.iter().any(|&u| u != 0).then_some(table)
}

enum Token {
    Hex(Vec<u8>),
    Array(Vec<Vec<u8>>),
}

fn sections<'a>(data: &'a [u8], begin: &[u8], end: &[u8]) -> Vec<&'a [u8]> {
    let mut out = Vec::new();
    let mut rest = data;
    while let Some(start) = find(rest, begin) {
        rest = &rest[start + begin.len()..];
        let Some(stop) = find(rest, end) else {
            break;
        };
        out.push(&rest[..stop]);
        rest = &rest[stop + end.len()..];
    }
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn tokenize(section: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < section.len() {
        match section[pos] {
            b'<' => {
                let (hex, next) = read_hex(section, pos + 1);
                tokens.push(Token::Hex(hex));
                pos = next;
            }
            b'[' => {
                let mut items = Vec::new();
                pos += 1;
                while pos < section.len() && section[pos] != b']' {
                    if section[pos] == b'<' {
                        let (hex, next) = read_hex(section, pos + 1);
                        items.push(hex);
                        pos = next;
                    } else {
                        pos += 1;
                    }
                }
                tokens.push(Token::Array(items));
                pos += 1;
            }
            _ => pos += 1,
        }
    }
    tokens
}

/// Read hex digits up to `>` and pack them into bytes.
fn read_hex(data: &[u8], mut pos: usize) -> (Vec<u8>, usize) {
    let mut nibbles = Vec::new();
    while pos < data.len() && data[pos] != b'>' {
        if let Some(v) = (data[pos] as char).to_digit(16) {
            nibbles.push(v as u8);
        }
        pos += 1;
    }
    let bytes = nibbles.chunks(2).map(|c| (c[0] << 4) | c.get(1).copied().unwrap_or(0)).collect();
    (bytes, pos + 1)
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

/// First character of a UTF-16BE destination string.
fn first_char(bytes: &[u8]) -> Option<u32> {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|c| u16::from_be_bytes([c[0], c.get(1).copied().unwrap_or(0)]))
        .collect();
    char::decode_utf16(units).next()?.ok().map(|c| c as u32)
}

fn set(table: &mut UnicodeTable, code: u32, value: Option<u32>) {
    if let (Ok(index), Some(u)) = (usize::try_from(code), value) {
        if index < 256 {
            table[index] = u;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bfrange() {
        let cmap = b"
beginbfrange
<03><03><0020>
<24><24><0041>
endbfrange
";
        let map = parse_tounicode_cmap(cmap).unwrap();
        assert_eq!(map[0x03], 0x20);
        assert_eq!(map[0x24], 0x41);
    }

    #[test]
    fn test_parse_bfrange_sequence_and_array() {
        let cmap = b"
2 beginbfrange
<0024><0026><0041>
<0030><0031>[<2022><00E9>]
endbfrange
";
        let map = parse_tounicode_cmap(cmap).unwrap();
        assert_eq!(&map[0x24..=0x26], &[0x41, 0x42, 0x43]);
        assert_eq!(map[0x30], 0x2022);
        assert_eq!(map[0x31], 0xE9);
    }

    #[test]
    fn test_parse_bfchar_keeps_single_byte_codes() {
        let cmap = b"
beginbfchar
<0003><0020>
<0141><0041>
<0005><00660069>
endbfchar
";
        let map = parse_tounicode_cmap(cmap).unwrap();
        assert_eq!(map[0x03], 0x20);
        assert_eq!(map[0x05], 'f' as u32);
        assert!(map.iter().all(|&u| u != 0x41));
    }

    #[test]
    fn test_empty_cmap_is_none() {
        assert!(parse_tounicode_cmap(b"begincmap endcmap").is_none());
    }
}
