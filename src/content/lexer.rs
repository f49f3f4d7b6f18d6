//! Tokenizer for content-stream bytes.
//!
//! Never fails: bytes that do not form a token are skipped, and a literal
//! cut off by the end of the stream yields the bytes read so far.

/// A byte decoded from a literal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringByte {
    /// Font code, subject to the font's byte table.
    Code(u8),
    /// Output of `\n \r \t \b \f`, passed through untouched.
    Control(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Name(String),
    String(Vec<StringByte>),
    HexString(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Operator(String),
}

pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' | 0x0C | 0x00 => self.pos += 1,
                b'%' => {
                    while self.peek().is_some_and(|b| b != b'\n' && b != b'\r') {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Skip inline image data following `ID`, up to and including `EI`.
    pub fn skip_inline_image(&mut self) {
        let data = self.data;
        while self.pos + 1 < data.len() {
            let at_ei = data[self.pos] == b'E'
                && data[self.pos + 1] == b'I'
                && (self.pos == 0 || is_space(data[self.pos - 1]))
                && data.get(self.pos + 2).is_none_or(|&b| is_space(b));
            if at_ei {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
        self.pos = data.len();
    }

    fn read_number(&mut self) -> Option<f64> {
        let start = self.pos;
        while self.peek().is_some_and(|b| matches!(b, b'0'..=b'9' | b'.' | b'-' | b'+')) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.data[start..self.pos]).ok()?.parse().ok()
    }

    fn read_string(&mut self) -> Vec<StringByte> {
        self.pos += 1; // Skip '('
        let mut result = Vec::new();
        let mut depth = 1;

        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    result.push(StringByte::Code(b));
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    result.push(StringByte::Code(b));
                }
                b'\\' => {
                    let Some(escaped) = self.peek() else {
                        break;
                    };
                    self.pos += 1;
                    match escaped {
                        b'n' => result.push(StringByte::Control(b'\n')),
                        b'r' => result.push(StringByte::Control(b'\r')),
                        b't' => result.push(StringByte::Control(b'\t')),
                        b'b' => result.push(StringByte::Control(0x08)),
                        b'f' => result.push(StringByte::Control(0x0C)),
                        b'0'..=b'7' => {
                            let mut val = (escaped - b'0') as u32;
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        self.pos += 1;
                                        val = val * 8 + (d - b'0') as u32;
                                    }
                                    _ => break,
                                }
                            }
                            if val <= 255 {
                                result.push(StringByte::Code(val as u8));
                            }
                        }
                        b'\r' => {
                            // Line continuation
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        _ => result.push(StringByte::Code(escaped)),
                    }
                }
                _ => result.push(StringByte::Code(b)),
            }
        }

        result
    }

    /// Pairs of hex digits to bytes; an odd trailing nibble is dropped.
    fn read_hex_string(&mut self) -> Vec<u8> {
        let mut nibbles = Vec::new();
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'>' {
                break;
            }
            if let Some(v) = hex_val(b) {
                nibbles.push(v);
            }
        }
        nibbles.chunks_exact(2).map(|pair| (pair[0] << 4) | pair[1]).collect()
    }

    fn read_name(&mut self) -> String {
        self.pos += 1; // Skip '/'
        let start = self.pos;
        while self.peek().is_some_and(|b| !is_space(b) && !is_delimiter(b)) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.data[start..self.pos]).into_owned()
    }

    fn read_operator(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|b| !is_space(b) && !is_delimiter(b)) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.data[start..self.pos]).into_owned()
    }

    fn skip_dict(&mut self) {
        self.pos += 2; // Skip '<<'
        let mut depth = 1;
        while self.pos < self.data.len() && depth > 0 {
            match (self.data[self.pos], self.data.get(self.pos + 1)) {
                (b'<', Some(b'<')) => {
                    depth += 1;
                    self.pos += 2;
                }
                (b'>', Some(b'>')) => {
                    depth -= 1;
                    self.pos += 2;
                }
                (b'(', _) => {
                    self.read_string();
                }
                _ => self.pos += 1,
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            self.skip_whitespace();
            let b = self.peek()?;
            let token = match b {
                b'+' | b'-' | b'.' | b'0'..=b'9' => match self.read_number() {
                    Some(n) => Token::Number(n),
                    None => continue,
                },
                b'(' => Token::String(self.read_string()),
                b'<' if self.data.get(self.pos + 1) == Some(&b'<') => {
                    self.skip_dict();
                    continue;
                }
                b'<' => {
                    self.pos += 1;
                    Token::HexString(self.read_hex_string())
                }
                b'/' => Token::Name(self.read_name()),
                b'[' => {
                    self.pos += 1;
                    Token::ArrayStart
                }
                b']' => {
                    self.pos += 1;
                    Token::ArrayEnd
                }
                b'{' | b'}' | b')' | b'>' => {
                    self.pos += 1;
                    continue;
                }
                _ => Token::Operator(self.read_operator()),
            };
            return Some(token);
        }
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0C | 0x00)
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(data: &[u8]) -> Vec<Token> {
        Lexer::new(data).collect()
    }

    fn codes(s: &[u8]) -> Vec<StringByte> {
        s.iter().map(|&b| StringByte::Code(b)).collect()
    }

    #[test]
    fn test_simple_text() {
        let toks = tokens(b"BT /F1 12 Tf 100 700 Td (Hello World) Tj ET");
        assert_eq!(
            toks,
            vec![
                Token::Operator("BT".into()),
                Token::Name("F1".into()),
                Token::Number(12.0),
                Token::Operator("Tf".into()),
                Token::Number(100.0),
                Token::Number(700.0),
                Token::Operator("Td".into()),
                Token::String(codes(b"Hello World")),
                Token::Operator("Tj".into()),
                Token::Operator("ET".into()),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let toks = tokens(b"(a\\(b\\)\\\\c\\n\\101\\0531(x)\\\nz)");
        let Token::String(bytes) = &toks[0] else {
            panic!("expected string");
        };
        let mut expected = codes(b"a(b)\\c");
        expected.push(StringByte::Control(b'\n'));
        expected.extend(codes(b"A+1(x)z"));
        assert_eq!(bytes, &expected);
    }

    #[test]
    fn test_hex_string_drops_odd_nibble() {
        assert_eq!(tokens(b"<48 65 6c6C6>"), vec![Token::HexString(b"Hell".to_vec())]);
    }

    #[test]
    fn test_tj_array_and_quotes() {
        let toks = tokens(b"[(A)-250(B)]TJ (C)' 1 2 (D)\"");
        assert_eq!(toks[0], Token::ArrayStart);
        assert_eq!(toks[2], Token::Number(-250.0));
        assert_eq!(toks[4], Token::ArrayEnd);
        assert_eq!(toks[5], Token::Operator("TJ".into()));
        assert_eq!(toks[7], Token::Operator("'".into()));
        assert_eq!(toks[11], Token::Operator("\"".into()));
    }

    #[test]
    fn test_dictionaries_and_comments_skipped() {
        let toks = tokens(b"/Span <</ActualText (x) /MCID 3>> BDC % note\nT*");
        assert_eq!(
            toks,
            vec![
                Token::Name("Span".into()),
                Token::Operator("BDC".into()),
                Token::Operator("T*".into()),
            ]
        );
    }

    #[test]
    fn test_inline_image_skip() {
        let mut lexer = Lexer::new(b"BI /W 2 ID \x00EI\xff EI Q");
        assert_eq!(lexer.next(), Some(Token::Operator("BI".into())));
        while let Some(tok) = lexer.next() {
            if tok == Token::Operator("ID".into()) {
                break;
            }
        }
        lexer.skip_inline_image();
        assert_eq!(lexer.next(), Some(Token::Operator("Q".into())));
    }

    #[test]
    fn test_truncated_string_is_kept_partial() {
        let toks = tokens(b"(abc");
        assert_eq!(toks, vec![Token::String(codes(b"abc"))]);
    }
}
