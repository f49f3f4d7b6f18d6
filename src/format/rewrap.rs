//! Paragraph rewrap: joining lines that were only broken by the page width.

/// Bytes that follow a backslash as a literal RTF escape rather than a
/// control word.
fn is_token(b: u8) -> bool {
    matches!(b, b'\\' | b'{' | b'}')
}

/// Mac Roman opening double and single quotes.
fn opens_paragraph(b: u8) -> bool {
    b.is_ascii_uppercase() || b == 0xD2 || b == 0xD4
}

/// Byte at a signed index, or 0 outside the buffer.
fn at(data: &[u8], i: isize) -> u8 {
    usize::try_from(i).ok().and_then(|i| data.get(i)).copied().unwrap_or(0)
}

/// Start of an RTF control word: a backslash not escaped itself and not
/// starting a literal escape.
fn control_word_at(data: &[u8], i: isize) -> bool {
    at(data, i) == b'\\' && i > 0 && at(data, i - 1) != b'\\' && !is_token(at(data, i + 1))
}

/// Scan forward from a paragraph opening at `start` and return the end of
/// the paragraph if its lines should be joined.
///
/// A paragraph qualifies when it runs to a blank line, its last line ends in
/// sentence punctuation, and no line inside it begins with a tab or a blank.
fn paragraph_end(data: &[u8], start: isize, markup: bool) -> Option<isize> {
    let n = data.len() as isize;
    let mut nl = false;
    let mut j = start;

    while j < n {
        let b = at(data, j);
        if b == b'\n' && at(data, j - 1) == b'\n' {
            let mut good = false;
            let mut found_text = false;
            let mut k = j - 2;

            while k > start && at(data, k) != b'\n' {
                let c = at(data, k);
                let stop = match c {
                    b'.' => {
                        if at(data, k - 1) != b'.' {
                            good = true;
                        }
                        true
                    }
                    b'?' | b'!' | b':' => {
                        good = true;
                        true
                    }
                    _ => false,
                };
                if c.is_ascii_alphabetic() {
                    found_text = true;
                }
                if stop || c == b',' || c == b';' {
                    break;
                }
                k -= 1;
            }

            if found_text {
                if markup {
                    let mut z = k;
                    while z < j - 3 {
                        if at(data, z) == b'\\' {
                            if is_token(at(data, z + 1)) {
                                z += 1;
                            } else {
                                break;
                            }
                        }
                        if at(data, z).is_ascii_alphabetic() {
                            good = false;
                        }
                        z += 1;
                    }
                } else {
                    good = false;
                }
            }

            return if good { Some(j - 2) } else { None };
        } else if b == b'\n' {
            nl = true;
        } else if b == b'\t' {
            return None;
        } else if nl {
            if markup && control_word_at(data, j) {
                while j < n && at(data, j) != b' ' {
                    j += 1;
                }
            } else if b.is_ascii_alphanumeric() {
                nl = false;
            } else if crate::content::is_space(b) {
                return None;
            }
        }
        j += 1;
    }
    None
}

/// Turn the single newlines inside qualifying paragraphs into spaces.
/// Output has the same length as the input.
pub fn rewrap(data: &[u8], markup: bool) -> Vec<u8> {
    let n = data.len() as isize;
    let mut out = Vec::with_capacity(data.len());
    let mut wrap: isize = 0;
    let mut i: isize = 0;

    while i < n {
        if wrap != 0 && i < wrap {
            if at(data, i) == b'\n' {
                out.push(b' ');
                i += 1;
                continue;
            }
        } else {
            let feed = i < 2 || (at(data, i - 1) == b'\n' && at(data, i - 2) == b'\n');
            if feed && markup && at(data, i) == b'\\' && !is_token(at(data, i + 1)) && !(i > 0 && at(data, i - 1) == b'\\') {
                while i < n && at(data, i) != b' ' {
                    out.push(at(data, i));
                    i += 1;
                }
                if i < n {
                    out.push(at(data, i));
                    i += 1;
                }
                if i >= n {
                    break;
                }
            }

            if feed && opens_paragraph(at(data, i)) {
                wrap = paragraph_end(data, i, markup).unwrap_or(0);
            }
        }

        out.push(at(data, i));
        i += 1;
    }
    out
}
