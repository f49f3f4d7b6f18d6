use crate::content::is_space;

/// Squeeze a page: no leading or trailing whitespace, no spaces at line
/// starts or ends, at most two spaces in a row, at most one blank line.
pub fn strip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = data.iter().position(|&b| !is_space(b)).unwrap_or(data.len());
    let mut line_start = false;

    while i < data.len() {
        if line_start {
            while data.get(i) == Some(&b' ') {
                i += 1;
            }
            line_start = false;
            if i == data.len() {
                break;
            }
        } else if data[i] == b' ' && out.ends_with(b"  ") {
            i += 1;
            continue;
        }

        let b = data[i];
        i += 1;
        if b == b'\n' {
            line_start = true;
            trim_spaces(&mut out);
            if out.ends_with(b"\n\n") {
                continue;
            }
        }
        out.push(b);
    }

    while out.last().is_some_and(|&b| is_space(b)) {
        out.pop();
    }
    out
}

/// Drop spaces that end a line.
pub fn clean(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        if b == b'\n' {
            trim_spaces(&mut out);
        }
        out.push(b);
    }
    out
}

fn trim_spaces(out: &mut Vec<u8>) {
    while out.last() == Some(&b' ') {
        out.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_page() {
        let page = b"\n\n\n   Hello    world   \n\n\n\n   next\n\n";
        assert_eq!(strip(page), b"Hello  world\n\nnext");
    }

    #[test]
    fn test_strip_single_word() {
        assert_eq!(strip(b"\n\n\n\n            Hello\n\n\n"), b"Hello");
        assert_eq!(strip(b"   \n  "), b"");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let samples: [&[u8]; 5] = [
            b"  a  \n \n \n b\t \n",
            b"x     y\n\n\n\n\nz   ",
            b"\t\n  lead\n  \n",
            b"one\ntwo  \n   three",
            b"",
        ];
        for sample in samples {
            let once = strip(sample);
            assert_eq!(strip(&once), once);
        }
    }

    #[test]
    fn test_clean_trims_line_ends_only() {
        let page = b"  keep   \n\n  indent  \nend  ";
        let cleaned = clean(page);
        assert_eq!(cleaned, b"  keep\n\n  indent\nend  ");
        assert_eq!(clean(&cleaned), cleaned);
    }
}
