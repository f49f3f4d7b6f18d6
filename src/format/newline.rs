use crate::error::Result;
use crate::options::Newline;

/// Rewrite `\n` line ends to the requested convention.
pub fn fix_newlines(mut data: Vec<u8>, newline: Newline) -> Result<Vec<u8>> {
    match newline {
        Newline::Unix => Ok(data),
        Newline::Mac => {
            for b in data.iter_mut().filter(|b| **b == b'\n') {
                *b = b'\r';
            }
            Ok(data)
        }
        Newline::Dos => {
            let count = data.iter().filter(|&&b| b == b'\n').count();
            if count == 0 {
                return Ok(data);
            }
            let mut out = Vec::new();
            out.try_reserve_exact(data.len() + count)?;
            for b in data {
                if b == b'\n' {
                    out.push(b'\r');
                }
                out.push(b);
            }
            Ok(out)
        }
    }
}
