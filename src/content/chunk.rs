//! Turning shown strings into placed runs.

use super::interpreter::Interpreter;
use super::{EPS, MIN_SCRIPT_LENGTH, fequal, is_space};
use crate::error::Result;
use crate::font::encode;
use crate::layout::TextRun;

/// Line height assumed when the previous run had no size.
const DEFAULT_LINE_HEIGHT: f64 = 12.0;

fn looks_like_script(chunk: &[u8]) -> bool {
    let marks = chunk
        .iter()
        .all(|&b| is_space(b) || b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'(' | b')' | b'[' | b']'));
    let ordinal = chunk.len() == 2 && matches!(chunk, b"st" | b"nd" | b"rd" | b"th" | b"TM");
    marks || ordinal || chunk.len() == 1
}

impl Interpreter<'_> {
    /// Emit the pending chunk, snapping short raised or lowered fragments
    /// such as footnote marks onto the previous baseline.
    pub(super) fn process_chunk(&mut self) -> Result<()> {
        self.true_y = self.y;
        let chunk = std::mem::take(&mut self.chunk);
        let all_ws = chunk.iter().all(|&b| is_space(b));

        if !all_ws
            && chunk.len() <= MIN_SCRIPT_LENGTH
            && self.x > self.last_x + EPS
            && self.last_y.abs() >= EPS
            && looks_like_script(&chunk)
        {
            if self.y > self.last_y + EPS {
                let size = self.last_f * self.last_fs;
                let step = if fequal(size, 0.0) { DEFAULT_LINE_HEIGHT } else { size };
                if self.y < self.last_y + step {
                    self.y = self.last_y;
                }
            } else if self.y < self.last_y - EPS && self.y + self.f * self.fs > self.last_y {
                self.y = self.last_y;
            }
        }

        self.last_f = self.f;
        self.last_fs = self.fs;
        self.last_x = self.x;
        self.last_y = self.y;
        self.add_text(&chunk, all_ws)
    }

    /// Split the chunk when character or word spacing would otherwise
    /// squeeze visibly separated glyphs together.
    fn add_text(&mut self, chunk: &[u8], all_ws: bool) -> Result<()> {
        let Some(font) = self.current_font().filter(|f| f.has_widths()) else {
            return self.place_run(chunk, chunk.len(), all_ws);
        };
        if all_ws || chunk.len() < 2 {
            return self.place_run(chunk, chunk.len(), all_ws);
        }

        let advance = |width: f64, fs: f64, extra: f64, f: f64, h: f64| f * (width * fs / 1000.0 + extra) * h;

        let mut padded = Vec::new();
        if self.char_spacing > 1.0 {
            let per_size = if fequal(self.fs, 0.0) { 1.0 } else { self.fs };
            let wedge = (self.char_spacing / per_size).round() as i64;
            if self.ctx.relaxed_spacing || wedge > 4 {
                let start = self.x;
                for &c in chunk {
                    if !is_space(c) {
                        self.place_run(&[c], 1, false)?;
                    }
                    self.x += advance(font.width(c), self.fs, self.char_spacing, self.f, self.h_scale);
                }
                self.x = start;
                return Ok(());
            }
            if wedge > 0 {
                padded.try_reserve(chunk.len() * (wedge as usize + 1))?;
                for (i, &c) in chunk.iter().enumerate() {
                    padded.push(c);
                    if i + 1 < chunk.len() {
                        padded.extend(std::iter::repeat_n(b' ', wedge as usize));
                    }
                }
            }
        }
        let chunk = if padded.is_empty() { chunk } else { &padded[..] };

        if self.word_spacing > 1.0 {
            if let Some(i) = chunk.iter().position(|&b| b == b' ') {
                let start = self.x;
                let mut rest = 0;
                if i > 0 {
                    self.place_run(&chunk[..=i], i + 1, false)?;
                    self.x += advance(font.text_width(&chunk[..i]), self.fs, self.word_spacing, self.f, self.h_scale);
                    rest = i + 1;
                } else {
                    self.x += self.f * self.word_spacing * self.h_scale;
                }
                if rest < chunk.len() {
                    let tail = &chunk[rest..];
                    self.place_run(tail, tail.len(), false)?;
                }
                self.x = start;
                return Ok(());
            }
        }

        self.place_run(chunk, chunk.len(), false)
    }

    /// Map, transcode, clip and record one run at the current position.
    fn place_run(&mut self, text: &[u8], width: usize, is_whitespace: bool) -> Result<()> {
        let ctx = self.ctx;
        let format = ctx.format;
        let markup = format.is_markup();
        let font = self.current_font();

        let text_width = match font {
            Some(f) if markup && f.has_widths() => Some(f.text_width(text)),
            _ => None,
        };

        let mut bytes = match font {
            Some(f) => f.map(text, format).into_owned(),
            None => text.to_vec(),
        };
        if let Some(encoder) = font.and_then(|f| f.encoder).and_then(|id| ctx.encoders.get(id)) {
            encode(&mut bytes, encoder, ctx.encoders.output());
        }
        let width = if markup { width } else { bytes.len() };

        let (mut x, mut y) = (self.x, self.y);
        let mut crop_y = 0.0;
        if let Some((cx, cy)) = self.geometry.crop_origin {
            x -= cx;
            y -= cy;
            crop_y = cy;
            if x < 0.0 || y < 0.0 || x > self.geometry.width || y > self.geometry.height {
                return Ok(());
            }
        }

        let f = self.f * self.fs;
        let tx = if markup {
            match text_width {
                Some(w) => x + f * w / 1000.0,
                None => x + f * width as f64 * 0.5,
            }
        } else {
            x
        };

        self.runs.runs.try_reserve(1)?;
        self.runs.push(TextRun {
            x,
            y,
            tx,
            ty: self.true_y - crop_y,
            f,
            text: bytes,
            width,
            font: self.font,
            is_whitespace,
            ..Default::default()
        });
        Ok(())
    }
}
