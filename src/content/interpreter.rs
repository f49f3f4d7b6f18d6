//! Content-stream interpreter.
//!
//! Only the operators that move text or change its size are honored. The
//! transform model is a uniform scale plus a translation: rotation and skew
//! in `cm` and `Tm` are ignored.

use tracing::{debug, trace};

use super::lexer::{Lexer, StringByte, Token};
use super::{EPS, MAX_OPERANDS, MAX_Q_DEPTH, PageGeometry, RenderContext, fequal};
use crate::error::Result;
use crate::font::{Font, FontId};
use crate::layout::PageRuns;
use crate::layout::grid::MAX_GRID;

/// Translation and scale saved by `q`.
#[derive(Debug, Clone, Copy)]
struct SavedTransform {
    scale: f64,
    dx: f64,
    dy: f64,
}

pub struct Interpreter<'a> {
    pub(super) ctx: &'a RenderContext<'a>,
    pub(super) geometry: PageGeometry,
    pub(super) runs: PageRuns,

    operands: [f64; MAX_OPERANDS],
    last_name: Option<String>,
    in_text: bool,
    in_array: bool,
    array_x: f64,
    kern: f64,
    pub(super) chunk: Vec<u8>,
    pub(super) font: Option<FontId>,

    /// Text-space scale and font size.
    pub(super) f: f64,
    pub(super) fs: f64,
    pub(super) x: f64,
    pub(super) y: f64,
    line_x: f64,
    leading: f64,
    rise: f64,
    pub(super) char_spacing: f64,
    pub(super) word_spacing: f64,
    pub(super) h_scale: f64,

    pub(super) last_f: f64,
    pub(super) last_fs: f64,
    pub(super) last_x: f64,
    pub(super) last_y: f64,
    pub(super) true_y: f64,

    scale: f64,
    dx: f64,
    dy: f64,
    saves: Vec<SavedTransform>,
    form_depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(ctx: &'a RenderContext<'a>, geometry: PageGeometry) -> Self {
        let mut interp = Self {
            ctx,
            geometry,
            runs: PageRuns::default(),
            operands: [0.0; MAX_OPERANDS],
            last_name: None,
            in_text: false,
            in_array: false,
            array_x: 0.0,
            kern: 0.0,
            chunk: Vec::new(),
            font: None,
            f: 1.0,
            fs: 1.0,
            x: 0.0,
            y: 0.0,
            line_x: 0.0,
            leading: 0.0,
            rise: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            last_f: 1.0,
            last_fs: 1.0,
            last_x: 0.0,
            last_y: 0.0,
            true_y: 0.0,
            scale: 1.0,
            dx: 0.0,
            dy: 0.0,
            saves: Vec::with_capacity(MAX_Q_DEPTH),
            form_depth: 0,
        };
        interp.init_metrics();
        interp
    }

    /// Interpret a page's content. May be called once per page.
    pub fn run(&mut self, content: &[u8]) -> Result<()> {
        self.execute(content)?;
        if !self.chunk.is_empty() {
            trace!(len = self.chunk.len(), "unterminated text discarded");
            self.chunk.clear();
        }
        Ok(())
    }

    pub fn finish(self) -> PageRuns {
        self.runs
    }

    pub(super) fn current_font(&self) -> Option<&'a Font> {
        let fonts = self.ctx.fonts;
        self.font.and_then(|id| fonts.get(id))
    }

    fn init_metrics(&mut self) {
        self.leading = 0.0;
        self.x = 0.0;
        self.y = 0.0;
        self.line_x = 0.0;
        self.rise = 0.0;
        self.char_spacing = 0.0;
        self.word_spacing = 0.0;
        self.kern = 0.0;
        self.array_x = 0.0;
        self.last_f = 1.0;
        self.last_fs = 1.0;
        self.last_x = 0.0;
        self.last_y = 0.0;
        self.true_y = 0.0;
        self.operands = [0.0; MAX_OPERANDS];
    }

    fn push_operand(&mut self, value: f64) {
        self.operands.copy_within(0..MAX_OPERANDS - 1, 1);
        self.operands[0] = value;
    }

    fn execute(&mut self, content: &[u8]) -> Result<()> {
        let mut lexer = Lexer::new(content);
        while let Some(token) = lexer.next() {
            match token {
                Token::Number(n) if self.in_array => self.kern += n,
                Token::Number(n) => self.push_operand(n),
                Token::Name(name) => self.last_name = Some(name),
                Token::String(bytes) => {
                    if self.in_text {
                        self.begin_string()?;
                        for b in bytes {
                            match b {
                                StringByte::Code(code) => self.push_code(code),
                                StringByte::Control(ctl) => self.chunk.push(ctl),
                            }
                        }
                    }
                }
                Token::HexString(bytes) => {
                    if self.in_text {
                        self.begin_string()?;
                        for code in bytes {
                            self.push_code(code);
                        }
                    }
                }
                Token::ArrayStart => {
                    self.in_array = true;
                    self.array_x = self.x;
                    self.kern = 0.0;
                }
                Token::ArrayEnd => self.in_array = false,
                Token::Operator(op) if op == "ID" => lexer.skip_inline_image(),
                Token::Operator(op) => self.operator(&op)?,
            }
        }
        Ok(())
    }

    fn push_code(&mut self, code: u8) {
        let code = match self.current_font() {
            Some(font) if font.map_in_place => font.remap.as_ref().map_or(code, |m| m[code as usize]),
            _ => code,
        };
        if code == 0 {
            return;
        }
        if self.ctx.format.is_markup() && matches!(code, b'\\' | b'{' | b'}') {
            self.chunk.push(b'\\');
        }
        self.chunk.push(code);
    }

    /// Called before each string's bytes are appended. Inside a `TJ` array
    /// the pending kerning is turned into spaces or into a new run.
    fn begin_string(&mut self) -> Result<()> {
        if !self.in_array {
            return Ok(());
        }
        let kern = std::mem::take(&mut self.kern);
        let floor = if self.ctx.relaxed_spacing { -1.0 } else { -500.0 };
        if self.chunk.is_empty() || kern >= floor {
            return Ok(());
        }

        let delta = -kern;
        let font = self.current_font();
        let has_widths = font.is_some_and(Font::has_widths);
        let space = font
            .filter(|f| f.has_widths())
            .map(|f| f.width(b' '))
            .filter(|w| *w > 0.0)
            .unwrap_or(1000.0);

        if has_widths && delta > 4.0 * space {
            let chunk_width = font.map_or(0.0, |f| f.text_width(&self.chunk));
            self.flush_shown()?;
            self.x += self.f * self.fs * self.h_scale * (chunk_width - kern) / 1000.0;
            return Ok(());
        }

        // a page row never holds more than MAX_GRID cells
        let mut spaces = ((delta / space).round() as usize).min(MAX_GRID as usize);
        if self.ctx.relaxed_spacing {
            spaces = spaces.max(1);
        }
        self.chunk.try_reserve(spaces)?;
        self.chunk.extend(std::iter::repeat_n(b' ', spaces));
        Ok(())
    }

    /// Emit the pending chunk at the baseline raised by the text rise.
    fn flush_shown(&mut self) -> Result<()> {
        if self.chunk.is_empty() {
            return Ok(());
        }
        let y = self.y;
        self.y += self.f * self.rise;
        let result = self.process_chunk();
        self.y = y;
        result
    }

    fn next_line(&mut self) {
        if fequal(self.leading, 0.0) {
            self.y -= self.f;
        } else {
            self.y -= self.f * self.leading;
        }
    }

    fn move_text(&mut self, tx: f64, ty: f64) {
        if self.line_x.abs() < EPS {
            self.line_x = self.x + self.scale * self.dx;
        }
        self.x = self.line_x + self.f * tx;
        self.y += self.f * ty;
        self.line_x = self.x;
    }

    fn operator(&mut self, op: &str) -> Result<()> {
        let ops = self.operands;
        match op {
            "BT" => {
                self.init_metrics();
                self.in_text = true;
            }
            "ET" => self.in_text = false,
            "Tf" => {
                self.fs = ops[0];
                self.font = self.last_name.as_deref().and_then(|name| self.ctx.fonts.lookup(name));
                if self.font.is_none() {
                    trace!(name = ?self.last_name, "unknown font resource");
                }
            }
            "Tc" => self.char_spacing = ops[0],
            "Tw" => self.word_spacing = ops[0],
            "TL" => self.leading = ops[0],
            "Ts" => self.rise = ops[0],
            "Tz" => self.h_scale = ops[0] / 100.0,
            "Tm" => {
                self.flush_shown()?;
                self.f = self.scale * ops[2];
                self.x = self.scale * (self.dx + ops[1]);
                if self.f < 0.0 {
                    self.y = self.dy - self.scale * ops[0];
                    self.f = -self.f;
                } else {
                    self.y = self.dy + self.scale * ops[0];
                }
                self.line_x = self.x;
            }
            "Td" => {
                self.flush_shown()?;
                self.move_text(ops[1], ops[0]);
            }
            "TD" => {
                self.flush_shown()?;
                self.leading = -ops[0];
                self.move_text(ops[1], ops[0]);
            }
            "T*" => {
                self.flush_shown()?;
                self.next_line();
            }
            "Tj" => self.flush_shown()?,
            "TJ" => {
                self.flush_shown()?;
                self.x = self.array_x;
            }
            "'" => {
                self.y -= self.f * self.leading;
                self.flush_shown()?;
            }
            "\"" => {
                self.char_spacing = ops[0];
                self.word_spacing = ops[1];
                self.y -= self.f * self.leading;
                self.flush_shown()?;
            }
            "q" => {
                if self.saves.len() < MAX_Q_DEPTH {
                    self.saves.push(SavedTransform {
                        scale: self.scale,
                        dx: self.dx,
                        dy: self.dy,
                    });
                }
            }
            "Q" => {
                if let Some(saved) = self.saves.pop() {
                    self.scale = saved.scale;
                    self.dx = saved.dx;
                    self.dy = saved.dy;
                }
            }
            "cm" => {
                self.scale *= ops[5];
                self.dx += ops[1];
                self.dy += ops[0];
            }
            "Do" => self.invoke_form()?,
            _ => {}
        }
        Ok(())
    }

    fn invoke_form(&mut self) -> Result<()> {
        let Some(name) = self.last_name.clone() else {
            return Ok(());
        };
        let xobjects = self.ctx.xobjects;
        let Some(data) = xobjects.get(&name) else {
            return Ok(());
        };
        if self.form_depth >= MAX_Q_DEPTH {
            debug!(%name, "form nesting too deep, skipped");
            return Ok(());
        }

        let pushed = self.saves.len() < MAX_Q_DEPTH;
        if pushed {
            self.saves.push(SavedTransform {
                scale: self.scale,
                dx: self.dx,
                dy: self.dy,
            });
        }
        self.form_depth += 1;
        let result = self.execute(data);
        self.form_depth -= 1;
        if pushed {
            if let Some(saved) = self.saves.pop() {
                self.scale = saved.scale;
                self.dx = saved.dx;
                self.dy = saved.dy;
            }
        }
        result
    }
}
