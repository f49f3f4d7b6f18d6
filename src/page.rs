//! Rendering one page from content stream to finished bytes.

use tracing::{debug, instrument};

use crate::content::{Interpreter, PageGeometry, RenderContext, XObjectTable};
use crate::discovery::{page_content, register_forms};
use crate::error::Result;
use crate::font::{EncoderTable, FontTable};
use crate::format::{self, Margins, OpenTags};
use crate::layout::{self, Grid, TabStops};
use crate::options::{ConvertOptions, OutputFormat};
use crate::provider::DocumentProvider;

/// Pages smaller than an inch are laid out as if they were an inch.
pub const MIN_PAGE_SIZE: f64 = 72.0;

/// Document-scoped tables shared by every page.
#[derive(Debug)]
pub struct DocumentTables {
    pub fonts: FontTable,
    pub encoders: EncoderTable,
    pub xobjects: XObjectTable,
}

impl DocumentTables {
    pub fn new(opts: &ConvertOptions) -> Self {
        Self {
            fonts: FontTable::new(),
            encoders: EncoderTable::new(opts.output_encoding()),
            xobjects: XObjectTable::new(),
        }
    }
}

/// A finished page plus what the document writer needs around it.
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub data: Vec<u8>,
    /// Page size in points after clamping.
    pub width: i64,
    pub height: i64,
    /// RTF `\tx` definitions for the page's tab stops.
    pub tabs: String,
    /// Word-processor RTF section margins.
    pub margins: Margins,
    /// HTML blockquote indent in points.
    pub html_indent: i64,
}

/// Interpret, lay out and format page `number` (1-based).
#[instrument(skip_all, fields(page = number))]
pub fn render_page(
    provider: &dyn DocumentProvider,
    number: usize,
    tables: &mut DocumentTables,
    opts: &ConvertOptions,
) -> Result<RenderedPage> {
    let page = provider.page(number)?;

    let mut geometry = PageGeometry::new(page.media_box.width, page.media_box.height);
    if let Some(crop) = page.crop_box {
        let media = page.media_box;
        if crop.width > 0.0 && crop.height > 0.0 && crop.width < media.width && crop.height < media.height {
            geometry = PageGeometry {
                width: crop.width,
                height: crop.height,
                crop_origin: Some((crop.x, crop.y)),
            };
        }
    }
    let width = geometry.width.max(MIN_PAGE_SIZE);
    let height = geometry.height.max(MIN_PAGE_SIZE);
    geometry.width = width.round();
    geometry.height = height.round();

    register_forms(provider, &page, &mut tables.xobjects);
    let content = page_content(provider, &page)?;

    let ctx = RenderContext {
        fonts: &tables.fonts,
        encoders: &tables.encoders,
        xobjects: &tables.xobjects,
        format: opts.format,
        relaxed_spacing: opts.relaxed_spacing,
    };
    let mut interpreter = Interpreter::new(&ctx, geometry);
    interpreter.run(&content)?;
    let mut page_runs = interpreter.finish();

    let mut rendered = RenderedPage {
        width: width.round() as i64,
        height: height.round() as i64,
        ..Default::default()
    };
    if page_runs.runs.is_empty() || page_runs.length == 0 {
        debug!("page has no text");
        return Ok(rendered);
    }

    let mut grid = Grid::for_page(width, height, &page_runs);
    let runs = &mut page_runs.runs;
    layout::grid::normalize(runs, &mut grid);
    if opts.sort {
        layout::grid::sort_runs(runs);
    }
    layout::grid::fit(runs, &grid);
    layout::grid::calc_lines(runs);

    let markup = opts.format.is_markup();
    let mut open = OpenTags::default();
    if markup {
        format::rtf_tags(runs, &tables.fonts, opts);
    } else if opts.format == OutputFormat::Html {
        open = format::html_tags(runs, &tables.fonts, opts);
    }

    let mut tabs = TabStops::new();
    let spacing = layout::calc_whitespace(runs, &grid, &mut tabs, opts);
    if markup {
        layout::calc_extra_tabs(runs, &grid, &mut tabs)?;
    }

    debug!(
        runs = runs.len(),
        cols = grid.cols,
        lines = grid.lines,
        tabs = tabs.len(),
        "page laid out"
    );

    let data = layout::serialize(runs, &grid, &tabs, spacing, opts)?;
    if data.is_empty() {
        return Ok(rendered);
    }

    let mut data = if opts.pad_strip { format::strip(&data) } else { format::clean(&data) };
    if opts.rewrap {
        data = format::rewrap(&data, markup);
    }
    if markup {
        let (rtf, margins) = format::page_to_rtf(&data, &grid, opts.format, opts.pad_strip);
        data = rtf;
        rendered.margins = margins;
    } else if opts.format == OutputFormat::Html {
        let (html, indent) = format::page_to_html(&data, &grid, opts.pad_strip, open);
        data = html;
        rendered.html_indent = indent;
    }
    if matches!(opts.format, OutputFormat::Ascii | OutputFormat::PlainText | OutputFormat::Html) {
        data = format::fix_newlines(data, opts.newline)?;
    }

    if markup {
        let left = if opts.format == OutputFormat::RtfWord { rendered.margins.left } else { 0 };
        rendered.tabs = tabs.rtf_definitions(grid.xs, left);
    }
    rendered.data = data;
    Ok(rendered)
}
