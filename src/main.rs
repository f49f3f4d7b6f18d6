use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use pdf_layout_text::{ConversionSession, ConvertError, ConvertOptions, LopdfDocument, Newline, OutputFormat};
use tracing::{debug, info};

/// Output type of the conversion.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputType {
    /// 7-bit text
    Ascii,
    /// Mac Roman text (default)
    #[default]
    Text,
    /// Page dictionaries as XML
    Xml,
    /// Page dictionaries as an Apple property list
    Plist,
    Html,
    Rtf,
    /// RTF with page margins and sections for word processors
    Word,
}

impl From<OutputType> for OutputFormat {
    fn from(t: OutputType) -> Self {
        match t {
            OutputType::Ascii => OutputFormat::Ascii,
            OutputType::Text => OutputFormat::PlainText,
            OutputType::Xml => OutputFormat::Xml,
            OutputType::Plist => OutputFormat::PropertyList,
            OutputType::Html => OutputFormat::Html,
            OutputType::Rtf => OutputFormat::Rtf,
            OutputType::Word => OutputFormat::RtfWord,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LineEnding {
    Unix,
    Mac,
    Dos,
}

impl From<LineEnding> for Newline {
    fn from(l: LineEnding) -> Self {
        match l {
            LineEnding::Unix => Newline::Unix,
            LineEnding::Mac => Newline::Mac,
            LineEnding::Dos => Newline::Dos,
        }
    }
}

/// Convert a PDF to text, RTF or HTML, keeping its columns and tab stops.
#[derive(Parser, Debug)]
#[command(name = "pdf-layout-text")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PDF file to convert
    file: PathBuf,

    /// Type of output to generate
    #[arg(short = 't', long = "type", value_enum)]
    output_type: Option<OutputType>,

    /// Write output to FILE instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Line endings for text and HTML output
    #[arg(long, value_enum)]
    newline: Option<LineEnding>,

    /// Strip padding whitespace
    #[arg(long, action = ArgAction::SetTrue)]
    strip: bool,

    /// Join wrapped lines back into paragraphs
    #[arg(long, action = ArgAction::SetTrue)]
    rewrap: bool,

    /// Keep widely spaced glyphs apart
    #[arg(long, action = ArgAction::SetTrue)]
    relaxed: bool,

    /// Do not pad small gaps between runs
    #[arg(long, action = ArgAction::SetTrue)]
    tight: bool,

    /// Keep content stream order instead of sorting by position
    #[arg(long = "no-sort", action = ArgAction::SetTrue)]
    no_sort: bool,

    /// Mark page breaks in the output
    #[arg(long = "show-breaks", action = ArgAction::SetTrue)]
    show_breaks: bool,

    /// Convert at most three pages
    #[arg(long, action = ArgAction::SetTrue)]
    restricted: bool,

    /// First page to convert (1-based)
    #[arg(long = "first-page")]
    first_page: Option<usize>,

    /// Last page to convert (1-based)
    #[arg(long = "last-page")]
    last_page: Option<usize>,

    /// Password for encrypted documents
    #[arg(short = 'P', long)]
    password: Option<String>,

    /// JSON file with conversion options; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short = 'v', long, action = ArgAction::SetTrue)]
    verbose: bool,
}

impl Args {
    fn options(&self) -> Result<ConvertOptions, ConvertError> {
        let mut opts = match &self.config {
            Some(path) => ConvertOptions::from_json_file(path)?,
            None => ConvertOptions::default(),
        };
        if let Some(t) = self.output_type {
            opts.format = t.into();
        }
        if let Some(n) = self.newline {
            opts.newline = n.into();
        }
        opts.pad_strip |= self.strip;
        opts.rewrap |= self.rewrap;
        opts.relaxed_spacing |= self.relaxed;
        opts.tight_spacing |= self.tight;
        opts.sort &= !self.no_sort;
        opts.show_breaks |= self.show_breaks;
        opts.restricted |= self.restricted;
        opts.first_page = self.first_page.or(opts.first_page);
        opts.last_page = self.last_page.or(opts.last_page);
        opts.prompt_for_password |= self.password.is_some();
        if opts.title.is_none() {
            opts.title = self.file.file_name().map(|n| n.to_string_lossy().into_owned());
        }
        Ok(opts)
    }
}

fn run(args: &Args) -> Result<(), ConvertError> {
    let opts = args.options()?;
    info!(file = %args.file.display(), format = ?opts.format, "converting");

    let mut doc = LopdfDocument::open(&args.file)?;
    let mut session = ConversionSession::new(opts);
    if let Some(password) = args.password.clone() {
        let mut offered = false;
        session = session.with_password_prompt(Box::new(move || {
            // a wrong password is not retried
            if offered {
                return None;
            }
            offered = true;
            Some(password.clone())
        }));
    }

    let output = session.convert(&mut doc)?;
    debug!(bytes = output.len(), "conversion finished");

    match &args.output {
        Some(path) => {
            fs::write(path, &output)?;
            eprintln!("Output written to: {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&output)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(path) = &args.output {
                // never leave a partial file behind
                let _ = fs::remove_file(path);
            }
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
