// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for gpt2html.
//!
//! This binary provides the `gpt2html` command for converting ChatGPT
//! conversation exports from JSON to HTML or Markdown documents.

use gpt2html::export::{self, HtmlOptions, Theme};
use gpt2html::parser;
use gpt2html::renderer::AssetMap;
use lexopt::prelude::*;
use snafu::{OptionExt, ensure, prelude::*};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// Where to write the rendered output.
#[derive(Clone)]
enum OutputTarget {
    /// Write each file to the specified directory.
    Directory(PathBuf),
    /// Write to stdout.
    Stdout,
}

/// The export format to produce.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Format {
    Html,
    Markdown,
}

impl Format {
    const fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "md",
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(Self::Html),
            "md" | "markdown" => Ok(Self::Markdown),
            other => Err(format!("unknown format '{other}' (expected html or md)")),
        }
    }
}

#[allow(clippy::struct_excessive_bools)]
struct Cli {
    input: Vec<PathBuf>,
    output: OutputTarget,
    format: Format,
    theme: Theme,
    pdf_mode: bool,
    title: Option<String>,
    assets: Option<PathBuf>,
    quiet: bool,
    dry_run: bool,
    force: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("at least one input file or directory is required"))]
    NoInputFiles,

    #[snafu(display("cannot output multiple files to stdout"))]
    MultipleFilesToStdout,

    #[snafu(display("failed to create output directory: {source}"))]
    CreateOutputDir { source: std::io::Error },

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse {}: {source}", path.display()))]
    ParseFile {
        path: PathBuf,
        source: parser::ParseError,
    },

    #[snafu(display("failed to parse asset map {}: {source}", path.display()))]
    ParseAssets {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("cannot export {}: {source}", path.display()))]
    Export {
        path: PathBuf,
        source: export::ExportError,
    },

    #[snafu(display("invalid input filename: no file stem"))]
    InvalidFilename,

    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn print_help() {
    println!(
        "\
{name} {version}
Convert ChatGPT conversation exports to HTML and Markdown

Usage: {name} [OPTIONS] -o <OUTPUT> <INPUT>...

Arguments:
  <INPUT>...  Input JSON files or directories containing exports

Options:
  -o, --output <OUTPUT>  Output directory (or - for stdout)
  -F, --format <FORMAT>  Output format: html or md (default: html)
      --theme <THEME>    Color scheme: light or dark (default: light)
      --pdf-mode         Enable page-break styles for PDF capture
      --title <TITLE>    Override the document title
      --assets <FILE>    JSON file mapping asset ids to image sources
                         (data URIs or URLs), fetched out of band

Other options:
  -q, --quiet            Suppress progress messages
  -n, --dry-run          Show what would be processed without writing
  -f, --force            Overwrite existing output files
  -h, --help             Print help
  -V, --version          Print version",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
    );
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    // Show help if no arguments provided
    if std::env::args().len() == 1 {
        print_help();
        std::process::exit(0);
    }

    let mut input = Vec::new();
    let mut output: Option<OutputTarget> = None;
    let mut format = Format::Html;
    let mut theme = Theme::Light;
    let mut pdf_mode = false;
    let mut title = None;
    let mut assets = None;
    let mut quiet = false;
    let mut dry_run = false;
    let mut force = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('o') | Long("output") => {
                let val: PathBuf = parser.value()?.parse()?;
                output = Some(if val == Path::new("-") {
                    OutputTarget::Stdout
                } else {
                    OutputTarget::Directory(val)
                });
            }
            Short('F') | Long("format") => format = parser.value()?.parse()?,
            Long("theme") => theme = parser.value()?.parse()?,
            Long("pdf-mode") => pdf_mode = true,
            Long("title") => title = Some(parser.value()?.string()?),
            Long("assets") => assets = Some(parser.value()?.parse()?),
            Short('q') | Long("quiet") => quiet = true,
            Short('n') | Long("dry-run") => dry_run = true,
            Short('f') | Long("force") => force = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) => input.push(val.parse()?),
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Cli {
        input,
        output: output.ok_or("missing required option: --output")?,
        format,
        theme,
        pdf_mode,
        title,
        assets,
        quiet,
        dry_run,
        force,
    })
}

fn main() -> Result<(), Error> {
    let cli = parse_args().context(ParseArgsSnafu)?;

    ensure!(!cli.input.is_empty(), NoInputFilesSnafu);

    let assets = load_assets(cli.assets.as_deref())?;
    let files = collect_input_files(&cli.input);

    match &cli.output {
        OutputTarget::Stdout => {
            // Without a directory, we can only output one file to stdout
            ensure!(files.len() == 1, MultipleFilesToStdoutSnafu);
            process_to_stdout(&files[0], &cli, &assets)?;
        }
        OutputTarget::Directory(dir) => {
            if !cli.dry_run {
                std::fs::create_dir_all(dir).context(CreateOutputDirSnafu)?;
            }
            for file in &files {
                process_file(file, dir, &cli, &assets)?;
            }
        }
    }

    Ok(())
}

/// Loads the externally-fetched asset map, when one was given.
fn load_assets(path: Option<&Path>) -> Result<AssetMap, Error> {
    let Some(path) = path else {
        return Ok(AssetMap::new());
    };
    let json = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
    let map: HashMap<String, String> =
        serde_json::from_str(&json).context(ParseAssetsSnafu { path })?;
    Ok(AssetMap::from(map))
}

/// Collects all JSON files from the given inputs (files and directories).
fn collect_input_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            {
                files.push(entry.path().to_path_buf());
            }
        } else {
            files.push(input.clone());
        }
    }
    files
}

/// Renders one input file to a document string in the selected format.
fn render_document(input: &Path, cli: &Cli, assets: &AssetMap) -> Result<String, Error> {
    let json = std::fs::read_to_string(input).context(ReadFileSnafu { path: input })?;
    let conversation = parser::parse_conversation(&json).context(ParseFileSnafu { path: input })?;

    match cli.format {
        Format::Html => {
            let opts = HtmlOptions {
                title: cli.title.clone(),
                theme: cli.theme,
                pdf_mode: cli.pdf_mode,
            };
            export::export_html(&conversation, &opts, assets)
                .context(ExportSnafu { path: input })
        }
        Format::Markdown => export::export_markdown(&conversation, cli.title.as_deref())
            .context(ExportSnafu { path: input }),
    }
}

/// Processes a single file and outputs to stdout.
fn process_to_stdout(input: &Path, cli: &Cli, assets: &AssetMap) -> Result<(), Error> {
    if cli.dry_run {
        eprintln!("Would output {}", input.display());
        return Ok(());
    }

    let document = render_document(input, cli, assets)?;
    print!("{document}");
    Ok(())
}

/// Processes a single file and writes to the output directory.
fn process_file(input: &Path, out_dir: &Path, cli: &Cli, assets: &AssetMap) -> Result<(), Error> {
    let out_name = input.file_stem().context(InvalidFilenameSnafu)?;
    let out_path = out_dir.join(format!(
        "{}.{}",
        out_name.to_string_lossy(),
        cli.format.extension()
    ));

    // Handle dry-run mode
    if cli.dry_run {
        eprintln!("Would write {}", out_path.display());
        return Ok(());
    }

    // Check if output exists and handle overwrite
    if out_path.exists() && !cli.force {
        eprintln!(
            "Skipping {} (already exists, use --force to overwrite)",
            out_path.display()
        );
        return Ok(());
    }

    let document = render_document(input, cli, assets)?;
    std::fs::write(&out_path, &document).context(WriteFileSnafu { path: &out_path })?;

    if !cli.quiet {
        eprintln!("Wrote {}", out_path.display());
    }
    Ok(())
}
