// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bindery — command-line PDF workbench.
//
// Thin front end over the bindery-document engine: reads input files, runs
// one of the five operations, and writes the resulting byte streams into the
// output directory. All document logic lives in the engine; this binary only
// does file I/O and error presentation.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;

use bindery_core::config::AppConfig;
use bindery_core::error::{BinderyError, Result};
use bindery_core::human_errors::humanize_error;
use bindery_document::{OperationOutput, images_to_pdf, merge, pdf_to_images, split, unlock};

#[derive(Parser)]
#[command(
    name = "bindery",
    version,
    about = "PDF workbench: merge, split, rasterise pages, compose from images, unlock"
)]
struct Cli {
    /// Output directory; created if it does not exist.
    #[arg(long, short, global = true, default_value = ".")]
    out: PathBuf,

    /// JSON settings file (output naming convention). Defaults apply when
    /// omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Combine two or more PDFs into one, in argument order.
    Merge {
        /// Input PDF files.
        inputs: Vec<PathBuf>,
    },
    /// Split a PDF into one file per page (page_001.pdf, ...).
    Split {
        /// Input PDF file.
        input: PathBuf,
    },
    /// Render each page of a PDF to a JPEG image (page_001.jpg, ...).
    #[command(alias = "pdf2img")]
    PdfToImages {
        /// Input PDF file.
        input: PathBuf,
    },
    /// Compose a PDF out of JPEG/PNG images, one page per image.
    #[command(alias = "img2pdf")]
    ImagesToPdf {
        /// Input image files; `.png` is read as PNG, everything else as JPEG.
        inputs: Vec<PathBuf>,
    },
    /// Remove password protection by re-rendering every page.
    Unlock {
        /// Input PDF file.
        input: PathBuf,
        /// Password of the encrypted document.
        #[arg(long, short)]
        password: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        let human = humanize_error(&err);
        eprintln!("error: {}", human.message);
        eprintln!("{}", human.suggestion);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => serde_json::from_slice(&fs::read(path)?)?,
        None => AppConfig::default(),
    };
    let naming = config.naming;

    let outputs = match cli.command {
        Command::Merge { inputs } => {
            let bytes = read_inputs(&inputs)?;
            vec![merge(&bytes, &naming)?]
        }
        Command::Split { input } => split(&[fs::read(&input)?], &naming)?,
        Command::PdfToImages { input } => pdf_to_images(&[fs::read(&input)?], &naming)?,
        Command::ImagesToPdf { inputs } => {
            let mut named = Vec::with_capacity(inputs.len());
            for path in &inputs {
                named.push((file_name(path), fs::read(path)?));
            }
            vec![images_to_pdf(&named, &naming)?]
        }
        Command::Unlock { input, password } => {
            vec![unlock(&[fs::read(&input)?], &password, &naming)?]
        }
    };

    persist(&cli.out, &outputs)
}

/// Write every output into `dir`, overwriting same-named files.
fn persist(dir: &Path, outputs: &[OperationOutput]) -> Result<()> {
    // create_dir_all succeeds when the directory already exists.
    fs::create_dir_all(dir)?;
    for output in outputs {
        let path = dir.join(&output.name);
        fs::write(&path, &output.bytes)?;
        info!(path = %path.display(), bytes = output.bytes.len(), "output written");
        println!("{}", path.display());
    }
    Ok(())
}

fn read_inputs(paths: &[PathBuf]) -> Result<Vec<Vec<u8>>> {
    paths
        .iter()
        .map(|path| fs::read(path).map_err(BinderyError::Io))
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn persist_tolerates_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = vec![OperationOutput {
            name: "out.bin".into(),
            bytes: vec![1, 2, 3],
        }];
        // Second call hits the already-existing directory and must succeed.
        persist(dir.path(), &outputs).unwrap();
        persist(dir.path(), &outputs).unwrap();
        assert_eq!(fs::read(dir.path().join("out.bin")).unwrap(), vec![1, 2, 3]);
    }
}
