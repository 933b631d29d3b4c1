//! OpenBabel engine: format conversion, rendering and file-based structure
//! search through the `obabel` command-line tool.

use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use base64::Engine as _;
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use chemlink_core::defaults::{FAST_SEARCH_MAX_HITS, OBABEL_BANNER_PATTERN, OBABEL_PROGRAM};
use chemlink_core::{
    input_preview, ConversionRequest, Error, ImageFormat, RenderRequest, Result, SearchType,
    StructureMatcher,
};

use crate::command::CommandRunner;

/// Extension obabel uses to select its fastsearch index format.
const FAST_INDEX_EXTENSION: &str = "fs";

/// Handle to the `obabel` executable.
#[derive(Debug, Clone)]
pub struct OpenBabel {
    program: String,
    runner: CommandRunner,
    banner: Regex,
}

impl OpenBabel {
    pub fn new(program: impl Into<String>, runner: CommandRunner) -> Result<Self> {
        let banner = Regex::new(OBABEL_BANNER_PATTERN)
            .map_err(|e| Error::Config(format!("Invalid obabel banner pattern: {}", e)))?;
        Ok(Self {
            program: program.into(),
            runner,
            banner,
        })
    }

    /// Program from `OBABEL_PATH` (default `obabel`), timeout from the environment.
    pub fn from_env() -> Result<Self> {
        let program = std::env::var("OBABEL_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| OBABEL_PROGRAM.to_string());
        Self::new(program, CommandRunner::from_env())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// obabel prints its banner instead of data when it could not process
    /// the input.
    pub fn is_failure_output(&self, output: &str) -> bool {
        self.banner.is_match(output)
    }

    /// Check that the installed obabel is a 3.x release.
    ///
    /// Returns the matched banner. Any other response is `Error::Config`.
    pub async fn verify_version(&self) -> Result<String> {
        info!(
            subsystem = "engine",
            component = "openbabel",
            program = %self.program,
            "Checking OpenBabel version compatibility"
        );
        let no_args: [&str; 0] = [];
        let output = self.runner.capture(&self.program, &no_args).await?;
        let combined = format!("{}\n{}", output.joined(), output.stderr);
        match self.banner.find(&combined) {
            Some(found) => Ok(found.as_str().trim().to_string()),
            None => Err(Error::Config(format!(
                "OpenBabel version isn't 3.X.X so may be incompatible ({})",
                self.program
            ))),
        }
    }

    /// Convert with an explicit input format.
    ///
    /// Returns `Ok(None)` when obabel produced nothing usable.
    pub async fn convert(&self, request: &ConversionRequest) -> Result<Option<String>> {
        if !request.has_input_format() {
            debug!(
                subsystem = "engine",
                component = "openbabel",
                "No input format given, skipping obabel conversion"
            );
            return Ok(None);
        }

        let input = write_input(&request.input, &request.input_format)?;
        let args = vec![
            format!("-i{}", request.input_format.trim()),
            input.path().to_string_lossy().into_owned(),
            format!("-o{}", request.output_format.trim()),
        ];
        let output = self.runner.capture(&self.program, &args).await?;
        if !output.success {
            warn!(
                subsystem = "engine",
                component = "openbabel",
                op = "convert",
                input = %request.preview(),
                error = %output.stderr.trim(),
                "obabel exited unsuccessfully"
            );
            return Ok(None);
        }

        let converted = output.joined();
        if converted.trim().is_empty() || self.is_failure_output(&converted) {
            debug!(
                subsystem = "engine",
                component = "openbabel",
                op = "convert",
                output_format = %request.output_format,
                "obabel produced no usable output"
            );
            return Ok(None);
        }
        Ok(Some(converted))
    }

    /// Render to PNG or SVG from the original input format.
    pub async fn render(&self, request: &RenderRequest) -> Result<Option<Vec<u8>>> {
        if request.input_format.trim().is_empty() {
            debug!(
                subsystem = "engine",
                component = "openbabel",
                op = "render",
                "No input format given, obabel cannot render"
            );
            return Ok(None);
        }

        let input = write_input(&request.input, &request.input_format)?;
        let out_dir = tempfile::tempdir()?;
        let format = request.format.render_format();
        let out_path = out_dir.path().join(format!("structure.{}", format.extension()));

        let mut args = vec![
            format!("-i{}", request.input_format.trim()),
            input.path().to_string_lossy().into_owned(),
            "-O".to_string(),
            out_path.to_string_lossy().into_owned(),
        ];
        if format == ImageFormat::Png {
            args.push("-xp".to_string());
            args.push(request.size.width.to_string());
        }

        let output = self.runner.capture(&self.program, &args).await?;
        if !output.success {
            warn!(
                subsystem = "engine",
                component = "openbabel",
                op = "render",
                input = %input_preview(&request.input),
                error = %output.stderr.trim(),
                "obabel exited unsuccessfully"
            );
            return Ok(None);
        }

        match tokio::fs::read(&out_path).await {
            Ok(bytes) if !bytes.is_empty() => Ok(Some(bytes)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Raw bytes handed to obabel. CDX is a binary format and travels base64-encoded.
fn input_bytes(input: &str, input_format: &str) -> Vec<u8> {
    if input_format.trim().eq_ignore_ascii_case("cdx") {
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        if let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(compact) {
            return decoded;
        }
    }
    input.as_bytes().to_vec()
}

fn write_input(input: &str, input_format: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("chemlink-")
        .suffix(".tmp")
        .tempfile()?;
    file.write_all(&input_bytes(input, input_format))?;
    file.flush()?;
    Ok(file)
}

/// `-s` argument for obabel's structure filter.
fn search_filter(term: &str, search_type: SearchType) -> String {
    match search_type {
        SearchType::Exact => format!("-s{} exact", term.trim()),
        SearchType::Substructure => format!("-s{}", term.trim()),
    }
}

#[async_trait]
impl StructureMatcher for OpenBabel {
    fn name(&self) -> &'static str {
        "openbabel"
    }

    async fn search(
        &self,
        file: &Path,
        term: &str,
        search_type: SearchType,
    ) -> Result<Vec<String>> {
        let mut args = vec![file.to_string_lossy().into_owned()];
        let is_fast_index = file
            .extension()
            .map(|ext| ext == FAST_INDEX_EXTENSION)
            .unwrap_or(false);
        if is_fast_index {
            args.push("-al".to_string());
            args.push(FAST_SEARCH_MAX_HITS.to_string());
        }
        args.push("-osmi".to_string());
        args.push("-xt".to_string());
        args.push(search_filter(term, search_type));

        debug!(
            subsystem = "engine",
            component = "openbabel",
            op = "search",
            file = %file.display(),
            "Searching structure file"
        );
        let output = self.runner.capture(&self.program, &args).await?;
        if !output.success {
            warn!(
                subsystem = "engine",
                component = "openbabel",
                op = "search",
                file = %file.display(),
                error = %output.stderr.trim(),
                "obabel search exited unsuccessfully"
            );
        }
        Ok(output
            .stdout
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect())
    }

    async fn build_index(&self, source: &Path, target: &Path) -> Result<()> {
        info!(
            subsystem = "engine",
            component = "openbabel",
            op = "build_index",
            source = %source.display(),
            target = %target.display(),
            "Building fastsearch index"
        );
        let args = vec![
            source.to_string_lossy().into_owned(),
            "-O".to_string(),
            target.to_string_lossy().into_owned(),
            "-u".to_string(),
        ];
        self.runner.run(&self.program, &args).await?;
        Ok(())
    }
}
