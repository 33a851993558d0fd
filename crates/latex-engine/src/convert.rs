//! Single-source conversion orchestration
//!
//! A [`TexConverter`] owns one compile attempt: it creates a scoped
//! working directory, writes the source, drives latexmk through a
//! [`CommandRunner`], and classifies the outcome. The working directory is
//! removed on every path, success or failure, unless debug mode is on.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, instrument, warn};

use crate::artifact::encode_data_url;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::key::{derive_key, CompileKey, KEY_SCHEME_VERSION};
use crate::log::extract_compile_log;
use crate::process::CommandRunner;
use crate::toolchain::{build_cmdline, Compiler, OutputFormat};

/// One compile submission. Lives only for the duration of a single call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileRequest {
    /// Full LaTeX source text.
    pub source: String,
    #[serde(default)]
    pub compiler: Compiler,
    /// Explicit key overriding derivation.
    #[serde(default)]
    pub key: Option<CompileKey>,
    /// Output fields the caller wants back (e.g. `data_url`).
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    /// Recompile even when a persisted record exists for the key.
    #[serde(default)]
    pub force_overwrite: bool,
}

impl CompileRequest {
    pub fn new(source: impl Into<String>, compiler: Compiler) -> Self {
        Self {
            source: source.into(),
            compiler,
            key: None,
            fields: None,
            force_overwrite: false,
        }
    }
}

/// A successful compile; holds the working directory open until the
/// artifact has been consumed.
#[derive(Debug)]
pub struct CompiledFile {
    pub path: PathBuf,
    pub format: OutputFormat,
    // Dropped (and the directory removed) with the value; `None` when
    // debug mode already released the directory for inspection.
    _workdir: Option<TempDir>,
}

/// Converts a single LaTeX source into a compiled artifact.
#[derive(Debug)]
pub struct TexConverter {
    source: String,
    key: CompileKey,
    compiler: Compiler,
    config: EngineConfig,
}

impl TexConverter {
    /// Validate a request and fix its compile key.
    pub fn new(request: CompileRequest, config: EngineConfig) -> Result<Self, EngineError> {
        let source = request.source.trim().to_string();
        if source.is_empty() {
            return Err(EngineError::EmptySource);
        }
        let compiler = request.compiler;
        let key = request.key.unwrap_or_else(|| {
            derive_key(&source, compiler, compiler.output_format(), KEY_SCHEME_VERSION)
        });
        Ok(Self {
            source,
            key,
            compiler,
            config,
        })
    }

    pub fn key(&self) -> &CompileKey {
        &self.key
    }

    /// Run the toolchain once and classify the outcome. Never retries.
    #[instrument(skip(self, runner), fields(key = %self.key, compiler = %self.compiler))]
    pub async fn compile(&self, runner: &dyn CommandRunner) -> Result<CompiledFile, EngineError> {
        let workdir = tempfile::Builder::new().prefix("latex_").tempdir()?;

        match self.compile_in(runner, workdir.path()).await {
            Ok(path) => Ok(CompiledFile {
                path,
                format: self.compiler.output_format(),
                _workdir: self.retain(workdir),
            }),
            Err(e) => {
                self.release(workdir);
                Err(e)
            }
        }
    }

    /// Compile and encode the output as a data URL; the working directory
    /// is gone by the time this returns.
    pub async fn data_url(&self, runner: &dyn CommandRunner) -> Result<String, EngineError> {
        let compiled = self.compile(runner).await?;
        encode_data_url(&compiled.path)
    }

    async fn compile_in(
        &self,
        runner: &dyn CommandRunner,
        dir: &Path,
    ) -> Result<PathBuf, EngineError> {
        let tex_path = dir.join(format!("{}.tex", self.key));
        std::fs::write(&tex_path, self.source.as_bytes())?;

        let cmdline = build_cmdline(self.compiler, &tex_path, self.config.latexmk_path.as_deref());
        let output = runner.run(&cmdline, dir, self.config.timeout()).await?;

        if !output.success() {
            let log_path = tex_path.with_extension("log");
            return Err(match std::fs::read_to_string(&log_path) {
                Ok(log) => EngineError::Compile(extract_compile_log(&log)),
                // No log file: the failure happened before TeX got going.
                Err(_) => EngineError::Toolchain(output.stderr.trim().to_string()),
            });
        }

        let format = self.compiler.output_format();
        let out_path = tex_path.with_extension(format.extension());
        if !out_path.is_file() {
            let stderr = output.stderr.trim();
            return Err(EngineError::NoOutput {
                format: format.to_string(),
                detail: if stderr.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", stderr)
                },
            });
        }

        Ok(out_path)
    }

    /// Keep the directory alive for the success path; in debug mode it is
    /// released to disk immediately so it survives artifact consumption.
    fn retain(&self, workdir: TempDir) -> Option<TempDir> {
        if self.config.debug {
            self.release(workdir);
            None
        } else {
            Some(workdir)
        }
    }

    fn release(&self, workdir: TempDir) {
        if !self.config.debug {
            // TempDir removes its directory on drop.
            return;
        }

        let path = workdir.keep();
        debug!(path = %path.display(), "debug mode: working directory preserved");

        if let Some(dump_dir) = &self.config.source_dump_dir {
            if let Err(e) = self.dump_source(dump_dir) {
                warn!(error = %e, "failed to dump source for debugging");
            }
        }
    }

    fn dump_source(&self, dump_dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dump_dir)?;
        std::fs::write(dump_dir.join(format!("{}.tex", self.key)), &self.source)
    }
}
