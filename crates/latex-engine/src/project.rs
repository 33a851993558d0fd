//! Whole-project conversion driven by a `.latexmkrc` manifest
//!
//! Instead of a single synthesized input file, a project compile runs
//! latexmk once over a pre-populated directory. The `.latexmkrc` file
//! declares the entry points; each one must yield a PDF or the compile is
//! an infrastructure failure naming the missing file.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, instrument};

use crate::artifact::encode_data_url;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::log::extract_compile_log;
use crate::process::CommandRunner;
use crate::toolchain::{build_project_cmdline, Compiler};

/// Build-configuration file name latexmk reads from the project root.
pub const LATEXMKRC: &str = ".latexmkrc";

lazy_static! {
    /// Matches `@default_files = ('main.tex');` and the multi-file form
    /// `@default_files = ('a.tex', 'b.tex');`.
    static ref DEFAULT_FILES_RE: Regex = Regex::new(r"@default_files\s*=\s*\((.*)\);").unwrap();
}

/// Entry points declared in the project's `.latexmkrc`.
///
/// Comment lines are ignored and the first matching declaration wins, so
/// a stray second declaration further down cannot silently change the
/// build.
pub fn default_files(dir: &Path) -> Result<Vec<String>, EngineError> {
    let rc_path = dir.join(LATEXMKRC);
    let content = std::fs::read_to_string(&rc_path)
        .map_err(|e| EngineError::BuildConfig(format!("{}: {}", rc_path.display(), e)))?;

    parse_default_files(&content).ok_or_else(|| {
        EngineError::BuildConfig(format!(
            "no @default_files declaration in {}",
            rc_path.display()
        ))
    })
}

fn parse_default_files(content: &str) -> Option<Vec<String>> {
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(caps) = DEFAULT_FILES_RE.captures(line) {
            let files = caps[1]
                .replace(['\'', '"'], "")
                .split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect();
            return Some(files);
        }
    }
    None
}

/// Compile a whole project directory and map every declared entry point
/// to its produced PDF.
#[instrument(skip(runner, config), fields(dir = %dir.display()))]
pub async fn convert_project(
    dir: &Path,
    compiler: Option<Compiler>,
    runner: &dyn CommandRunner,
    config: &EngineConfig,
) -> Result<BTreeMap<String, PathBuf>, EngineError> {
    let entries = default_files(dir)?;
    if entries.is_empty() {
        return Err(EngineError::BuildConfig(
            "empty @default_files declaration".to_string(),
        ));
    }
    info!(entries = ?entries, "compiling project");

    let cmdline = build_project_cmdline(compiler, config.latexmk_path.as_deref());
    let output = runner.run(&cmdline, dir, config.timeout()).await?;

    if !output.success() {
        let log = latest_log_file(dir).and_then(|p| std::fs::read_to_string(p).ok());
        return Err(match log {
            Some(log) => EngineError::Compile(extract_compile_log(&log)),
            None => EngineError::Toolchain(format!(
                "{}no log produced when executing '{}'",
                prefixed(&output.stderr),
                cmdline.join(" ")
            )),
        });
    }

    let mut produced = BTreeMap::new();
    for entry in &entries {
        let pdf_name = Path::new(entry).with_extension("pdf");
        let pdf_path = dir.join(&pdf_name);
        if !pdf_path.is_file() {
            return Err(EngineError::MissingOutput(
                pdf_name.display().to_string(),
            ));
        }
        produced.insert(entry.clone(), pdf_path);
    }
    Ok(produced)
}

/// Like [`convert_project`], but encode each produced PDF as a data URL.
pub async fn project_data_urls(
    dir: &Path,
    compiler: Option<Compiler>,
    runner: &dyn CommandRunner,
    config: &EngineConfig,
) -> Result<BTreeMap<String, String>, EngineError> {
    let produced = convert_project(dir, compiler, runner, config).await?;
    produced
        .into_iter()
        .map(|(entry, path)| Ok((entry, encode_data_url(&path)?)))
        .collect()
}

/// Most recently modified `.log` file in the directory. With several
/// entry points latexmk leaves one log per engine run; the newest one
/// holds the failure that stopped the build.
pub fn latest_log_file(dir: &Path) -> Option<PathBuf> {
    let mut logs: Vec<(PathBuf, SystemTime)> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "log"))
        .filter_map(|e| {
            let modified = e.metadata().ok()?.modified().ok()?;
            Some((e.path(), modified))
        })
        .collect();

    logs.sort_by_key(|(_, modified)| *modified);
    logs.pop().map(|(path, _)| path)
}

fn prefixed(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!("{} ", stderr)
    }
}
