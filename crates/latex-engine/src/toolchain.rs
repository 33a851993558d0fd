//! Compiler toolchain table and version gating
//!
//! Every supported engine is described by a static [`ToolchainSpec`] record;
//! a single [`build_cmdline`] reads the table instead of dispatching through
//! per-compiler types. All compiles go through the latexmk driver, which in
//! turn invokes the engine binary named by the program-substitution flag.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::process::CommandRunner;

/// The build driver invoked for every compile.
pub const LATEXMK: &str = "latexmk";

/// Oldest latexmk release known to support all flags we pass.
pub const MIN_LATEXMK_VERSION: &str = "4.39";

/// Flags passed to latexmk on every invocation: shell-escape disabled,
/// non-interactive batch mode, stop at the first fatal error.
pub const LATEXMK_OPTIONS: [&str; 3] = [
    "-latexoption=-no-shell-escape",
    "-interaction=nonstopmode",
    "-halt-on-error",
];

/// Supported LaTeX engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compiler {
    Latex,
    #[default]
    Pdflatex,
    Lualatex,
    Xelatex,
}

/// Static configuration record for one engine.
#[derive(Debug, Clone, Copy)]
pub struct ToolchainSpec {
    /// Engine binary name.
    pub bin: &'static str,
    pub output_format: OutputFormat,
    /// Which latexmk `-<prog>=` flag carries the engine binary. The
    /// PDF-producing engines are all substituted through `-pdflatex=`.
    prog_repl_target: &'static str,
}

const LATEX_SPEC: ToolchainSpec = ToolchainSpec {
    bin: "latex",
    output_format: OutputFormat::Dvi,
    prog_repl_target: "latex",
};

const PDFLATEX_SPEC: ToolchainSpec = ToolchainSpec {
    bin: "pdflatex",
    output_format: OutputFormat::Pdf,
    prog_repl_target: "pdflatex",
};

const LUALATEX_SPEC: ToolchainSpec = ToolchainSpec {
    bin: "lualatex",
    output_format: OutputFormat::Pdf,
    prog_repl_target: "pdflatex",
};

const XELATEX_SPEC: ToolchainSpec = ToolchainSpec {
    bin: "xelatex",
    output_format: OutputFormat::Pdf,
    prog_repl_target: "pdflatex",
};

impl Compiler {
    pub fn spec(&self) -> &'static ToolchainSpec {
        match self {
            Compiler::Latex => &LATEX_SPEC,
            Compiler::Pdflatex => &PDFLATEX_SPEC,
            Compiler::Lualatex => &LUALATEX_SPEC,
            Compiler::Xelatex => &XELATEX_SPEC,
        }
    }

    /// Engine binary name, e.g. `"xelatex"`.
    pub fn bin(&self) -> &'static str {
        self.spec().bin
    }

    pub fn output_format(&self) -> OutputFormat {
        self.spec().output_format
    }

    /// The latexmk program-substitution flag, e.g. `-pdflatex=xelatex`.
    /// Needed when the engine is not latexmk's default or not on `$PATH`.
    pub fn prog_repl(&self) -> String {
        let spec = self.spec();
        format!("-{}={}", spec.prog_repl_target, spec.bin)
    }
}

impl std::fmt::Display for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bin())
    }
}

impl std::str::FromStr for Compiler {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latex" => Ok(Compiler::Latex),
            "pdflatex" => Ok(Compiler::Pdflatex),
            "lualatex" => Ok(Compiler::Lualatex),
            "xelatex" => Ok(Compiler::Xelatex),
            other => Err(format!("Unknown compiler: {}", other)),
        }
    }
}

/// Output format a compile produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Dvi,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Dvi => "application/x-dvi",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Dvi => "dvi",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Build the latexmk command line for a single input file.
pub fn build_cmdline(compiler: Compiler, input: &Path, latexmk_path: Option<&str>) -> Vec<String> {
    let mut args = vec![
        latexmk_path.unwrap_or(LATEXMK).to_string(),
        format!("-{}", compiler.output_format().extension()),
        compiler.prog_repl(),
    ];
    args.extend(LATEXMK_OPTIONS.iter().map(|s| s.to_string()));
    args.push(input.display().to_string());
    args
}

/// Build the latexmk command line for a whole pre-populated project
/// directory. latexmk discovers the entry points from `.latexmkrc`.
pub fn build_project_cmdline(compiler: Option<Compiler>, latexmk_path: Option<&str>) -> Vec<String> {
    let mut args = vec![latexmk_path.unwrap_or(LATEXMK).to_string()];
    if let Some(compiler) = compiler {
        args.push(format!("-{}", compiler.output_format().extension()));
        args.push(compiler.prog_repl());
    }
    args.extend(LATEXMK_OPTIONS.iter().map(|s| s.to_string()));
    args
}

/// Dotted version, compared numerically component-wise. Shorter versions
/// are padded with zeros, so `4.39` == `4.39.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version(Vec<u32>);

impl Version {
    pub fn parse(s: &str) -> Option<Version> {
        let parts: Result<Vec<u32>, _> = s.trim().split('.').map(str::parse).collect();
        parts.ok().filter(|p| !p.is_empty()).map(Version)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or(0);
            let b = other.0.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|n| n.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

lazy_static! {
    static ref VERSION_RE: Regex = Regex::new(r"(\d+)\.(\d+)\.?(\d+)?").unwrap();
    static ref MIN_VERSION: Version = Version::parse(MIN_LATEXMK_VERSION).unwrap();
}

/// A failed toolchain self-check, with a hint for the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckFailure {
    pub message: String,
    pub hint: String,
}

/// Verify the latexmk driver is present and satisfies the version bound.
/// Returns one entry per problem found; an empty vec means the toolchain
/// is usable.
pub async fn check_toolchain(
    runner: &dyn CommandRunner,
    config: &EngineConfig,
) -> Vec<CheckFailure> {
    let mut failures = Vec::new();
    let argv = vec![config.latexmk().to_string(), "--version".to_string()];
    let cwd = std::env::temp_dir();

    let output = match runner.run(&argv, &cwd, config.timeout()).await {
        Ok(output) => output,
        Err(e) => {
            failures.push(CheckFailure {
                message: e.to_string(),
                hint: format!(
                    "Unable to run '{} --version'. Is latexmk installed or is its \
                     path correctly configured?",
                    config.latexmk()
                ),
            });
            return failures;
        }
    };

    let version = VERSION_RE
        .captures(&output.stdout)
        .and_then(|caps| Version::parse(&dotted_version(&caps)));

    match version {
        None => failures.push(CheckFailure {
            message: format!("{}\n{}", output.stdout, output.stderr),
            hint: format!(
                "Unable to find the version of '{}'. Is latexmk installed with \
                 the correct version?",
                config.latexmk()
            ),
        }),
        Some(version) => {
            if version < *MIN_VERSION {
                failures.push(CheckFailure {
                    message: "Version outdated".to_string(),
                    hint: format!(
                        "latexmk with version >={} is required, current version is {}",
                        MIN_LATEXMK_VERSION, version
                    ),
                });
            }
        }
    }

    failures
}

fn dotted_version(caps: &regex::Captures<'_>) -> String {
    let parts: Vec<&str> = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str())
        .collect();
    parts.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cmdline_disables_shell_escape_and_halts_on_error() {
        let args = build_cmdline(Compiler::Pdflatex, Path::new("doc.tex"), None);
        assert_eq!(
            args,
            vec![
                "latexmk",
                "-pdf",
                "-pdflatex=pdflatex",
                "-latexoption=-no-shell-escape",
                "-interaction=nonstopmode",
                "-halt-on-error",
                "doc.tex",
            ]
        );
    }

    #[test]
    fn xelatex_is_substituted_through_the_pdflatex_flag() {
        assert_eq!(Compiler::Xelatex.prog_repl(), "-pdflatex=xelatex");
        assert_eq!(Compiler::Lualatex.prog_repl(), "-pdflatex=lualatex");
        assert_eq!(Compiler::Latex.prog_repl(), "-latex=latex");
    }

    #[test]
    fn plain_latex_produces_dvi() {
        assert_eq!(Compiler::Latex.output_format(), OutputFormat::Dvi);
        let args = build_cmdline(Compiler::Latex, Path::new("doc.tex"), None);
        assert_eq!(args[1], "-dvi");
    }

    #[test]
    fn explicit_latexmk_path_is_used() {
        let args = build_cmdline(
            Compiler::Pdflatex,
            Path::new("doc.tex"),
            Some("/opt/texlive/bin/latexmk"),
        );
        assert_eq!(args[0], "/opt/texlive/bin/latexmk");
    }

    #[test]
    fn project_cmdline_has_no_input_file() {
        let args = build_project_cmdline(Some(Compiler::Xelatex), None);
        assert_eq!(
            args,
            vec![
                "latexmk",
                "-pdf",
                "-pdflatex=xelatex",
                "-latexoption=-no-shell-escape",
                "-interaction=nonstopmode",
                "-halt-on-error",
            ]
        );
    }

    #[test]
    fn versions_compare_numerically_not_lexically() {
        let a = Version::parse("4.9").unwrap();
        let b = Version::parse("4.39").unwrap();
        assert!(a < b, "4.9 must sort below 4.39");
        assert!(Version::parse("10.0").unwrap() > Version::parse("9.99").unwrap());
    }

    #[test]
    fn shorter_versions_pad_with_zero() {
        assert_eq!(
            Version::parse("4.39").unwrap().cmp(&Version::parse("4.39.0").unwrap()),
            Ordering::Equal
        );
        assert!(Version::parse("4.39").unwrap() < Version::parse("4.39.1").unwrap());
    }

    #[test]
    fn version_parse_rejects_garbage() {
        assert!(Version::parse("").is_none());
        assert!(Version::parse("abc").is_none());
        assert!(Version::parse("4.x").is_none());
    }

    #[test]
    fn compiler_round_trips_through_strings() {
        for compiler in [
            Compiler::Latex,
            Compiler::Pdflatex,
            Compiler::Lualatex,
            Compiler::Xelatex,
        ] {
            let parsed: Compiler = compiler.to_string().parse().unwrap();
            assert_eq!(parsed, compiler);
        }
        assert!("tex".parse::<Compiler>().is_err());
    }
}
