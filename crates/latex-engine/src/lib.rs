//! LaTeX compile pipeline
//!
//! This crate turns user-submitted LaTeX source into rendered artifacts:
//! - Content-addressed compile keys, so identical input never recompiles
//! - Sandboxed latexmk invocation in scoped working directories
//! - Compile-log normalization into a user-facing error excerpt
//! - Data-URL artifact encoding and PDF page-geometry extraction
//! - Whole-project compiles driven by a `.latexmkrc` manifest
//!
//! Failures are classified into compile errors (the user's problem) and
//! infrastructure errors (the operator's problem); see
//! [`EngineError::is_compile_error`].

pub mod artifact;
pub mod config;
pub mod convert;
pub mod error;
pub mod key;
pub mod log;
pub mod process;
pub mod project;
pub mod toolchain;

pub use artifact::{decode_pdf_data_url, encode_data_url, is_landscape, pdf_mediabox};
pub use config::EngineConfig;
pub use convert::{CompileRequest, CompiledFile, TexConverter};
pub use error::EngineError;
pub use key::{derive_archive_key, derive_key, CompileKey, KEY_SCHEME_VERSION};
pub use log::extract_compile_log;
pub use process::{CommandRunner, RunOutput, SystemRunner};
pub use project::{convert_project, default_files, latest_log_file, project_data_urls, LATEXMKRC};
pub use toolchain::{check_toolchain, CheckFailure, Compiler, OutputFormat, Version};
