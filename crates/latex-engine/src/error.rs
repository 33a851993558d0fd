//! Error types for the compile pipeline
//!
//! The pipeline distinguishes two classes of failure: compile errors, which
//! the toolchain reported against the submitted source and which the user
//! can fix, and infrastructure errors, which the operator must fix. Use
//! [`EngineError::is_compile_error`] to classify; everything that is not a
//! compile error is an infrastructure error.

use thiserror::Error;

/// Errors raised while converting LaTeX source to a compiled artifact.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The toolchain ran and reported a fatal error in the submitted
    /// source. Carries the normalized log excerpt.
    #[error("latex compilation failed:\n{0}")]
    Compile(String),

    #[error("source is empty after trimming")]
    EmptySource,

    /// The command binary could not be found or started. Distinct from a
    /// non-zero exit, which is a normal run result.
    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("compilation timed out after {0}ms")]
    Timeout(u64),

    /// The toolchain exited non-zero without leaving a log file behind.
    #[error("toolchain failed: {0}")]
    Toolchain(String),

    /// Exit status was zero but the expected output file is absent.
    #[error("no {format} file was generated{detail}")]
    NoOutput { format: String, detail: String },

    /// A declared entry point did not produce its expected output.
    #[error("no file named \"{0}\" was generated after compile")]
    MissingOutput(String),

    /// The build-configuration file is missing, unreadable, or declares
    /// no entry points.
    #[error("invalid build configuration: {0}")]
    BuildConfig(String),

    /// Artifact construction failed after a successful compile.
    #[error("artifact encoding failed: {0}")]
    Encode(String),

    #[error("unexpected mime type '{0}', expected 'application/pdf'")]
    MimeMismatch(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether this is a user-correctable compile error, as opposed to an
    /// infrastructure failure. Compile errors are never worth retrying;
    /// infrastructure failures may be transient.
    pub fn is_compile_error(&self) -> bool {
        matches!(self, EngineError::Compile(_))
    }
}
