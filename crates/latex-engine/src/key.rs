//! Content-addressed compile keys
//!
//! A key identifies a (source, compiler, output format, scheme version)
//! tuple; byte-identical submissions always derive the same key, which is
//! what lets the cache and the record store skip recompilation. The digest
//! comes first in the rendered key, so the `_` separator cannot collide
//! with the fixed compiler and format names.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::toolchain::{Compiler, OutputFormat};

/// Current key scheme. Bumping this is the only sanctioned way to
/// invalidate every derived key at once.
pub const KEY_SCHEME_VERSION: u32 = 1;

/// Content-addressed identifier for one compile input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompileKey(String);

impl CompileKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CompileKey {
    fn from(s: String) -> Self {
        CompileKey(s)
    }
}

impl std::fmt::Display for CompileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the key for a single LaTeX source.
pub fn derive_key(
    source: &str,
    compiler: Compiler,
    format: OutputFormat,
    scheme_version: u32,
) -> CompileKey {
    let digest = Sha256::digest(source.as_bytes());
    CompileKey(format!(
        "{}_{}_{}_v{}",
        hex::encode(digest),
        compiler.bin(),
        format,
        scheme_version
    ))
}

/// Derive the key for an uploaded project archive. Project keys hash the
/// archive bytes rather than a source string.
pub fn derive_archive_key(archive: &[u8], compiler: Compiler, scheme_version: u32) -> CompileKey {
    let digest = Sha256::digest(archive);
    CompileKey(format!(
        "{}_{}_v{}",
        hex::encode(digest),
        compiler.bin(),
        scheme_version
    ))
}
