//! Compile log normalization
//!
//! TeX logs bury the one fatal error a user needs under pages of banner
//! text, package chatter, and font trivia. [`extract_compile_log`] keeps
//! the error and its context and drops the rest. The transform is
//! idempotent: feeding its output back in returns it unchanged.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Lines the toolchain emits unconditionally, useless for diagnosing
    /// a failed compile.
    static ref NOISE_RE: Regex = Regex::new(
        r"(?x)^(
            This\ is\ \w*TeX
          | LaTeX2e\ <
          | L3\ programming\ layer
          | Document\ Class:
          | File:\ \S
          | Package:\ \S
          | LaTeX\ Font\ (Info|Warning)
          | \\openout
          | Babel\ <
          | restricted\ \\write18
          | entering\ extended\ mode
          | Latexmk:
          | Output\ written\ on
          | Transcript\ written\ on
        )"
    )
    .unwrap();
}

/// Trailer marking the start of TeX's end-of-run memory report; nothing
/// after it concerns the user's source.
const MEMORY_TRAILER: &str = "Here is how much of TeX's memory";

/// Reduce a raw compiler log to the user-relevant error excerpt.
///
/// Escaped `\n` sequences are collapsed into real newlines, boilerplate
/// is dropped, and output is clipped to the region from the first fatal
/// error marker (a `!`-prefixed line) to the memory trailer.
pub fn extract_compile_log(raw: &str) -> String {
    let log = raw.replace("\\n", "\n");
    let lines: Vec<&str> = log.lines().collect();

    let start = lines.iter().position(|l| l.starts_with('!')).unwrap_or(0);
    let kept: Vec<&str> = lines[start..]
        .iter()
        .take_while(|l| !l.starts_with(MEMORY_TRAILER))
        .filter(|l| !NOISE_RE.is_match(l))
        .copied()
        .collect();

    kept.join("\n").trim().to_string()
}
