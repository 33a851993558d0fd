//! End-to-end tests against a real TeX installation.
//!
//! These require latexmk plus a TeX distribution on `$PATH`, so they are
//! ignored by default. Run with:
//!
//! ```text
//! cargo test -p latex-engine --test real_toolchain -- --ignored
//! ```

use latex_engine::{
    check_toolchain, CompileRequest, Compiler, EngineConfig, EngineError, SystemRunner,
    TexConverter,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const VALID_DOC: &str = "\
\\documentclass{article}
\\begin{document}
Hello, world.
\\end{document}
";

// Unterminated document environment: a guaranteed fatal error.
const BROKEN_DOC: &str = "\
\\documentclass{article}
\\begin{document}
Hello, world.
";

#[tokio::test]
#[ignore = "requires latexmk and a TeX distribution"]
async fn toolchain_self_check_passes() {
    init_tracing();
    let failures = check_toolchain(&SystemRunner, &EngineConfig::default()).await;
    assert!(failures.is_empty(), "{failures:?}");
}

#[tokio::test]
#[ignore = "requires latexmk and a TeX distribution"]
async fn minimal_document_compiles_to_a_pdf_data_url() {
    init_tracing();
    let converter = TexConverter::new(
        CompileRequest::new(VALID_DOC, Compiler::Pdflatex),
        EngineConfig::default(),
    )
    .unwrap();

    let url = converter.data_url(&SystemRunner).await.unwrap();
    assert!(url.starts_with("data:application/pdf;base64,"));

    let bytes = latex_engine::decode_pdf_data_url(&url).unwrap();
    let mediabox = latex_engine::pdf_mediabox(&bytes).unwrap();
    assert!(!latex_engine::is_landscape(&mediabox), "article is portrait");
}

#[tokio::test]
#[ignore = "requires latexmk and a TeX distribution"]
async fn unterminated_environment_is_a_compile_error() {
    init_tracing();
    let converter = TexConverter::new(
        CompileRequest::new(BROKEN_DOC, Compiler::Pdflatex),
        EngineConfig::default(),
    )
    .unwrap();

    let err = converter.data_url(&SystemRunner).await.unwrap_err();
    match err {
        EngineError::Compile(excerpt) => assert!(!excerpt.trim().is_empty()),
        other => panic!("expected compile error, got {other:?}"),
    }
}
