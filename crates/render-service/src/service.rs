//! Compile-and-cache service flow
//!
//! Ties the pieces together for one request: derive the key, consult the
//! cache, fall back to the record store, compile on a true miss, persist
//! the outcome, and offer it to the cache. The store is authoritative;
//! the cache only ever short-circuits work.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use latex_engine::{
    check_toolchain, decode_pdf_data_url, pdf_mediabox, project_data_urls, CheckFailure,
    CommandRunner, CompileRequest, Compiler, EngineError, SystemRunner, TexConverter,
};
use render_cache::{Lookup, ResultCache, COMPILE_ERROR_FIELD};

use crate::config::ServiceConfig;
use crate::store::{CollectionRecord, PdfRecord, RecordStore};

/// Outcome of a render call, shaped for the transport layer.
///
/// A populated `compile_error` must surface as a client error (400) even
/// though the payload is well-formed data; `error` carries only a generic
/// operator-facing message, with the full detail in the logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResponse {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    /// Store-relative path of the compiled PDF.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<PdfRecord>,
    #[serde(skip)]
    created: bool,
}

impl RenderResponse {
    fn empty(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data_url: None,
            pdf: None,
            compile_error: None,
            error: None,
            entries: Vec::new(),
            created: false,
        }
    }

    /// HTTP-equivalent status: 400 for compile errors, 500 for
    /// infrastructure failures, 201 for fresh compiles, 200 otherwise.
    pub fn http_status(&self) -> u16 {
        if self.compile_error.is_some() {
            400
        } else if self.error.is_some() {
            500
        } else if self.created {
            201
        } else {
            200
        }
    }
}

/// The compile-and-cache service.
pub struct RenderService {
    config: ServiceConfig,
    cache: ResultCache,
    store: Arc<dyn RecordStore>,
    runner: Arc<dyn CommandRunner>,
}

impl RenderService {
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn RecordStore>,
        cache: ResultCache,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config,
            cache,
            store,
            runner,
        }
    }

    /// Service running real toolchain processes.
    pub fn with_system_runner(
        config: ServiceConfig,
        store: Arc<dyn RecordStore>,
        cache: ResultCache,
    ) -> Self {
        Self::new(config, store, cache, Arc::new(SystemRunner))
    }

    /// Verify the toolchain is usable before accepting work.
    pub async fn check(&self) -> Vec<CheckFailure> {
        check_toolchain(self.runner.as_ref(), &self.config.engine).await
    }

    /// Compile a single LaTeX source, serving from cache or store when a
    /// record for its key already exists.
    #[instrument(skip(self, request), fields(project = %project))]
    pub async fn render(&self, project: &str, request: CompileRequest) -> RenderResponse {
        let converter =
            match TexConverter::new(request.clone(), self.config.engine.clone()) {
                Ok(converter) => converter,
                Err(EngineError::EmptySource) => {
                    // Bad input, not a toolchain problem; nothing gets
                    // persisted or cached for it.
                    let mut response = RenderResponse::empty("");
                    response.compile_error = Some("nothing to compile: empty source".to_string());
                    return response;
                }
                Err(e) => return self.infrastructure(String::new(), &e),
            };
        let key = converter.key().to_string();

        if !request.force_overwrite {
            if let Some(field) = single_field(&request) {
                match self.cache.get(&key, field) {
                    Lookup::Hit(value) => {
                        info!(key, field, "served from cache");
                        return field_response(&key, field, value);
                    }
                    Lookup::CompileError(excerpt) => {
                        info!(key, "served cached compile error");
                        let mut response = RenderResponse::empty(&key);
                        response.compile_error = Some(excerpt);
                        return response;
                    }
                    Lookup::Miss => {}
                }
            }

            match self.store.find(project, &key).await {
                Ok(Some(record)) => {
                    info!(key, "served from record store");
                    return self.from_record(record);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "record lookup failed, compiling anyway"),
            }
        } else {
            // A forced recompile replaces whatever is recorded under the key.
            self.delete_record(project, &key).await;
        }

        match converter.data_url(self.runner.as_ref()).await {
            Ok(data_url) => self.persist_success(project, &key, data_url).await,
            Err(EngineError::Compile(excerpt)) => {
                self.persist_failure(project, &key, excerpt).await
            }
            Err(e) => self.infrastructure(key, &e),
        }
    }

    /// Compile a pre-populated project directory under an archive key.
    #[instrument(skip(self, dir, compiler), fields(project = %project, key = %key))]
    pub async fn render_project(
        &self,
        project: &str,
        key: &str,
        dir: &Path,
        compiler: Option<Compiler>,
    ) -> RenderResponse {
        match self.store.find(project, key).await {
            Ok(Some(record)) => {
                info!(key, "served from record store");
                return self.from_record(record);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "record lookup failed, compiling anyway"),
        }

        let produced =
            project_data_urls(dir, compiler, self.runner.as_ref(), &self.config.engine).await;
        match produced {
            Ok(urls) => {
                let entries: Vec<PdfRecord> = urls
                    .into_iter()
                    .map(|(entry, data_url)| {
                        let name = Path::new(&entry)
                            .with_extension("pdf")
                            .display()
                            .to_string();
                        let mediabox = extract_mediabox(&data_url);
                        PdfRecord {
                            name,
                            data_url,
                            mediabox,
                        }
                    })
                    .collect();

                let record =
                    CollectionRecord::succeeded(project, key, entries.clone());
                if let Err(e) = self.store.create(record).await {
                    warn!(error = %e, "failed to persist collection record");
                }

                let mut response = RenderResponse::empty(key);
                response.entries = entries;
                response.created = true;
                response
            }
            Err(EngineError::Compile(excerpt)) => {
                self.persist_failure(project, key, excerpt).await
            }
            Err(e) => self.infrastructure(key.to_string(), &e),
        }
    }

    /// Delete the persisted record and drop every cached field for its
    /// key. Returns whether a record existed.
    pub async fn delete_record(&self, project: &str, key: &str) -> bool {
        let existed = match self.store.delete(project, key).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!(error = %e, "record deletion failed");
                false
            }
        };
        self.cache.invalidate(key);
        existed
    }

    fn from_record(&self, record: CollectionRecord) -> RenderResponse {
        let mut response = RenderResponse::empty(&record.key);

        if let Some(excerpt) = record.compile_error {
            // Re-admit so the next lookup short-circuits at the cache.
            self.cache.put(&record.key, COMPILE_ERROR_FIELD, &excerpt);
            response.compile_error = Some(excerpt);
            return response;
        }

        if let Some(entry) = record.entries.first() {
            response.data_url = Some(entry.data_url.clone());
            response.pdf = Some(relative_path(&record.project, &record.key, &entry.name));
            self.admit(&record.project, &record.key, &entry.name, &entry.data_url);
        }
        response.entries = record.entries;
        response
    }

    async fn persist_success(
        &self,
        project: &str,
        key: &str,
        data_url: String,
    ) -> RenderResponse {
        let name = format!("{key}.pdf");
        let entry = PdfRecord {
            name: name.clone(),
            data_url: data_url.clone(),
            mediabox: extract_mediabox(&data_url),
        };

        let record = CollectionRecord::succeeded(project, key, vec![entry.clone()]);
        if let Err(e) = self.store.create(record).await {
            // A concurrent compile of the same key may have won the
            // insert; its record is just as valid as ours.
            warn!(error = %e, "failed to persist collection record");
        }

        self.admit(project, key, &name, &data_url);

        let mut response = RenderResponse::empty(key);
        response.pdf = Some(relative_path(project, key, &name));
        response.data_url = Some(data_url);
        response.entries = vec![entry];
        response.created = true;
        response
    }

    async fn persist_failure(&self, project: &str, key: &str, excerpt: String) -> RenderResponse {
        let record = CollectionRecord::failed(project, key, excerpt.clone());
        if let Err(e) = self.store.create(record).await {
            warn!(error = %e, "failed to persist compile error record");
        }

        self.cache.put(key, COMPILE_ERROR_FIELD, &excerpt);

        let mut response = RenderResponse::empty(key);
        response.compile_error = Some(excerpt);
        response.created = true;
        response
    }

    /// Offer the fields of a successful compile for cache admission,
    /// subject to the configured policy and size ceiling.
    fn admit(&self, project: &str, key: &str, name: &str, data_url: &str) {
        if self.config.cache.pdf_returns_relative_path {
            self.cache.put(key, "pdf", &relative_path(project, key, name));
        }
        if self.config.cache.cache_data_url_on_save {
            self.cache.put(key, "data_url", data_url);
        }
    }

    fn infrastructure(&self, key: String, e: &EngineError) -> RenderResponse {
        // Full detail for operators; the response stays generic.
        error!(error = %e, "infrastructure failure during compile");
        let mut response = RenderResponse::empty(key);
        response.error = Some("internal error during compilation".to_string());
        response
    }
}

fn single_field(request: &CompileRequest) -> Option<&str> {
    let fields = request.fields.as_deref()?;
    match fields {
        [field] => Some(field.as_str()),
        _ => None,
    }
}

fn field_response(key: &str, field: &str, value: String) -> RenderResponse {
    let mut response = RenderResponse::empty(key);
    match field {
        "data_url" => response.data_url = Some(value),
        "pdf" => response.pdf = Some(value),
        _ => {}
    }
    response
}

fn relative_path(project: &str, key: &str, name: &str) -> String {
    format!("{}/{}/{}", project, key, name)
}

fn extract_mediabox(data_url: &str) -> Option<[f64; 4]> {
    let bytes = decode_pdf_data_url(data_url).ok()?;
    pdf_mediabox(&bytes).ok()
}
