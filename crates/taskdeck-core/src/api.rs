use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use taskdeck_shared::{
    TagSummary, TaskCreate, TaskDocumentDto, TaskDto, TaskPatch, TasksListArgs,
};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered HTTP {status}{}", format_body(.body))]
    Status {
        status: u16,
        url: String,
        body: String,
    },
    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn format_body(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

/// File contents plus the metadata sent
/// with a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    pub async fn from_path(path: &Path) -> Result<Self, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                ApiError::InvalidUpload(format!("{} has no file name", path.display()))
            })?;

        Ok(Self {
            content_type: guess_content_type(&file_name).map(str::to_string),
            file_name,
            bytes,
        })
    }
}

fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()?
        .to_string_lossy()
        .to_ascii_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(mime)
}

/// The backend operations the dashboard
/// and document panels depend on.
#[allow(async_fn_in_trait)]
pub trait TaskApi {
    async fn list_tasks(&self, args: &TasksListArgs) -> Result<Vec<TaskDto>, ApiError>;

    async fn create_task(&self, create: &TaskCreate) -> Result<TaskDto, ApiError>;

    async fn update_task(&self, id: u64, patch: &TaskPatch) -> Result<TaskDto, ApiError>;

    async fn delete_task(&self, id: u64) -> Result<(), ApiError>;

    async fn list_documents(&self, task_id: u64) -> Result<Vec<TaskDocumentDto>, ApiError>;

    async fn upload_document(
        &self,
        task_id: u64,
        upload: DocumentUpload,
    ) -> Result<TaskDocumentDto, ApiError>;

    async fn download_document(&self, doc: &TaskDocumentDto) -> Result<Vec<u8>, ApiError>;

    async fn delete_document(&self, doc_id: u64) -> Result<(), ApiError>;

    async fn list_tags(&self) -> Result<Vec<TagSummary>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTaskApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = parse_base_url(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Network {
                url: base_url.to_string(),
                source,
            })?;

        debug!(base_url = %base_url, timeout_secs = timeout.as_secs(), "built API client");
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::InvalidUrl(format!("{path}: {err}")))
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, ApiError> {
        let request_id = Uuid::new_v4();
        debug!(%request_id, %method, %url, "sending API request");

        let request = build(self.client.request(method.clone(), url.clone()))
            .header(REQUEST_ID_HEADER, request_id.to_string());
        let response = request.send().await.map_err(|source| {
            warn!(%request_id, %method, %url, error = %source, "API request failed");
            ApiError::Network {
                url: url.to_string(),
                source,
            }
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(%request_id, status = status.as_u16(), "API request succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            %request_id,
            %method,
            %url,
            status = status.as_u16(),
            "API answered with non-success status"
        );
        Err(ApiError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body: truncate_body(&body),
        })
    }

    async fn send_json<T>(
        &self,
        method: Method,
        url: Url,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, url.clone(), build).await?;
        response
            .json::<T>()
            .await
            .map_err(|source| ApiError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

impl TaskApi for HttpTaskApi {
    #[instrument(skip(self))]
    async fn list_tasks(&self, args: &TasksListArgs) -> Result<Vec<TaskDto>, ApiError> {
        let url = self.endpoint("tasks")?;
        self.send_json(Method::GET, url, |req| req.query(args)).await
    }

    #[instrument(skip(self, create), fields(title_len = create.title.len(), tag_count = create.tags.len()))]
    async fn create_task(&self, create: &TaskCreate) -> Result<TaskDto, ApiError> {
        let url = self.endpoint("tasks")?;
        self.send_json(Method::POST, url, |req| req.json(create)).await
    }

    #[instrument(skip(self, patch))]
    async fn update_task(&self, id: u64, patch: &TaskPatch) -> Result<TaskDto, ApiError> {
        let url = self.endpoint(&format!("tasks/{id}"))?;
        self.send_json(Method::PATCH, url, |req| req.json(patch)).await
    }

    #[instrument(skip(self))]
    async fn delete_task(&self, id: u64) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("tasks/{id}"))?;
        self.send(Method::DELETE, url, |req| req).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_documents(&self, task_id: u64) -> Result<Vec<TaskDocumentDto>, ApiError> {
        let url = self.endpoint(&format!("tasks/{task_id}/documents"))?;
        self.send_json(Method::GET, url, |req| req).await
    }

    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, size = upload.bytes.len()))]
    async fn upload_document(
        &self,
        task_id: u64,
        upload: DocumentUpload,
    ) -> Result<TaskDocumentDto, ApiError> {
        let url = self.endpoint(&format!("tasks/{task_id}/documents"))?;

        let mut part = Part::bytes(upload.bytes).file_name(upload.file_name);
        if let Some(content_type) = upload.content_type.as_deref() {
            part = part.mime_str(content_type).map_err(|err| {
                ApiError::InvalidUpload(format!("content type '{content_type}': {err}"))
            })?;
        }
        let form = Form::new().part("file", part);

        self.send_json(Method::POST, url, |req| req.multipart(form))
            .await
    }

    #[instrument(skip(self, doc), fields(doc_id = doc.id))]
    async fn download_document(&self, doc: &TaskDocumentDto) -> Result<Vec<u8>, ApiError> {
        let url = self.endpoint(&doc.download_url)?;
        let response = self.send(Method::GET, url.clone(), |req| req).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiError::Decode {
                url: url.to_string(),
                source,
            })?;
        Ok(bytes.to_vec())
    }

    #[instrument(skip(self))]
    async fn delete_document(&self, doc_id: u64) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("documents/{doc_id}"))?;
        self.send(Method::DELETE, url, |req| req).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_tags(&self) -> Result<Vec<TagSummary>, ApiError> {
        let url = self.endpoint("tags")?;
        self.send_json(Method::GET, url, |req| req).await
    }
}

/// Paths are joined relative to the base,
/// so a base with a path prefix needs a
/// trailing slash to keep that prefix.
fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidUrl("base URL is empty".to_string()));
    }

    let mut url =
        Url::parse(trimmed).map_err(|err| ApiError::InvalidUrl(format!("{trimmed}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::InvalidUrl(format!(
            "{trimmed}: expected an http or https URL"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn client(base: &str) -> HttpTaskApi {
        HttpTaskApi::new(base, Duration::from_secs(5)).expect("valid base url")
    }

    #[test]
    fn endpoints_join_under_base_path() {
        let api = client("http://localhost:8000");
        assert_eq!(
            api.endpoint("tasks/3/documents").expect("join").as_str(),
            "http://localhost:8000/tasks/3/documents"
        );

        let prefixed = client("https://example.test/todo");
        assert_eq!(
            prefixed.endpoint("/documents/9").expect("join").as_str(),
            "https://example.test/todo/documents/9"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(matches!(
            HttpTaskApi::new("", Duration::from_secs(1)),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpTaskApi::new("ftp://files.test", Duration::from_secs(1)),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpTaskApi::new("not a url", Duration::from_secs(1)),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn status_error_message_includes_body() {
        let err = ApiError::Status {
            status: 404,
            url: "http://localhost:8000/tasks/1".to_string(),
            body: "{\"detail\":\"Task not found\"}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "http://localhost:8000/tasks/1 answered HTTP 404: {\"detail\":\"Task not found\"}"
        );

        let bare = ApiError::Status {
            status: 500,
            url: "http://localhost:8000/tags".to_string(),
            body: String::new(),
        };
        assert_eq!(bare.to_string(), "http://localhost:8000/tags answered HTTP 500");
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(500);
        let out = truncate_body(&body);
        assert_eq!(out.chars().count(), MAX_ERROR_BODY_CHARS + 3);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn guesses_common_content_types() {
        assert_eq!(guess_content_type("scan.PDF"), Some("application/pdf"));
        assert_eq!(guess_content_type("notes.md"), Some("text/markdown"));
        assert_eq!(guess_content_type("archive.tar.xz"), None);
        assert_eq!(guess_content_type("README"), None);
    }

    #[tokio::test]
    async fn upload_reads_file_name_and_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("receipt.png");
        std::fs::write(&path, b"\x89PNG").expect("write file");

        let upload = DocumentUpload::from_path(&path).await.expect("read upload");
        assert_eq!(upload.file_name, "receipt.png");
        assert_eq!(upload.content_type.as_deref(), Some("image/png"));
        assert_eq!(upload.bytes, b"\x89PNG".to_vec());
    }

    #[tokio::test]
    async fn missing_upload_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = DocumentUpload::from_path(&dir.path().join("gone.txt"))
            .await
            .expect_err("missing file");
        assert!(matches!(err, ApiError::Io { .. }));
    }
}
