use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::{ClientError, DownloadedReport, FailureKind, PreviewSheets, UploadReceipt};

pub type ByteStream = BoxStream<'static, Result<Bytes, ClientError>>;

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applies to every request except the log stream.
    pub request_timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// The report server's HTTP surface.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// `GET /`; any HTTP answer is `Ok(status)`.
    async fn probe(&self) -> Result<u16, ClientError>;

    async fn upload(&self, task: &str, path: &Path) -> Result<UploadReceipt, ClientError>;

    /// Returns the server's acknowledgement message.
    async fn start_task(&self, task: &str) -> Result<String, ClientError>;

    async fn preview(&self, task: &str) -> Result<PreviewSheets, ClientError>;

    async fn download(&self, task: &str) -> Result<DownloadedReport, ClientError>;

    /// Opens `GET /api/logs` and returns the raw body chunks.
    async fn open_log_stream(&self) -> Result<ByteStream, ClientError>;
}

#[derive(Debug, Default, Deserialize)]
struct ReplyEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct ReqwestBackend {
    base_url: RwLock<String>,
    client: reqwest::Client,
    stream_client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(settings: BackendSettings) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ClientError::new(FailureKind::Network, err.to_string()))?;
        // The log stream is long-lived; only the connect phase is bounded.
        let stream_client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ClientError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            base_url: RwLock::new(trim_base(&settings.base_url)),
            client,
            stream_client,
        })
    }

    /// Points later requests (and the next stream reconnect) at another server.
    pub fn set_base_url(&self, base_url: &str) {
        let mut guard = self
            .base_url
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = trim_base(base_url);
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let raw = format!("{}{}", self.base_url(), path);
        let url = Url::parse(&raw)
            .map_err(|err| ClientError::new(FailureKind::InvalidUrl, format!("{raw}: {err}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ClientError::new(
                FailureKind::InvalidUrl,
                format!("{raw}: unsupported scheme {other}"),
            )),
        }
    }
}

#[async_trait::async_trait]
impl Backend for ReqwestBackend {
    async fn probe(&self) -> Result<u16, ClientError> {
        let response = self
            .client
            .get(self.endpoint("/")?)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Ok(response.status().as_u16())
    }

    async fn upload(&self, task: &str, path: &Path) -> Result<UploadReceipt, ClientError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|err| ClientError::new(FailureKind::Io, format!("{}: {err}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.xlsx".to_string());

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(data).file_name(file_name),
            )
            .text("type", task.to_string());

        let response = self
            .client
            .post(self.endpoint("/upload")?)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let reply = read_envelope(response).await?;
        Ok(UploadReceipt {
            message: reply.message,
        })
    }

    async fn start_task(&self, task: &str) -> Result<String, ClientError> {
        let response = self
            .client
            .post(self.endpoint("/api/run")?)
            .json(&serde_json::json!({ "type": task }))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let reply = read_envelope(response).await?;
        Ok(reply.message.unwrap_or_default())
    }

    async fn preview(&self, task: &str) -> Result<PreviewSheets, ClientError> {
        let response = self
            .client
            .get(self.endpoint(&format!("/api/preview/{task}"))?)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        let parsed: Result<Value, _> = serde_json::from_str(&body);

        if !status.is_success() {
            let detail = parsed
                .ok()
                .as_ref()
                .and_then(error_field)
                .unwrap_or_else(|| status_text(status));
            return Err(ClientError::new(
                FailureKind::HttpStatus(status.as_u16()),
                detail,
            ));
        }

        let value =
            parsed.map_err(|err| ClientError::new(FailureKind::Malformed, err.to_string()))?;
        if let Some(error) = error_field(&value) {
            return Err(ClientError::new(FailureKind::Rejected, error));
        }
        sheets_from_value(value)
    }

    async fn download(&self, task: &str) -> Result<DownloadedReport, ClientError> {
        let response = self
            .client
            .get(self.endpoint(&format!("/download/{task}"))?)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = if body.trim().is_empty() {
                status_text(status)
            } else {
                body.trim().to_string()
            };
            return Err(ClientError::new(
                FailureKind::HttpStatus(status.as_u16()),
                detail,
            ));
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition);
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(DownloadedReport {
            bytes: bytes.to_vec(),
            filename,
        })
    }

    async fn open_log_stream(&self) -> Result<ByteStream, ClientError> {
        let response = self
            .stream_client
            .get(self.endpoint("/api/logs")?)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status_text(status),
            ));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error))
            .boxed())
    }
}

/// Reads a `{ message?, error? }` reply; an `error` field always wins.
async fn read_envelope(response: Response) -> Result<ReplyEnvelope, ClientError> {
    let status = response.status();
    let body = response.text().await.map_err(map_reqwest_error)?;
    match serde_json::from_str::<ReplyEnvelope>(&body) {
        Ok(ReplyEnvelope {
            error: Some(error), ..
        }) => Err(ClientError::new(FailureKind::Rejected, error)),
        Ok(_) if !status.is_success() => Err(ClientError::new(
            FailureKind::HttpStatus(status.as_u16()),
            status_text(status),
        )),
        Ok(reply) => Ok(reply),
        Err(_) if !status.is_success() => Err(ClientError::new(
            FailureKind::HttpStatus(status.as_u16()),
            status_text(status),
        )),
        Err(err) => Err(ClientError::new(FailureKind::Malformed, err.to_string())),
    }
}

fn error_field(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::String(text) => Some(text.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn sheets_from_value(value: Value) -> Result<PreviewSheets, ClientError> {
    let Value::Object(map) = value else {
        return Err(ClientError::new(
            FailureKind::Malformed,
            "preview is not a JSON object",
        ));
    };
    map.into_iter()
        .map(|(name, markup)| match markup {
            Value::String(markup) => Ok((name, markup)),
            _ => Err(ClientError::new(
                FailureKind::Malformed,
                format!("sheet '{name}' is not a string"),
            )),
        })
        .collect()
}

fn status_text(status: StatusCode) -> String {
    status.to_string()
}

fn trim_base(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Picks the filename out of a `Content-Disposition` header, preferring the
/// RFC 5987 `filename*` form that carries non-ASCII names.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if key == "filename*" {
            let encoded = value
                .split_once("''")
                .map(|(_, rest)| rest)
                .unwrap_or(value);
            if let Ok(decoded) = urlencoding::decode(encoded) {
                if !decoded.is_empty() {
                    return Some(decoded.into_owned());
                }
            }
        } else if key == "filename" {
            let unquoted = value.trim_matches('"');
            if !unquoted.is_empty() {
                plain = Some(unquoted.to_string());
            }
        }
    }
    plain
}

fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        return ClientError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ClientError::new(FailureKind::Malformed, err.to_string());
    }
    ClientError::new(FailureKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_at(base_url: &str) -> ReqwestBackend {
        ReqwestBackend::new(BackendSettings {
            base_url: base_url.to_string(),
            ..BackendSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn endpoints_join_onto_the_base_url() {
        let backend = backend_at("http://192.168.1.20:5000/");
        assert_eq!(
            backend.endpoint("/api/preview/hy").unwrap().as_str(),
            "http://192.168.1.20:5000/api/preview/hy"
        );
    }

    #[test]
    fn unusable_base_url_is_reported_as_invalid() {
        for base in ["not a url", "ftp://192.168.1.20"] {
            let err = backend_at(base).endpoint("/").unwrap_err();
            assert_eq!(err.kind, FailureKind::InvalidUrl);
        }
    }

    #[test]
    fn disposition_prefers_extended_filename() {
        let header = "attachment; filename=report.xlsx; filename*=UTF-8''%E5%8C%96%E9%AA%8C%E6%9C%88%E6%8A%A5%E6%B1%87%E6%80%BB.xlsx";
        assert_eq!(
            filename_from_disposition(header).as_deref(),
            Some("化验月报汇总.xlsx")
        );
    }

    #[test]
    fn disposition_plain_filename_is_unquoted() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="cz.xlsx""#).as_deref(),
            Some("cz.xlsx")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }
}
