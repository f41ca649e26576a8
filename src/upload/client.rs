//! Multipart upload requests.

use crate::config::UploadConfig;
use crate::constants::upload::{CONNECT_TIMEOUT_SECS, IMAGE_MIME};
use crate::error::{Error, Result};
use crate::storage::StoredCapture;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Response body of the upload service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    /// Whether the photo was accepted.
    #[serde(default)]
    pub success: bool,
    /// Where the photo can be viewed.
    #[serde(default)]
    pub urls: Option<UploadUrls>,
    /// Rejection reason.
    #[serde(default)]
    pub error: Option<String>,
}

/// URLs returned for an accepted photo.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadUrls {
    /// Public URL of the photo.
    #[serde(default)]
    pub public: Option<String>,
}

/// Sends one capture per request to the upload service.
#[derive(Debug, Clone)]
pub struct UploadClient {
    client: Client,
    url: String,
    user_id: String,
}

impl UploadClient {
    /// Build a client with the configured request timeout.
    pub fn from_config(config: &UploadConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal {
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            url: config.service_url.clone(),
            user_id: config.user_id.clone(),
        })
    }

    /// Upload endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn failed(&self, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Error {
        Error::UploadFailed {
            url: self.url.clone(),
            source: source.into(),
        }
    }

    /// Upload `capture` as `file`, `user_id` and `metadata` form fields.
    ///
    /// Returns the public URL reported by the service, or an empty string if
    /// it accepted the photo without one.
    pub async fn upload(&self, capture: StoredCapture) -> Result<String> {
        let metadata = serde_json::to_string(&capture.metadata)
            .map_err(|source| Error::MetadataSerialize { source })?;
        let file = Part::bytes(capture.record.image)
            .file_name(capture.metadata.filename)
            .mime_str(IMAGE_MIME)
            .map_err(|e| self.failed(e))?;
        let form = Form::new()
            .part("file", file)
            .text("user_id", self.user_id.clone())
            .text("metadata", metadata);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.failed(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.failed(format!("HTTP {status}: {}", body.trim())));
        }

        let body: UploadResponse = response.json().await.map_err(|e| self.failed(e))?;
        debug!("Upload response: {body:?}");
        if !body.success {
            return Err(Error::UploadRejected {
                reason: body.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(body.urls.and_then(|urls| urls.public).unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::detection::{CaptureRecord, DetectionType};
    use crate::storage::CaptureMetadata;
    use chrono::Local;
    use std::path::PathBuf;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    pub(crate) fn capture(filename: &str) -> StoredCapture {
        let record = CaptureRecord {
            image: vec![0xFF, 0xD8, 0xFF, 0xD9],
            weight_grams: Some(7.25),
            captured_at: Local::now(),
            detection: DetectionType::Both,
        };
        let metadata = CaptureMetadata::new(&record, filename.to_string(), None);
        StoredCapture {
            record,
            image_path: PathBuf::from(filename),
            metadata_path: PathBuf::from(filename).with_extension("json"),
            metadata,
        }
    }

    fn content_length(head: &str) -> Option<usize> {
        head.lines().find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())
                .flatten()
        })
    }

    /// Serve one request with `status` and `body`, returning the raw request.
    pub(crate) async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/upload", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0_u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(split) = text.find("\r\n\r\n") {
                    let body_len = request.len() - split - 4;
                    let complete = content_length(&text[..split])
                        .map_or_else(|| text.ends_with("--\r\n") || text.ends_with("0\r\n\r\n"), |len| body_len >= len);
                    if complete {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
        });

        (url, rx)
    }

    fn client(url: String) -> UploadClient {
        UploadClient::from_config(&UploadConfig {
            enabled: true,
            service_url: url,
            user_id: "feeder-7".to_string(),
            ..UploadConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_upload_sends_form_and_returns_public_url() {
        let (url, request) = serve_once(
            "200 OK",
            r#"{"success": true, "urls": {"public": "https://photos.example/p/1.jpg"}}"#,
        )
        .await;

        let public = client(url).upload(capture("bird_1.jpg")).await.unwrap();
        assert_eq!(public, "https://photos.example/p/1.jpg");

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /upload"));
        assert!(request.contains(r#"name="file"; filename="bird_1.jpg""#));
        assert!(request.contains("image/jpeg"));
        assert!(request.contains(r#"name="user_id""#));
        assert!(request.contains("feeder-7"));
        assert!(request.contains(r#"name="metadata""#));
        assert!(request.contains(r#""detectionType":"both""#));
    }

    #[tokio::test]
    async fn test_rejection_reports_service_error() {
        let (url, _request) =
            serve_once("200 OK", r#"{"success": false, "error": "quota exceeded"}"#).await;

        let err = client(url).upload(capture("bird_2.jpg")).await.unwrap_err();
        assert!(matches!(err, Error::UploadRejected { ref reason } if reason == "quota exceeded"));
    }

    #[tokio::test]
    async fn test_http_error_status_is_upload_failure() {
        let (url, _request) = serve_once("500 Internal Server Error", "{}").await;

        let err = client(url).upload(capture("bird_3.jpg")).await.unwrap_err();
        assert!(matches!(err, Error::UploadFailed { .. }));
        assert!(err.to_string().contains("500"));
        assert!(!err.is_fatal());
    }
}
