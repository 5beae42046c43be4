use anyhow::Context;
use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

/// One file from a multipart upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Where the hosting provider put an image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedImage {
    #[serde(alias = "fileId")]
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, image: ImageUpload) -> anyhow::Result<UploadedImage>;
}

/// Uploads through a hosted image service's HTTP endpoint.
pub struct HttpImageStore {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpImageStore {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> HttpImageStore {
        HttpImageStore {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl ImageStore for HttpImageStore {
    async fn upload(&self, image: ImageUpload) -> anyhow::Result<UploadedImage> {
        let mut part = Part::bytes(image.bytes.to_vec()).file_name(image.file_name.clone());
        if let Some(content_type) = &image.content_type {
            part = part.mime_str(content_type)?;
        }
        let form = Form::new()
            .part("file", part)
            .text("fileName", image.file_name.clone());

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.basic_auth(key, Some(""));
        }

        request
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("uploading {}", image.file_name))?
            .json()
            .await
            .context("reading upload response")
    }
}
