//! Pulls externally hosted product images into the site's asset directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::model::ProductStore;

const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "avif"];

/// Source of image bytes.
#[async_trait]
pub trait Fetch {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|err| PipelineError::Config(format!("http client: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let fail = |err: reqwest::Error| PipelineError::Fetch {
            url: url.to_string(),
            reason: err.to_string(),
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(fail)?
            .error_for_status()
            .map_err(fail)?;
        let bytes = response.bytes().await.map_err(fail)?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFailure {
    pub id: String,
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReport {
    pub downloaded: Vec<String>,
    pub failed: Vec<ImageFailure>,
    /// Records whose image was already local.
    pub skipped: usize,
}

/// File extension taken from the URL path, `jpg` when absent or unknown.
pub fn extension_for(url: &str) -> &'static str {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();
    let ext = Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();
    KNOWN_EXTENSIONS
        .iter()
        .find(|known| **known == ext)
        .copied()
        .unwrap_or("jpg")
}

/// Fetches every external `imageRef` once, stores it as `<id>.<ext>` under
/// `dir` and points the record at `<public_prefix>/<file>`. Failures are
/// logged and reported; the record keeps its old reference.
pub async fn localize_images<F: Fetch + Sync>(
    store: &mut ProductStore,
    fetcher: &F,
    dir: &Path,
    public_prefix: &str,
) -> Result<ImageReport> {
    tokio::fs::create_dir_all(dir).await?;
    let mut report = ImageReport::default();

    for record in store.products.iter_mut() {
        if !record.has_external_image() {
            report.skipped += 1;
            continue;
        }
        let url = record.image_ref.clone();
        let file = format!("{}.{}", record.id, extension_for(&url));
        let target: PathBuf = dir.join(&file);

        match fetcher.fetch(&url).await {
            Ok(bytes) => {
                if let Err(err) = tokio::fs::write(&target, &bytes).await {
                    tracing::warn!(
                        product = %record.id,
                        path = %target.display(),
                        error = %err,
                        "could not store image, skipping"
                    );
                    report.failed.push(ImageFailure {
                        id: record.id.clone(),
                        url,
                        reason: format!("writing {}: {err}", target.display()),
                    });
                    continue;
                }
                record.image_ref = format!("{}/{file}", public_prefix.trim_end_matches('/'));
                tracing::info!(product = %record.id, bytes = bytes.len(), "stored image");
                report.downloaded.push(record.id.clone());
            }
            Err(err) => {
                tracing::warn!(
                    product = %record.id,
                    url = %url,
                    error = %err,
                    "image fetch failed, skipping"
                );
                report.failed.push(ImageFailure {
                    id: record.id.clone(),
                    url,
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::model::{PageMetadata, ProductRecord};

    struct FakeFetcher {
        responses: HashMap<String, Vec<u8>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetch for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| PipelineError::Fetch {
                    url: url.to_string(),
                    reason: "404 Not Found".into(),
                })
        }
    }

    fn record(id: &str, image: &str) -> ProductRecord {
        let mut r = ProductRecord::named(id, id);
        r.image_ref = image.into();
        r
    }

    #[test]
    fn extension_comes_from_path() {
        assert_eq!(extension_for("https://cdn.example.com/a/b.PNG?x=1"), "png");
        assert_eq!(extension_for("https://cdn.example.com/a/b"), "jpg");
        assert_eq!(extension_for("https://cdn.example.com/a/b.php"), "jpg");
    }

    #[tokio::test]
    async fn downloads_rewrite_refs_and_failures_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProductStore::new(
            PageMetadata::default(),
            vec![
                record("dolphin-e10", "https://m.media-amazon.com/images/I/e10.webp"),
                record("betta-se", "https://m.media-amazon.com/images/I/gone.jpg"),
                record("aiper", "/assets/images/products/aiper.jpg"),
            ],
        );
        let fetcher = FakeFetcher {
            responses: HashMap::from([(
                "https://m.media-amazon.com/images/I/e10.webp".to_string(),
                vec![1, 2, 3],
            )]),
            calls: Mutex::new(Vec::new()),
        };

        let report = localize_images(&mut store, &fetcher, dir.path(), "/assets/images/products/")
            .await
            .unwrap();

        assert_eq!(report.downloaded, vec!["dolphin-e10"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, "betta-se");
        assert_eq!(report.skipped, 1);
        assert_eq!(fetcher.calls.lock().unwrap().len(), 2);

        assert_eq!(store.products[0].image_ref, "/assets/images/products/dolphin-e10.webp");
        assert_eq!(store.products[1].image_ref, "https://m.media-amazon.com/images/I/gone.jpg");
        assert_eq!(std::fs::read(dir.path().join("dolphin-e10.webp")).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn write_failure_is_collected_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the target name makes the write fail.
        std::fs::create_dir(dir.path().join("betta-se.jpg")).unwrap();
        let mut store = ProductStore::new(
            PageMetadata::default(),
            vec![
                record("betta-se", "https://m.media-amazon.com/images/I/betta.jpg"),
                record("dolphin-e10", "https://m.media-amazon.com/images/I/e10.jpg"),
            ],
        );
        let fetcher = FakeFetcher {
            responses: HashMap::from([
                ("https://m.media-amazon.com/images/I/betta.jpg".to_string(), vec![7]),
                ("https://m.media-amazon.com/images/I/e10.jpg".to_string(), vec![8]),
            ]),
            calls: Mutex::new(Vec::new()),
        };

        let report = localize_images(&mut store, &fetcher, dir.path(), "/img")
            .await
            .unwrap();

        assert_eq!(report.downloaded, vec!["dolphin-e10"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, "betta-se");
        assert!(report.failed[0].reason.starts_with("writing "), "{}", report.failed[0].reason);
        assert_eq!(store.products[0].image_ref, "https://m.media-amazon.com/images/I/betta.jpg");
        assert_eq!(store.products[1].image_ref, "/img/dolphin-e10.jpg");
    }
}
