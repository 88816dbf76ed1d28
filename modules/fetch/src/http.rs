use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Retrieval of remote resources.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Download `url` to `dest`, returning the written path.
    async fn fetch_to_path(&self, url: &str, dest: &Path) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub user_agent: String,
    pub timeout: Duration,
    pub redirects: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            user_agent: format!("edgar/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(600),
            redirects: 5,
        }
    }
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(opts: &FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .redirect(Policy::limited(opts.redirects))
            .timeout(opts.timeout)
            .user_agent(opts.user_agent.clone())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;
        Ok(HttpFetcher { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let resp = self.client.get(url).send().await.with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("GET {url} returned {status}"));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        Ok(self.get(url).await?.text().await?)
    }

    async fn fetch_to_path(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        let mut resp = self.get(url).await?;
        if let Some(dir) = dest.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".part");
        let part = dest.with_file_name(name);

        let mut file = tokio::fs::File::create(&part).await.with_context(|| format!("creating {}", part.display()))?;
        let mut bytes = 0u64;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&part, dest).await?;
        log::info!("downloaded {url} ({bytes} bytes) to {}", dest.display());
        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        let opts = FetchOptions { user_agent: "Sample Co admin@sample.test".into(), timeout: Duration::from_secs(5), redirects: 2 };
        HttpFetcher::new(&opts).unwrap()
    }

    #[tokio::test]
    async fn downloads_body_with_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/log20170630.zip"))
            .and(header("user-agent", "Sample Co admin@sample.test"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("downloads").join("log20170630.zip");
        let url = format!("{}/files/log20170630.zip", server.uri());
        let got = fetcher().fetch_to_path(&url, &dest).await.unwrap();
        assert_eq!(got, dest);
        assert_eq!(std::fs::read(&dest).unwrap().len(), 4096);
        assert!(!dest.with_file_name("log20170630.zip.part").exists());
    }

    #[tokio::test]
    async fn non_success_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("log.zip");
        assert!(fetcher().fetch_to_path(&format!("{}/missing.zip", server.uri()), &dest).await.is_err());
        assert!(!dest.exists());
        assert!(fetcher().fetch_text(&server.uri()).await.is_err());
    }
}
