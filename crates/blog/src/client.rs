use std::path::Path;

use {
    reqwest::{Response, multipart},
    secrecy::{ExposeSecret, Secret},
    serde::de::DeserializeOwned,
    tracing::{debug, info},
};

use crate::{
    error::{Error, Result},
    types::{Attachment, Envelope, ItemBody, Post, UrlBody, parse_error},
};

/// Base URL of the blog REST API.
pub const DEFAULT_API_URL: &str = "https://www.tistory.com/apis";

/// Authenticated client for the blog REST API.
pub struct BlogClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Secret<String>,
}

impl BlogClient {
    pub fn new(access_token: Secret<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_API_URL.to_string(),
            access_token,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Raw JSON describing the authenticated user's blogs.
    pub async fn info(&self) -> Result<String> {
        let resp = self
            .client
            .get(self.endpoint("blog/info"))
            .query(&[
                ("access_token", self.access_token.expose_secret().as_str()),
                ("output", "json"),
            ])
            .send()
            .await?;
        checked_body(resp).await
    }

    pub async fn read_post(&self, blog: &str, post_id: &str) -> Result<Post> {
        debug!(blog, post_id, "reading post");
        let resp = self
            .client
            .get(self.endpoint("post/read"))
            .query(&[
                ("access_token", self.access_token.expose_secret().as_str()),
                ("blogName", blog),
                ("postId", post_id),
                ("output", "json"),
            ])
            .send()
            .await?;
        let body: Envelope<ItemBody<Post>> = decode(resp).await?;
        Ok(body.tistory.item)
    }

    /// Create a post and return its URL.
    pub async fn write_post(&self, blog: &str, title: &str, content: &str) -> Result<String> {
        let resp = self
            .client
            .post(self.endpoint("post/write"))
            .form(&[
                ("access_token", self.access_token.expose_secret().as_str()),
                ("blogName", blog),
                ("title", title),
                ("content", content),
                ("output", "json"),
            ])
            .send()
            .await?;
        let body: Envelope<UrlBody> = decode(resp).await?;
        info!(url = %body.tistory.url, "post created");
        Ok(body.tistory.url)
    }

    /// Replace a post's title and content and return its URL.
    pub async fn modify_post(
        &self,
        blog: &str,
        post_id: &str,
        title: &str,
        content: &str,
    ) -> Result<String> {
        let resp = self
            .client
            .post(self.endpoint("post/modify"))
            .form(&[
                ("access_token", self.access_token.expose_secret().as_str()),
                ("blogName", blog),
                ("postId", post_id),
                ("title", title),
                ("content", content),
                ("output", "json"),
            ])
            .send()
            .await?;
        let body: Envelope<UrlBody> = decode(resp).await?;
        info!(url = %body.tistory.url, "post updated");
        Ok(body.tistory.url)
    }

    /// Upload a local image as a post attachment.
    pub async fn attach_image(&self, blog: &str, path: &Path) -> Result<Attachment> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::io(path, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let form = multipart::Form::new()
            .text("access_token", self.access_token.expose_secret().clone())
            .text("blogName", blog.to_string())
            .text("output", "json")
            .part("uploadedfile", multipart::Part::bytes(bytes).file_name(file_name));

        let resp = self
            .client
            .post(self.endpoint("post/attach"))
            .multipart(form)
            .send()
            .await?;
        let body: Envelope<Attachment> = decode(resp).await?;
        info!(url = %body.tistory.url, path = %path.display(), "image uploaded");
        Ok(body.tistory)
    }
}

async fn checked_body(resp: Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(Error::Api {
            status,
            message: parse_error(&body),
        });
    }
    Ok(body)
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let body = checked_body(resp).await?;
    Ok(serde_json::from_str(&body)?)
}
