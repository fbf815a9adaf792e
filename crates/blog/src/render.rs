//! Markdown to post HTML, uploading local images on the way.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use {
    async_trait::async_trait,
    pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html},
    tracing::{info, warn},
    url::Url,
};

use crate::{
    client::BlogClient,
    error::{Error, Result},
    types::Attachment,
};

/// Uploads an image referenced from Markdown.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<Attachment>;
}

/// Uploads images as attachments of one blog.
pub struct BlogImageUploader<'a> {
    client: &'a BlogClient,
    blog: &'a str,
}

impl<'a> BlogImageUploader<'a> {
    pub fn new(client: &'a BlogClient, blog: &'a str) -> Self {
        Self { client, blog }
    }
}

#[async_trait]
impl ImageUploader for BlogImageUploader<'_> {
    async fn upload(&self, path: &Path) -> Result<Attachment> {
        self.client.attach_image(self.blog, path).await
    }
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_DEFINITION_LIST
}

/// Whether an image destination points at a local file.
fn is_local_image(dest: &str) -> bool {
    !dest.is_empty() && !dest.starts_with("//") && !dest.starts_with('#') && Url::parse(dest).is_err()
}

/// Render Markdown to HTML.
///
/// With an uploader, local images (resolved against `base_dir`) are uploaded
/// and replaced by the provider's markup. A failed upload keeps the plain
/// `<img>` tag.
pub async fn render_markdown(
    source: &str,
    base_dir: &Path,
    uploader: Option<&dyn ImageUploader>,
) -> String {
    let events: Vec<Event<'_>> = Parser::new_ext(source, markdown_options()).collect();
    let mut rendered = Vec::with_capacity(events.len());
    let mut uploaded: HashMap<PathBuf, String> = HashMap::new();
    let mut iter = events.into_iter();

    while let Some(event) = iter.next() {
        let local_image = match &event {
            Event::Start(Tag::Image { dest_url, .. }) if is_local_image(dest_url) => {
                Some(base_dir.join(&**dest_url))
            },
            _ => None,
        };
        let (Some(path), Some(uploader)) = (local_image, uploader) else {
            rendered.push(event);
            continue;
        };

        let replacer = match uploaded.get(&path) {
            Some(replacer) => Some(replacer.clone()),
            None => match uploader.upload(&path).await {
                Ok(attachment) => {
                    uploaded.insert(path.clone(), attachment.replacer.clone());
                    Some(attachment.replacer)
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "image upload failed, keeping link");
                    None
                },
            },
        };

        match replacer {
            Some(replacer) => {
                skip_image(&mut iter);
                rendered.push(Event::InlineHtml(replacer.into()));
            },
            None => rendered.push(event),
        }
    }

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, rendered.into_iter());
    out
}

/// Consume the alt-text events up to the end of the current image.
fn skip_image<'a>(events: &mut impl Iterator<Item = Event<'a>>) {
    let mut depth = 1usize;
    for event in events {
        match event {
            Event::Start(Tag::Image { .. }) => depth += 1,
            Event::End(TagEnd::Image) => {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            },
            _ => {},
        }
    }
}

/// Render one Markdown file wrapped in `<div class="markdown">`.
pub async fn render_file(path: &Path, uploader: Option<&dyn ImageUploader>) -> Result<String> {
    info!(path = %path.display(), "reading");
    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let body = render_markdown(&source, base_dir, uploader).await;
    Ok(format!(r#"<div class="markdown">{body}</div>"#))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        super::*,
        std::sync::{Mutex, PoisonError},
    };

    #[derive(Default)]
    struct RecordingUploader {
        uploads: Mutex<Vec<PathBuf>>,
        fail: bool,
    }

    #[async_trait]
    impl ImageUploader for RecordingUploader {
        async fn upload(&self, path: &Path) -> Result<Attachment> {
            self.uploads
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(path.to_path_buf());
            if self.fail {
                return Err(Error::io(path, std::io::ErrorKind::NotFound.into()));
            }
            let name = path.file_name().unwrap().to_string_lossy();
            Ok(Attachment {
                url: format!("http://cdn.example/{name}"),
                replacer: format!("[##_1N|{name}|_##]"),
            })
        }
    }

    #[tokio::test]
    async fn renders_common_extensions() {
        let md = "# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~ and \"quoted\"\n";
        let html = render_markdown(md, Path::new("."), None).await;
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains('\u{201c}'), "smart quotes: {html}");
    }

    #[tokio::test]
    async fn renders_definition_lists_and_heading_ids() {
        let md = "## Setup {#setup}\n\nTerm\n: Definition\n";
        let html = render_markdown(md, Path::new("."), None).await;
        assert!(html.contains(r#"<h2 id="setup">Setup</h2>"#), "{html}");
        assert!(html.contains("<dt>Term</dt>"), "{html}");
        assert!(html.contains("<dd>Definition</dd>"), "{html}");
    }

    #[tokio::test]
    async fn local_images_are_replaced() {
        let uploader = RecordingUploader::default();
        let md = "before ![a *cat*](img/cat.png \"t\") after";
        let html = render_markdown(md, Path::new("/posts"), Some(&uploader)).await;

        assert!(html.contains("before [##_1N|cat.png|_##] after"), "{html}");
        assert!(!html.contains("<img"));
        assert_eq!(*uploader.uploads.lock().unwrap(), vec![PathBuf::from("/posts/img/cat.png")]);
    }

    #[tokio::test]
    async fn remote_images_are_left_alone() {
        let uploader = RecordingUploader::default();
        let md = "![x](https://example.com/x.png) ![y](//cdn.example/y.png)";
        let html = render_markdown(md, Path::new("."), Some(&uploader)).await;
        assert!(html.contains(r#"<img src="https://example.com/x.png""#));
        assert!(uploader.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_upload_keeps_img_tag() {
        let uploader = RecordingUploader {
            fail: true,
            ..Default::default()
        };
        let html = render_markdown("![alt](missing.png)", Path::new("."), Some(&uploader)).await;
        assert!(html.contains(r#"<img src="missing.png" alt="alt""#), "{html}");
    }

    #[tokio::test]
    async fn repeated_image_is_uploaded_once() {
        let uploader = RecordingUploader::default();
        let md = "![a](cat.png)\n\n![b](cat.png)";
        let html = render_markdown(md, Path::new("dir"), Some(&uploader)).await;
        assert_eq!(html.matches("[##_1N|cat.png|_##]").count(), 2);
        assert_eq!(uploader.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn without_uploader_images_stay_local() {
        let html = render_markdown("![alt](cat.png)", Path::new("."), None).await;
        assert!(html.contains(r#"<img src="cat.png""#));
    }

    #[test]
    fn local_image_detection() {
        assert!(is_local_image("cat.png"));
        assert!(is_local_image("../img/cat.png"));
        assert!(is_local_image("/abs/cat.png"));
        assert!(!is_local_image("http://example.com/cat.png"));
        assert!(!is_local_image("data:image/png;base64,AAAA"));
        assert!(!is_local_image("//cdn/cat.png"));
        assert!(!is_local_image(""));
    }

    #[tokio::test]
    async fn render_file_wraps_in_markdown_div() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post.md");
        std::fs::write(&path, "hello").unwrap();
        let html = render_file(&path, None).await.unwrap();
        assert_eq!(html, "<div class=\"markdown\"><p>hello</p>\n</div>");
    }

    #[tokio::test]
    async fn render_missing_file_is_io_error() {
        let err = render_file(Path::new("/no/such/post.md"), None).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
