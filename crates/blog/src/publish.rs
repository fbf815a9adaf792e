//! Post creation and editing from Markdown sources.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::{
    client::BlogClient,
    error::{Error, Result},
    render::{BlogImageUploader, ImageUploader, render_file},
};

/// A new post to create from a Markdown file or directory.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub blog: String,
    pub title: String,
    pub source: PathBuf,
    pub dry_run: bool,
}

/// Changes to an existing post. At least one of `title` and `source` is set.
#[derive(Debug, Clone)]
pub struct PostEdit {
    pub blog: String,
    pub post_id: String,
    pub title: Option<String>,
    pub source: Option<PathBuf>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The post was sent; this is its URL.
    Published { url: String },
    /// Nothing was sent. Holds what would have been.
    DryRun { title: String, content: String },
}

/// The Markdown files a source path stands for.
///
/// A file is used as is; a directory contributes its `*.md` files in name order.
pub fn collect_markdown_files(source: &Path) -> Result<Vec<PathBuf>> {
    let meta = std::fs::metadata(source).map_err(|e| Error::io(source, e))?;
    if !meta.is_dir() {
        return Ok(vec![source.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(source).map_err(|e| Error::io(source, e))? {
        let path = entry.map_err(|e| Error::io(source, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            files.push(path);
        }
    }
    if files.is_empty() {
        return Err(Error::NoMarkdownFiles(source.to_path_buf()));
    }
    files.sort();
    Ok(files)
}

/// Render every Markdown file of `source` and concatenate the results.
pub async fn render_document(
    source: &Path,
    uploader: Option<&dyn ImageUploader>,
) -> Result<String> {
    let mut content = String::new();
    for file in collect_markdown_files(source)? {
        content.push_str(&render_file(&file, uploader).await?);
    }
    Ok(content)
}

/// Create a post. Images are only uploaded when not a dry run.
pub async fn publish(client: &BlogClient, post: &NewPost) -> Result<Outcome> {
    let uploader = BlogImageUploader::new(client, &post.blog);
    let uploader = (!post.dry_run).then_some(&uploader as &dyn ImageUploader);
    let content = render_document(&post.source, uploader).await?;

    if post.dry_run {
        info!(blog = %post.blog, "dry run, post not created");
        return Ok(Outcome::DryRun {
            title: post.title.clone(),
            content,
        });
    }

    let url = client.write_post(&post.blog, &post.title, &content).await?;
    Ok(Outcome::Published { url })
}

/// Update a post's title and/or content, keeping whatever is not replaced.
pub async fn edit(client: &BlogClient, edit: &PostEdit) -> Result<Outcome> {
    if edit.title.is_none() && edit.source.is_none() {
        return Err(Error::NothingToEdit);
    }

    let current = client.read_post(&edit.blog, &edit.post_id).await?;
    let title = edit.title.clone().unwrap_or(current.title);
    let content = match &edit.source {
        Some(source) => {
            let uploader = BlogImageUploader::new(client, &edit.blog);
            let uploader = (!edit.dry_run).then_some(&uploader as &dyn ImageUploader);
            render_document(source, uploader).await?
        },
        None => current.content,
    };

    if edit.dry_run {
        info!(blog = %edit.blog, post_id = %edit.post_id, "dry run, post not modified");
        return Ok(Outcome::DryRun { title, content });
    }

    let url = client
        .modify_post(&edit.blog, &edit.post_id, &title, &content)
        .await?;
    Ok(Outcome::Published { url })
}
