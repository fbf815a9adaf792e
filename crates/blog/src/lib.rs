//! Blog REST API client and Markdown publishing.

pub mod client;
pub mod error;
pub mod publish;
pub mod render;
pub mod types;

pub use {
    client::{BlogClient, DEFAULT_API_URL},
    error::{Error, Result},
    publish::{NewPost, Outcome, PostEdit, edit, publish},
    render::{BlogImageUploader, ImageUploader, render_markdown},
    types::{Attachment, Post},
};
