use {
    anyhow::{Result, bail},
    secrecy::Secret,
    story_blog::{BlogClient, NewPost, Outcome, PostEdit},
    story_config::ConfigStore,
};

/// Overrides the blog API base URL.
const API_URL_ENV: &str = "STORY_API_URL";

fn client(store: &ConfigStore) -> Result<BlogClient> {
    client_with(store, |key| std::env::var(key).ok())
}

fn client_with(store: &ConfigStore, lookup: impl Fn(&str) -> Option<String>) -> Result<BlogClient> {
    if !store.exists() {
        bail!("no config at {}, try `story init` first", store.path().display());
    }
    let config = store.load()?;
    let Some(token) = config.access_token() else {
        bail!("no access token saved, try `story init` first");
    };
    let client = BlogClient::new(Secret::new(token.to_string()));
    Ok(match lookup(API_URL_ENV) {
        Some(url) if !url.is_empty() => client.with_base_url(url),
        _ => client,
    })
}

pub async fn info(store: &ConfigStore) -> Result<()> {
    println!("{}", client(store)?.info().await?);
    Ok(())
}

pub async fn show(store: &ConfigStore, blog: &str, post_id: &str) -> Result<()> {
    let post = client(store)?.read_post(blog, post_id).await?;
    println!("{}", serde_json::to_string_pretty(&post)?);
    Ok(())
}

pub async fn post(store: &ConfigStore, post: NewPost) -> Result<()> {
    let outcome = story_blog::publish(&client(store)?, &post).await?;
    report(outcome);
    Ok(())
}

pub async fn edit(store: &ConfigStore, edit: PostEdit) -> Result<()> {
    let outcome = story_blog::edit(&client(store)?, &edit).await?;
    report(outcome);
    Ok(())
}

fn report(outcome: Outcome) {
    match outcome {
        Outcome::Published { url } => println!("{url}"),
        Outcome::DryRun { title, content } => println!("{title}\n\n{content}"),
    }
}
