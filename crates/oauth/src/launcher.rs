use anyhow::Context;

/// Opens a URL for the user, usually in the default browser.
pub trait UrlLauncher: Send + Sync {
    fn launch(&self, url: &str) -> anyhow::Result<()>;
}

/// Launches the platform's default URL handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl UrlLauncher for SystemBrowser {
    fn launch(&self, url: &str) -> anyhow::Result<()> {
        open::that_detached(url).context("failed to open browser")
    }
}
