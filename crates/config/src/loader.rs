use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use {
    anyhow::{Context, bail},
    tracing::debug,
};

use crate::schema::StoryConfig;

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["story.toml", "story.yaml", "story.yml", "story.json"];

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "STORY_CONFIG_DIR";

/// Lock guarding config read-modify-write cycles.
static CONFIG_SAVE_LOCK: Mutex<()> = Mutex::new(());

/// A config file at an explicit location.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Use the config file at `path`. The format follows the extension.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Find the config file in the standard location.
    ///
    /// Returns the first existing `story.{toml,yaml,yml,json}` in
    /// [`config_dir`], or `story.toml` there when none exists yet.
    pub fn discover() -> Self {
        let dir = config_dir().unwrap_or_else(|| PathBuf::from("."));
        let path = find_config_file(&dir).unwrap_or_else(|| dir.join(CONFIG_FILENAMES[0]));
        debug!(path = %path.display(), "resolved config path");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the config, failing when the file is missing or malformed.
    pub fn load(&self) -> anyhow::Result<StoryConfig> {
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        parse_config(&raw, &self.path)
    }

    /// Load the config, or the defaults when no file exists yet.
    pub fn load_or_default(&self) -> anyhow::Result<StoryConfig> {
        if !self.exists() {
            debug!(path = %self.path.display(), "no config file, using defaults");
            return Ok(StoryConfig::default());
        }
        self.load()
    }

    /// Serialize `config` and write it to the store's path.
    ///
    /// Prefer [`ConfigStore::update`] for read-modify-write cycles.
    pub fn save(&self, config: &StoryConfig) -> anyhow::Result<()> {
        let _guard = CONFIG_SAVE_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.save_inner(config)
    }

    /// Load the current config (or defaults), apply `f`, and save.
    pub fn update(&self, f: impl FnOnce(&mut StoryConfig)) -> anyhow::Result<StoryConfig> {
        let _guard = CONFIG_SAVE_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut config = self.load_or_default()?;
        f(&mut config);
        self.save_inner(&config)?;
        Ok(config)
    }

    fn save_inner(&self, config: &StoryConfig) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let data = serialize_config(config, &self.path)?;
        write_private(&self.path, &data)
            .with_context(|| format!("failed to write {}", self.path.display()))?;

        debug!(path = %self.path.display(), "saved config");
        Ok(())
    }
}

/// Write `data` to a file only the owner can read, tightening an existing one
/// before anything is written.
fn write_private(path: &Path, data: &str) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(data.as_bytes())?;
    file.sync_all()
}

/// Returns the config directory: `$STORY_CONFIG_DIR`, or `~/.config/story/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    home_dir().map(|h| h.join(".config").join("story"))
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

fn format_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("toml")
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<StoryConfig> {
    let parsed = match format_of(path) {
        "toml" => toml::from_str(raw).map_err(anyhow::Error::from),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(anyhow::Error::from),
        "json" => serde_json::from_str(raw).map_err(anyhow::Error::from),
        ext => bail!("unsupported config format: .{ext}"),
    };
    parsed.with_context(|| format!("failed to parse {}", path.display()))
}

fn serialize_config(config: &StoryConfig, path: &Path) -> anyhow::Result<String> {
    let data = match format_of(path) {
        "toml" => toml::to_string_pretty(config)?,
        "yaml" | "yml" => serde_yaml::to_string(config)?,
        "json" => serde_json::to_string_pretty(config)?,
        ext => bail!("unsupported config format: .{ext}"),
    };
    Ok(data)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {super::*, crate::schema::FlowKind, secrecy::Secret};

    fn sample() -> StoryConfig {
        StoryConfig {
            redirect_port: 20000,
            redirect_path: "cb".into(),
            flow: FlowKind::Implicit,
            client_id: "client".into(),
            client_secret: None,
            access_token: Some(Secret::new("token-1".into())),
        }
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("story.toml"));
        assert!(!store.exists());
        assert!(store.load().is_err());
        let cfg = store.load_or_default().unwrap();
        assert_eq!(cfg.redirect_port, 18769);
    }

    #[test]
    fn save_then_load_each_format() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["story.toml", "story.yaml", "story.json"] {
            let store = ConfigStore::with_path(dir.path().join(name));
            store.save(&sample()).unwrap();
            let cfg = store.load().unwrap();
            assert_eq!(cfg.redirect_port, 20000, "{name}");
            assert_eq!(cfg.flow, FlowKind::Implicit, "{name}");
            assert_eq!(cfg.access_token(), Some("token-1"), "{name}");
        }
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("nested").join("story.toml"));
        store.save(&sample()).unwrap();
        assert!(store.exists());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("story.toml"));
        store.save(&sample()).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn existing_readable_file_is_made_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.toml");
        std::fs::write(&path, "").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = ConfigStore::with_path(path);
        store.save(&sample()).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.load().unwrap().access_token(), Some("token-1"));
    }

    #[test]
    fn update_preserves_untouched_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("story.toml"));
        store.save(&sample()).unwrap();

        store
            .update(|cfg| cfg.access_token = Some(Secret::new("token-2".into())))
            .unwrap();

        let cfg = store.load().unwrap();
        assert_eq!(cfg.access_token(), Some("token-2"));
        assert_eq!(cfg.client_id, "client");
        assert_eq!(cfg.redirect_path, "cb");
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("story.ini"));
        assert!(store.save(&sample()).is_err());
    }

    #[test]
    fn finds_first_existing_file_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_config_file(dir.path()).is_none());
        std::fs::write(dir.path().join("story.json"), "{}").unwrap();
        assert_eq!(
            find_config_file(dir.path()).unwrap(),
            dir.path().join("story.json")
        );
    }
}
