use std::{
    collections::HashMap,
    env, fmt, fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Once, RwLock},
};

use tracing::{debug, warn};

use crate::{errors::Error, Result};

// ============== Well-known secrets ==============

pub const TELEGRAM_BOT_TOKEN: &str = "telegram-bot-token";
pub const WEATHER_PROVIDER_KEY: &str = "weather-provider-key";
pub const CITY_PROVIDER_KEY: &str = "city-provider-key";

/// A secret value. No `Display`; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Where a logical secret name can be found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretSource {
    pub env_var: String,
    pub file_name: String,
}

impl SecretSource {
    pub fn new(env_var: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            file_name: file_name.into(),
        }
    }

    /// Fallback for names without an explicit mapping:
    /// `my-key` -> env `MY_KEY`, file `my-key.txt`.
    pub fn derived(name: &str) -> Self {
        Self::new(
            name.to_uppercase().replace(['-', '.', ' '], "_"),
            format!("{name}.txt"),
        )
    }
}

#[derive(Clone, Debug)]
pub struct KeyConfig {
    pub keys_directory: PathBuf,
    pub directory_mode: u32,
    pub file_mode: u32,
    pub sources: HashMap<String, SecretSource>,
}

impl KeyConfig {
    pub fn new(keys_directory: impl Into<PathBuf>) -> Self {
        let sources = [
            (
                TELEGRAM_BOT_TOKEN,
                SecretSource::new("TELEGRAM_BOT_TOKEN", "private_telegram_key.txt"),
            ),
            (
                WEATHER_PROVIDER_KEY,
                SecretSource::new("OPENWEATHER_API_KEY", "private_owm_key.txt"),
            ),
            (
                CITY_PROVIDER_KEY,
                SecretSource::new("API_NINJAS_KEY", "private_api_ninjas_key.txt"),
            ),
        ]
        .into_iter()
        .map(|(name, src)| (name.to_string(), src))
        .collect();

        Self {
            keys_directory: keys_directory.into(),
            directory_mode: 0o700,
            file_mode: 0o600,
            sources,
        }
    }

    pub fn with_source(mut self, name: &str, source: SecretSource) -> Self {
        self.sources.insert(name.to_string(), source);
        self
    }

    fn source_for(&self, name: &str) -> SecretSource {
        self.sources
            .get(name)
            .cloned()
            .unwrap_or_else(|| SecretSource::derived(name))
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self::new("private_keys")
    }
}

// ============== KeyStore ==============

/// Resolves named secrets: environment first, then files under the keys directory.
///
/// Results are cached per name for the lifetime of the store. Errors carry the
/// logical name and file path, never the value.
pub struct KeyStore {
    cfg: KeyConfig,
    cache: RwLock<HashMap<String, Secret>>,
    dir_checked: Once,
}

impl KeyStore {
    pub fn new(cfg: KeyConfig) -> Self {
        Self {
            cfg,
            cache: RwLock::new(HashMap::new()),
            dir_checked: Once::new(),
        }
    }

    pub fn keys_directory(&self) -> &Path {
        &self.cfg.keys_directory
    }

    pub fn get_secret(&self, name: &str) -> Result<Secret> {
        if let Some(hit) = self.cached(name) {
            return Ok(hit);
        }

        let secret = self.resolve(name)?;

        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(cache
            .entry(name.to_string())
            .or_insert(secret)
            .clone())
    }

    fn cached(&self, name: &str) -> Option<Secret> {
        let cache = self
            .cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.get(name).cloned()
    }

    fn resolve(&self, name: &str) -> Result<Secret> {
        let source = self.cfg.source_for(name);

        if let Some(value) = env::var(&source.env_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            debug!(secret = name, env = %source.env_var, "secret resolved from environment");
            return Ok(Secret(value.trim().to_string()));
        }

        let path = self.resolve_path(&source.file_name);
        self.normalize_directory();

        if !path.is_file() {
            return Err(Error::SecretNotFound(format!(
                "{name} (set {} or create {})",
                source.env_var,
                path.display()
            )));
        }

        normalize_mode(&path, self.cfg.file_mode);

        let raw = fs::read_to_string(&path).map_err(|e| {
            Error::SecretInvalid(format!("{name}: failed to read {}: {e}", path.display()))
        })?;
        let value = raw.trim();
        if value.is_empty() {
            return Err(Error::SecretInvalid(format!(
                "{name}: key file is empty: {}",
                path.display()
            )));
        }

        debug!(secret = name, path = %path.display(), "secret resolved from file");
        Ok(Secret(value.to_string()))
    }

    fn resolve_path(&self, file_name: &str) -> PathBuf {
        let p = Path::new(file_name);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.cfg.keys_directory.join(p)
        }
    }

    fn normalize_directory(&self) {
        self.dir_checked.call_once(|| {
            if self.cfg.keys_directory.is_dir() {
                normalize_mode(&self.cfg.keys_directory, self.cfg.directory_mode);
            }
        });
    }

    /// Write a secret to its backing file with owner-only permissions.
    pub fn save_secret(&self, name: &str, value: &str, overwrite: bool) -> Result<PathBuf> {
        let source = self.cfg.source_for(name);
        let path = self.resolve_path(&source.file_name);

        if path.exists() && !overwrite {
            return Err(Error::Config(format!(
                "key file already exists: {} (pass overwrite to replace)",
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
            normalize_mode(parent, self.cfg.directory_mode);
        }

        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(self.cfg.file_mode);
        }
        let mut file = opts.open(&path)?;
        file.write_all(value.as_bytes())?;
        normalize_mode(&path, self.cfg.file_mode);

        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.remove(name);

        Ok(path)
    }

    /// File names of all `*.txt` key files in the keys directory.
    pub fn list_secret_files(&self) -> Result<Vec<String>> {
        let rd = match fs::read_dir(&self.cfg.keys_directory) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut out = rd
            .flatten()
            .map(|ent| ent.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect::<Vec<_>>();
        out.sort();
        Ok(out)
    }
}

/// Best-effort chmod to `mode`. Never fails the caller.
#[cfg(unix)]
fn normalize_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    let current = match fs::metadata(path) {
        Ok(md) => md.permissions().mode() & 0o777,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not stat key path");
            return;
        }
    };
    if current == mode {
        return;
    }
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        warn!(
            path = %path.display(),
            error = %e,
            "could not set permissions to {mode:o}"
        );
    }
}

#[cfg(not(unix))]
fn normalize_mode(_path: &Path, _mode: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path, name: &str, env_var: &str) -> KeyStore {
        KeyStore::new(
            KeyConfig::new(dir).with_source(name, SecretSource::new(env_var, format!("{name}.txt"))),
        )
    }

    #[test]
    fn environment_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("precedence.txt"), "from-file").unwrap();
        env::set_var("WAB_TEST_PRECEDENCE_KEY", "from-env");

        let ks = store(dir.path(), "precedence", "WAB_TEST_PRECEDENCE_KEY");
        assert_eq!(ks.get_secret("precedence").unwrap().expose(), "from-env");

        env::remove_var("WAB_TEST_PRECEDENCE_KEY");
    }

    #[test]
    fn falls_back_to_trimmed_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fallback.txt"), "  abc123\n").unwrap();

        let ks = store(dir.path(), "fallback", "WAB_TEST_FALLBACK_UNSET");
        assert_eq!(ks.get_secret("fallback").unwrap().expose(), "abc123");
    }

    #[test]
    fn empty_env_value_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blank-env.txt"), "file-value").unwrap();
        env::set_var("WAB_TEST_BLANK_ENV", "");

        let ks = store(dir.path(), "blank-env", "WAB_TEST_BLANK_ENV");
        assert_eq!(ks.get_secret("blank-env").unwrap().expose(), "file-value");

        env::remove_var("WAB_TEST_BLANK_ENV");
    }

    #[test]
    fn missing_everywhere_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let ks = store(dir.path(), "missing", "WAB_TEST_MISSING_UNSET");
        let err = ks.get_secret("missing").unwrap_err();
        assert!(matches!(err, Error::SecretNotFound(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let ks = store(&dir.path().join("nope"), "nodir", "WAB_TEST_NODIR_UNSET");
        assert!(matches!(
            ks.get_secret("nodir"),
            Err(Error::SecretNotFound(_))
        ));
    }

    #[test]
    fn empty_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.txt"), "  \n").unwrap();

        let ks = store(dir.path(), "empty", "WAB_TEST_EMPTY_UNSET");
        assert!(matches!(
            ks.get_secret("empty"),
            Err(Error::SecretInvalid(_))
        ));
    }

    #[test]
    fn lookups_are_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached.txt");
        std::fs::write(&path, "first").unwrap();

        let ks = store(dir.path(), "cached", "WAB_TEST_CACHED_UNSET");
        assert_eq!(ks.get_secret("cached").unwrap().expose(), "first");

        std::fs::write(&path, "second").unwrap();
        assert_eq!(ks.get_secret("cached").unwrap().expose(), "first");
    }

    #[test]
    fn errors_do_not_leak_values() {
        let dir = tempfile::tempdir().unwrap();
        env::set_var("WAB_TEST_LEAK_KEY", "super-secret-value");
        let ks = store(dir.path(), "leak", "WAB_TEST_LEAK_KEY");
        let secret = ks.get_secret("leak").unwrap();
        assert!(!format!("{secret:?}").contains("super-secret-value"));
        env::remove_var("WAB_TEST_LEAK_KEY");
    }

    #[test]
    fn unmapped_names_derive_their_source() {
        let src = SecretSource::derived("my-extra.key");
        assert_eq!(src.env_var, "MY_EXTRA_KEY");
        assert_eq!(src.file_name, "my-extra.key.txt");
    }

    #[test]
    fn save_then_list_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let keys = dir.path().join("keys");
        let ks = store(&keys, "saved", "WAB_TEST_SAVED_UNSET");

        let path = ks.save_secret("saved", "s3cret", false).unwrap();
        assert!(path.is_file());
        assert_eq!(ks.list_secret_files().unwrap(), vec!["saved.txt".to_string()]);
        assert_eq!(ks.get_secret("saved").unwrap().expose(), "s3cret");

        assert!(matches!(
            ks.save_secret("saved", "other", false),
            Err(Error::Config(_))
        ));
        ks.save_secret("saved", "other", true).unwrap();
        assert_eq!(ks.get_secret("saved").unwrap().expose(), "other");
    }

    #[cfg(unix)]
    #[test]
    fn permissions_are_normalized_on_first_access() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let keys = dir.path().join("keys");
        std::fs::create_dir(&keys).unwrap();
        std::fs::set_permissions(&keys, std::fs::Permissions::from_mode(0o755)).unwrap();
        let file = keys.join("perm.txt");
        std::fs::write(&file, "value").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();

        let ks = store(&keys, "perm", "WAB_TEST_PERM_UNSET");
        ks.get_secret("perm").unwrap();

        let dir_mode = std::fs::metadata(&keys).unwrap().permissions().mode() & 0o777;
        let file_mode = std::fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
        assert_eq!(file_mode, 0o600);
    }
}
