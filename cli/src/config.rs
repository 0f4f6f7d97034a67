use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use ghmacros_search::atomic_write::write_atomic_text;
use ghmacros_search::cache::DEFAULT_MAX_CACHED_QUERIES;
use ghmacros_search::http_catalog::DEFAULT_ENDPOINT;
use ghmacros_search::pager::DEFAULT_DEBOUNCE;
use ghmacros_search::pager::PagerConfig;
use ghmacros_search::persist::DEFAULT_SUGGESTIONS_FRESHNESS;
use ghmacros_search::scroll::DEFAULT_LOAD_MORE_THRESHOLD_PX;
use toml_edit::DocumentMut;
use toml_edit::Item as TomlItem;
use toml_edit::Value as TomlValue;

const SECONDS_PER_HOUR: u64 = 60 * 60;

/// Settings read from `~/.ghmacros/config.toml`.
#[derive(Debug, Clone, PartialEq)]
pub struct MacrosConfig {
    pub endpoint: String,
    pub debounce: Duration,
    pub suggestions_freshness: Duration,
    pub load_more_threshold_px: f64,
    pub max_cached_queries: usize,
}

impl Default for MacrosConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            debounce: DEFAULT_DEBOUNCE,
            suggestions_freshness: DEFAULT_SUGGESTIONS_FRESHNESS,
            load_more_threshold_px: DEFAULT_LOAD_MORE_THRESHOLD_PX,
            max_cached_queries: DEFAULT_MAX_CACHED_QUERIES,
        }
    }
}

impl MacrosConfig {
    pub fn pager_config(&self) -> PagerConfig {
        PagerConfig {
            debounce: self.debounce,
            load_more_threshold_px: self.load_more_threshold_px,
            max_cached_queries: self.max_cached_queries,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum ConfigKey {
    Endpoint,
    DebounceMs,
    SuggestionsFreshnessHours,
    LoadMoreThresholdPx,
    MaxCachedQueries,
}

impl ConfigKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::Endpoint => "endpoint",
            ConfigKey::DebounceMs => "debounce_ms",
            ConfigKey::SuggestionsFreshnessHours => "suggestions_freshness_hours",
            ConfigKey::LoadMoreThresholdPx => "load_more_threshold_px",
            ConfigKey::MaxCachedQueries => "max_cached_queries",
        }
    }

    /// Parse a command-line value into the TOML value stored for this key.
    fn parse_value(self, raw: &str) -> anyhow::Result<TomlValue> {
        let raw = raw.trim();
        let value = match self {
            ConfigKey::Endpoint => {
                url::Url::parse(raw).with_context(|| format!("invalid endpoint url: {raw}"))?;
                TomlValue::from(raw)
            }
            ConfigKey::DebounceMs | ConfigKey::SuggestionsFreshnessHours => {
                let n: u32 = raw
                    .parse()
                    .with_context(|| format!("{} must be a non-negative integer", self.as_str()))?;
                TomlValue::from(i64::from(n))
            }
            ConfigKey::MaxCachedQueries => {
                let n: u32 = raw
                    .parse()
                    .ok()
                    .filter(|n| *n > 0)
                    .with_context(|| format!("{} must be a positive integer", self.as_str()))?;
                TomlValue::from(i64::from(n))
            }
            ConfigKey::LoadMoreThresholdPx => {
                let px: f64 = raw
                    .parse()
                    .ok()
                    .filter(|px: &f64| px.is_finite() && *px >= 0.0)
                    .with_context(|| format!("{} must be a non-negative number", self.as_str()))?;
                TomlValue::from(px)
            }
        };
        Ok(value)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn new_default() -> anyhow::Result<Self> {
        let Some(home) = dirs::home_dir() else {
            anyhow::bail!("cannot determine home directory for config path");
        };
        Ok(Self::new(default_config_path(&home)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means defaults. A file that is not valid TOML is scanned
    /// line by line for known top-level keys.
    pub fn load(&self) -> anyhow::Result<MacrosConfig> {
        let Some(content) = read_document_string(&self.path)? else {
            return Ok(MacrosConfig::default());
        };

        let config = match content.parse::<DocumentMut>() {
            Ok(doc) => config_from_lookup(|key| {
                doc.get(key).and_then(TomlItem::as_value).cloned()
            }),
            Err(err) => {
                tracing::warn!(
                    "{} is not valid TOML ({err}); reading known keys line by line",
                    self.path.display()
                );
                config_from_lookup(|key| parse_value_fallback(&content, key))
            }
        };
        Ok(config)
    }

    /// Set one key, keeping the rest of the file (comments included) intact.
    pub fn set(&self, key: ConfigKey, raw: &str) -> anyhow::Result<()> {
        let new_value = key.parse_value(raw)?;
        let content = read_document_string(&self.path)?.unwrap_or_default();

        let updated = match content.parse::<DocumentMut>() {
            Ok(mut doc) => {
                doc[key.as_str()] = TomlItem::Value(new_value);
                doc.to_string()
            }
            Err(_) => append_value_fallback(&content, key, &new_value),
        };

        write_atomic_text(&self.path, &updated)
            .with_context(|| format!("write {}", self.path.display()))
    }
}

pub fn default_state_dir(home: &Path) -> PathBuf {
    home.join(".ghmacros")
}

fn default_config_path(home: &Path) -> PathBuf {
    default_state_dir(home).join("config.toml")
}

fn config_from_lookup(lookup: impl Fn(&str) -> Option<TomlValue>) -> MacrosConfig {
    let mut config = MacrosConfig::default();

    if let Some(endpoint) = lookup("endpoint") {
        match endpoint.as_str() {
            Some(endpoint) => config.endpoint = endpoint.to_string(),
            None => warn_ignored("endpoint"),
        }
    }
    if let Some(ms) = lookup("debounce_ms") {
        match non_negative(&ms) {
            Some(ms) => config.debounce = Duration::from_millis(ms),
            None => warn_ignored("debounce_ms"),
        }
    }
    if let Some(hours) = lookup("suggestions_freshness_hours") {
        match non_negative(&hours) {
            Some(hours) => {
                config.suggestions_freshness =
                    Duration::from_secs(hours.saturating_mul(SECONDS_PER_HOUR));
            }
            None => warn_ignored("suggestions_freshness_hours"),
        }
    }
    if let Some(px) = lookup("load_more_threshold_px") {
        let px = px
            .as_float()
            .or_else(|| px.as_integer().map(|n| n as f64))
            .filter(|px| px.is_finite() && *px >= 0.0);
        match px {
            Some(px) => config.load_more_threshold_px = px,
            None => warn_ignored("load_more_threshold_px"),
        }
    }
    if let Some(max) = lookup("max_cached_queries") {
        match non_negative(&max).and_then(|n| usize::try_from(n).ok()) {
            Some(max) if max > 0 => config.max_cached_queries = max,
            _ => warn_ignored("max_cached_queries"),
        }
    }

    config
}

fn non_negative(value: &TomlValue) -> Option<u64> {
    value.as_integer().and_then(|n| u64::try_from(n).ok())
}

fn warn_ignored(key: &str) {
    tracing::warn!("ignoring config key `{key}`: unexpected value");
}

/// Last `key = value` line anywhere in `contents`, parsed as a TOML value.
fn parse_value_fallback(contents: &str, key: &str) -> Option<TomlValue> {
    let mut result = None;
    for line in contents.lines() {
        let Some(line) = strip_toml_comment(line.trim_start()) else {
            continue;
        };
        let Some((line_key, value)) = line.split_once('=') else {
            continue;
        };
        if line_key.trim() != key {
            continue;
        }
        if let Ok(value) = value.trim().parse::<TomlValue>() {
            result = Some(value);
        }
    }
    result
}

fn strip_toml_comment(line: &str) -> Option<&str> {
    // Only strip `#` outside a quoted string so urls with fragments survive.
    let mut in_string = false;
    let mut end = line.len();
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => {
                end = idx;
                break;
            }
            _ => {}
        }
    }
    let line = line[..end].trim();
    if line.is_empty() { None } else { Some(line) }
}

fn append_value_fallback(existing: &str, key: ConfigKey, value: &TomlValue) -> String {
    let mut out = existing.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&format!("{} = {}\n", key.as_str(), value.to_string().trim()));
    out
}

fn read_document_string(path: &Path) -> anyhow::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(anyhow::Error::new(err).context("read config.toml")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::new(dir.path().join("config.toml"));
        assert_eq!(store.load().expect("load"), MacrosConfig::default());
    }

    #[test]
    fn reads_all_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"endpoint = "http://localhost:8080"
debounce_ms = 150
suggestions_freshness_hours = 2
load_more_threshold_px = 64
max_cached_queries = 8
"#,
        )
        .expect("write config");

        let config = ConfigStore::new(path).load().expect("load");
        assert_eq!(
            config,
            MacrosConfig {
                endpoint: "http://localhost:8080".to_string(),
                debounce: Duration::from_millis(150),
                suggestions_freshness: Duration::from_secs(2 * 60 * 60),
                load_more_threshold_px: 64.0,
                max_cached_queries: 8,
            }
        );
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "debounce_ms = -5\nmax_cached_queries = 0\n").expect("write");

        let config = ConfigStore::new(path).load().expect("load");
        assert_eq!(config.debounce, DEFAULT_DEBOUNCE);
        assert_eq!(config.max_cached_queries, DEFAULT_MAX_CACHED_QUERIES);
    }

    #[test]
    fn reads_keys_when_toml_is_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"# broken table header makes this TOML invalid
[other
key = 1

endpoint = "http://example.test/#api" # keep me
debounce_ms = 20
"#,
        )
        .expect("write config");

        let config = ConfigStore::new(path).load().expect("load");
        assert_eq!(config.endpoint, "http://example.test/#api");
        assert_eq!(config.debounce, Duration::from_millis(20));
    }

    #[test]
    fn set_preserves_comments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"# top comment
debounce_ms = 500 # typing delay

[extra]
key = 1
"#,
        )
        .expect("write config");

        let store = ConfigStore::new(path.clone());
        store
            .set(ConfigKey::DebounceMs, "250")
            .expect("set debounce");
        store
            .set(ConfigKey::Endpoint, "http://localhost:9000")
            .expect("set endpoint");

        let updated = std::fs::read_to_string(&path).expect("read updated");
        assert!(updated.contains("# top comment"));
        assert!(updated.contains("[extra]"));
        let config = store.load().expect("load");
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.endpoint, "http://localhost:9000");
    }

    #[test]
    fn set_rejects_invalid_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::new(dir.path().join("config.toml"));
        assert!(store.set(ConfigKey::Endpoint, "not a url").is_err());
        assert!(store.set(ConfigKey::MaxCachedQueries, "0").is_err());
        assert!(store.set(ConfigKey::LoadMoreThresholdPx, "-1").is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn set_appends_when_toml_is_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[broken\nmax_cached_queries = 3").expect("write");

        let store = ConfigStore::new(path.clone());
        store.set(ConfigKey::MaxCachedQueries, "9").expect("set");

        let updated = std::fs::read_to_string(&path).expect("read");
        assert_eq!(updated, "[broken\nmax_cached_queries = 3\nmax_cached_queries = 9\n");
        assert_eq!(store.load().expect("load").max_cached_queries, 9);
    }

    #[test]
    fn default_paths_use_ghmacros_home_dir() {
        let home = Path::new("home");
        assert_eq!(
            default_config_path(home),
            home.join(".ghmacros").join("config.toml")
        );
    }
}
