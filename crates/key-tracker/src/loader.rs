//! Config file discovery, loading, and environment variable overlay.
//!
//! Files are loaded in order (later wins):
//! 1. `~/.config/key-tracker/config.toml` (user)
//! 2. `./key-tracker.toml` (local override), or an explicit path
//! 3. Environment variables (`KEY_TRACKER_*`)
//!
//! Tables are merged key by key before deserializing, so a local file can
//! change one nested value without restating its section.

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::AnalyzerConfig;
use crate::error::{Error, Result};

pub const ENV_CONFIDENCE_THRESHOLD: &str = "KEY_TRACKER_CONFIDENCE_THRESHOLD";
pub const ENV_WINDOW_MEASURES: &str = "KEY_TRACKER_WINDOW_MEASURES";
pub const ENV_OVERLAP_RATIO: &str = "KEY_TRACKER_OVERLAP_RATIO";
pub const ENV_STABILITY_THRESHOLD: &str = "KEY_TRACKER_STABILITY_THRESHOLD";
pub const ENV_ADAPTIVE_WINDOW: &str = "KEY_TRACKER_ADAPTIVE_WINDOW";

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (user, local). Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with an explicit override path.
///
/// If `override_path` is provided and exists, it replaces the local file.
pub fn discover_config_files_with_override(override_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("key-tracker/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = override_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("key-tracker.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file into a raw table.
pub fn load_from_file(path: &Path) -> Result<toml::Table> {
    let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table> {
    contents
        .parse()
        .map_err(|e: toml::de::Error| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Parse a complete config from a TOML string. Missing fields take defaults.
pub fn parse_toml(contents: &str, path: &Path) -> Result<AnalyzerConfig> {
    from_table(parse_table(contents, path)?, path)
}

fn from_table(table: toml::Table, path: &Path) -> Result<AnalyzerConfig> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Deep-merge `overlay` into `base`; nested tables merge, everything else
/// is replaced.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                    continue;
                }
                base.insert(key, toml::Value::Table(incoming));
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut AnalyzerConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |name| env::var(name).ok());
}

/// Apply overrides from an arbitrary variable lookup.
///
/// Values that fail to parse are skipped with a warning.
pub fn apply_overrides_from<F>(config: &mut AnalyzerConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = parsed::<f64, _>(&lookup, ENV_CONFIDENCE_THRESHOLD) {
        config.confidence_threshold = v;
        sources.env_overrides.push(ENV_CONFIDENCE_THRESHOLD.to_string());
    }
    if let Some(v) = parsed::<f64, _>(&lookup, ENV_WINDOW_MEASURES) {
        config.base_window_measures = v;
        sources.env_overrides.push(ENV_WINDOW_MEASURES.to_string());
    }
    if let Some(v) = parsed::<f64, _>(&lookup, ENV_OVERLAP_RATIO) {
        config.overlap_ratio = v;
        sources.env_overrides.push(ENV_OVERLAP_RATIO.to_string());
    }
    if let Some(v) = parsed::<usize, _>(&lookup, ENV_STABILITY_THRESHOLD) {
        config.stability_threshold = v;
        sources.env_overrides.push(ENV_STABILITY_THRESHOLD.to_string());
    }
    if let Some(v) = parsed::<bool, _>(&lookup, ENV_ADAPTIVE_WINDOW) {
        config.adaptive_window = v;
        sources.env_overrides.push(ENV_ADAPTIVE_WINDOW.to_string());
    }
}

fn parsed<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` in place of `./key-tracker.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which sources contributed.
    ///
    /// The merged result is validated before it is returned.
    pub fn load_with_sources_from(config_path: Option<&Path>) -> Result<(Self, ConfigSources)> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in discover_config_files_with_override(config_path) {
            let table = load_from_file(&path)?;
            merge_tables(&mut merged, table);
            debug!(path = %path.display(), "loaded config file");
            sources.files.push(path);
        }

        let origin = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let mut config = from_table(merged, &origin)?;

        apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChordRootRule;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_override_path_is_loaded_last() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "confidence_threshold = 0.7").unwrap();
        let files = discover_config_files_with_override(Some(file.path()));
        assert_eq!(files.last().map(|p| p.as_path()), Some(file.path()));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = parse_toml("base_window_measures = 4.0\n", Path::new("test.toml")).unwrap();
        assert_eq!(config.base_window_measures, 4.0);
        // Other values should be defaults
        assert_eq!(config.stability_threshold, 3);
        assert_eq!(config.evidence.reliability.chord_root, 0.9);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
base_window_measures = 3.0
overlap_ratio = 0.25
confidence_threshold = 0.6
stability_threshold = 4
adaptive_window = false

[default_time_signature]
numerator = 3
denominator = 4

[fallback]
window_seconds = 4.0

[evidence]
melodic = false
chord_root_rule = "lowest_pitch"

[evidence.reliability]
chord_root = 0.8

[profiles]
major = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.base_window_measures, 3.0);
        assert_eq!(config.overlap_ratio, 0.25);
        assert_eq!(config.stability_threshold, 4);
        assert!(!config.adaptive_window);
        assert_eq!(config.default_time_signature.numerator, 3);
        assert_eq!(config.fallback.window_seconds, 4.0);
        assert_eq!(config.fallback.step_seconds, 1.0);
        assert!(!config.evidence.melodic);
        assert!(config.evidence.chord_root);
        assert_eq!(config.evidence.chord_root_rule, ChordRootRule::LowestPitch);
        assert_eq!(config.evidence.reliability.chord_root, 0.8);
        assert_eq!(config.evidence.reliability.melodic, 0.7);
        assert_eq!(config.profiles.major[4], 1.0);
        assert_eq!(config.profiles.minor, crate::profile::KRUMHANSL_MINOR);
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = parse_toml("overlap_ratio = [", Path::new("broken.toml")).unwrap_err();
        match err {
            Error::ConfigParse { path, .. } => assert_eq!(path, PathBuf::from("broken.toml")),
            other => panic!("expected ConfigParse, got {:?}", other),
        }

        let err = parse_toml("overlap_ratio = \"half\"", Path::new("typed.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_merge_tables_is_deep() {
        let mut base: toml::Table = r#"
confidence_threshold = 0.6
[evidence]
melodic = false
[evidence.reliability]
pitch_class = 0.5
chord_root = 0.5
"#
        .parse()
        .unwrap();
        let overlay: toml::Table = r#"
[evidence.reliability]
chord_root = 0.75
"#
        .parse()
        .unwrap();
        merge_tables(&mut base, overlay);
        let config = from_table(base, Path::new("merged")).unwrap();
        assert_eq!(config.confidence_threshold, 0.6);
        assert!(!config.evidence.melodic);
        assert_eq!(config.evidence.reliability.pitch_class, 0.5);
        assert_eq!(config.evidence.reliability.chord_root, 0.75);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_CONFIDENCE_THRESHOLD, "0.7"),
            (ENV_WINDOW_MEASURES, "4"),
            (ENV_STABILITY_THRESHOLD, "not-a-number"),
            (ENV_ADAPTIVE_WINDOW, "false"),
        ]
        .into_iter()
        .collect();

        let mut config = AnalyzerConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |name| {
            vars.get(name).map(|v| v.to_string())
        });

        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.base_window_measures, 4.0);
        assert_eq!(config.stability_threshold, 3);
        assert!(!config.adaptive_window);
        assert_eq!(
            sources.env_overrides,
            vec![
                ENV_CONFIDENCE_THRESHOLD.to_string(),
                ENV_WINDOW_MEASURES.to_string(),
                ENV_ADAPTIVE_WINDOW.to_string()
            ]
        );
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[evidence]\nchord_sample_interval = 0.5").unwrap();
        let (config, sources) = AnalyzerConfig::load_with_sources_from(Some(file.path())).unwrap();
        assert_eq!(sources.files.last().map(|p| p.as_path()), Some(file.path()));
        assert_eq!(config.evidence.chord_sample_interval, 0.5);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "overlap_ratio = 1.5").unwrap();
        let err = AnalyzerConfig::load_from(Some(file.path())).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
