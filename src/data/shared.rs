//! Global data loading.

use crate::compiler::template::RenderContext;
use crate::config::SiteConfig;
use crate::log;
use anyhow::{Context, Result};
use serde_json::Value;
use std::{fs, path::Path};
use walkdir::WalkDir;

/// Keys the build owns. Data files with these stems are skipped.
pub const RESERVED_KEYS: &[&str] = &["site", "extra", "pages", "snippets", "content"];

/// Build the global map every page context starts from.
///
/// Reads top-level files of the data directory in name order; nested
/// directories are not descended into.
pub fn load_shared_data(config: &SiteConfig) -> Result<RenderContext> {
    let mut shared = RenderContext::new();
    shared.insert("site".into(), serde_json::to_value(&config.site)?);
    shared.insert("extra".into(), serde_json::to_value(&config.extra)?);

    let dir = config.data_dir();
    if !dir.is_dir() {
        return Ok(shared);
    }

    let entries = WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file());

    for entry in entries {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(value) = read_data_file(path)? else {
            continue;
        };
        if RESERVED_KEYS.contains(&stem) {
            log!("warn"; "data file {} shadows a reserved key, skipped", path.display());
            continue;
        }
        shared.insert(stem.to_owned(), value);
    }

    Ok(shared)
}

/// Parse one data file. Unsupported extensions yield `None`.
fn read_data_file(path: &Path) -> Result<Option<Value>> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    if !matches!(ext, "json" | "yaml" | "yml") {
        return Ok(None);
    }

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read data file {}", path.display()))?;

    let value = if ext == "json" {
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?
    } else {
        let yaml: serde_yaml::Value = serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?;
        serde_json::to_value(yaml)?
    };

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> SiteConfig {
        let mut config = SiteConfig::from_str("[site]\ntitle = \"Acme\"\n[extra]\nyear = 2024\n")
            .unwrap();
        config.resolve_paths(dir);
        config
    }

    #[test]
    fn test_site_and_extra_without_data_dir() {
        let dir = TempDir::new().unwrap();
        let shared = load_shared_data(&config_in(dir.path())).unwrap();

        assert_eq!(shared["site"]["title"], "Acme");
        assert_eq!(shared["extra"]["year"], 2024);
        assert_eq!(shared.len(), 2);
    }

    #[test]
    fn test_json_and_yaml_files() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let data = config.data_dir();
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("nav.json"), r#"{"links": [{"href": "/"}]}"#).unwrap();
        fs::write(data.join("team.yaml"), "- name: Ada\n- name: Lin\n").unwrap();
        fs::write(data.join("notes.txt"), "ignored").unwrap();

        let shared = load_shared_data(&config).unwrap();
        assert_eq!(shared["nav"]["links"][0]["href"], "/");
        assert_eq!(shared["team"][1]["name"], "Lin");
        assert!(!shared.contains_key("notes"));
    }

    #[test]
    fn test_reserved_stem_skipped() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        fs::create_dir_all(config.data_dir()).unwrap();
        fs::write(config.data_dir().join("site.json"), r#"{"title": "Other"}"#).unwrap();

        let shared = load_shared_data(&config).unwrap();
        assert_eq!(shared["site"]["title"], "Acme");
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        fs::create_dir_all(config.data_dir()).unwrap();
        fs::write(config.data_dir().join("broken.json"), "{").unwrap();

        let err = load_shared_data(&config).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }
}
