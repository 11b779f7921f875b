//! Front matter extraction.
//!
//! A page may open with a YAML block fenced by `---` lines. The block becomes
//! the page's data map and the remainder its body. Sources without a fence
//! have empty data and keep their full text as body.

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Front matter data, JSON-shaped so templates and codegen share one model.
pub type FrontMatter = Map<String, Value>;

/// Result of splitting a page source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSource {
    pub data: FrontMatter,
    pub body: String,
}

pub trait FrontMatterParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<ParsedSource>;
}

/// `---` fenced YAML front matter.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlFrontMatter;

static RE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\x{feff}?---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)").unwrap()
});

impl FrontMatterParser for YamlFrontMatter {
    fn parse(&self, source: &str) -> Result<ParsedSource> {
        let Some(caps) = RE_FENCE.captures(source) else {
            return Ok(ParsedSource {
                data: Map::new(),
                body: source.to_owned(),
            });
        };

        let whole = caps.get(0).map_or(0, |m| m.end());
        let yaml = caps.get(1).map_or("", |m| m.as_str());
        let body = source[whole..].to_owned();

        let data = if yaml.trim().is_empty() {
            Map::new()
        } else {
            let value: serde_yaml::Value =
                serde_yaml::from_str(yaml).context("Failed to parse YAML front matter")?;
            match serde_json::to_value(value).context("Unsupported front matter value")? {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                other => bail!("Front matter must be a mapping, found `{other}`"),
            }
        };

        Ok(ParsedSource { data, body })
    }
}
