//! `[site]` section configuration.
//!
//! Site-wide metadata shared by every page: default title and description for
//! route meta, and the suffix appended to every route title.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[site]` section in kiln.toml.
///
/// # Example
/// ```toml
/// [site]
/// title = "Acme"
/// title_suffix = " | Acme Corp"
/// description = "Tools for road runners"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
    /// Default route title when a page declares none.
    #[serde(default = "defaults::site::title")]
    #[educe(Default = defaults::site::title())]
    pub title: String,

    /// Appended to every route title in the router manifest.
    #[serde(default = "defaults::site::title_suffix")]
    #[educe(Default = defaults::site::title_suffix())]
    pub title_suffix: String,

    /// Default route description.
    #[serde(default)]
    pub description: String,

    /// BCP 47 language code, exposed to layouts.
    #[serde(default = "defaults::site::language")]
    #[educe(Default = defaults::site::language())]
    pub language: String,

    /// Public base URL, exposed to layouts.
    #[serde(default)]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_site_section_full() {
        let config: SiteConfig = toml::from_str(
            r#"
            [site]
            title = "Acme"
            title_suffix = " | Acme Corp"
            description = "Tools"
            language = "de"
            url = "https://acme.test"
        "#,
        )
        .unwrap();

        assert_eq!(config.site.title, "Acme");
        assert_eq!(config.site.title_suffix, " | Acme Corp");
        assert_eq!(config.site.description, "Tools");
        assert_eq!(config.site.language, "de");
        assert_eq!(config.site.url.as_deref(), Some("https://acme.test"));
    }

    #[test]
    fn test_site_section_defaults() {
        let config: SiteConfig = toml::from_str("[site]\n").unwrap();

        assert_eq!(config.site.title, "Untitled");
        assert_eq!(config.site.title_suffix, "");
        assert_eq!(config.site.language, "en");
        assert!(config.site.url.is_none());
    }

    #[test]
    fn test_unknown_field_rejection() {
        let result: Result<SiteConfig, _> = toml::from_str(
            r#"
            [site]
            title = "Acme"
            author = "nobody"
        "#,
        );
        assert!(result.unwrap_err().to_string().contains("unknown field"));
    }
}
