//! `[[hooks]]` entries: external commands run at build lifecycle points.

use serde::{Deserialize, Serialize};

/// One command hook.
///
/// The command receives a JSON description of the hook argument on stdin and
/// runs from the site root.
///
/// # Example
/// ```toml
/// [[hooks]]
/// point = "afterBuild"
/// command = ["node", "scripts/sitemap.js"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookConfig {
    /// Lifecycle point name, e.g. `afterBuildPages`
    pub point: String,

    /// Program followed by its arguments
    pub command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_hooks_table_array() {
        let config = SiteConfig::from_str(
            r#"
            [[hooks]]
            point = "beforeBuild"
            command = ["sh", "-c", "date"]

            [[hooks]]
            point = "afterBuild"
            command = ["node", "sitemap.js"]
        "#,
        )
        .unwrap();
        assert_eq!(config.hooks.len(), 2);
        assert_eq!(config.hooks[1].point, "afterBuild");
        assert_eq!(config.hooks[1].command, vec!["node", "sitemap.js"]);
    }

    #[test]
    fn test_hooks_default_empty() {
        assert!(SiteConfig::from_str("").unwrap().hooks.is_empty());
        assert!(SiteConfig::from_str("[[hooks]]\npoint = \"afterBuild\"\ncommand = []\nshell = true").is_err());
    }
}
