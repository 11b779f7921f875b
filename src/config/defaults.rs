//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [site] Section Defaults
// ============================================================================

pub mod site {
    pub fn title() -> String {
        "Untitled".into()
    }

    pub fn title_suffix() -> String {
        String::new()
    }

    pub fn language() -> String {
        "en".into()
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn content() -> PathBuf {
        "content".into()
    }

    pub fn output() -> PathBuf {
        "public".into()
    }

    pub fn templates() -> PathBuf {
        "templates".into()
    }

    pub fn assets() -> PathBuf {
        "assets".into()
    }

    pub fn snippets() -> PathBuf {
        "snippets".into()
    }

    /// Directory name inside the content root holding global data files.
    pub fn data() -> PathBuf {
        "_data".into()
    }

    pub fn cache() -> PathBuf {
        ".kiln-cache".into()
    }

    pub fn favicon() -> PathBuf {
        "favicon.ico".into()
    }

    pub fn default_layout() -> String {
        "default".into()
    }

    pub mod bundle {
        use std::path::PathBuf;

        pub fn command() -> Vec<String> {
            vec!["esbuild".into()]
        }

        pub fn entry() -> PathBuf {
            "app/main.js".into()
        }
    }
}

// ============================================================================
// [watch] Section Defaults
// ============================================================================

pub mod watch {
    /// Quiescence window before a batch of file events triggers a rebuild.
    pub fn debounce_ms() -> u64 {
        100
    }
}
