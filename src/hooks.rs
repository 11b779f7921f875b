//! Build lifecycle hooks.
//!
//! | Point               | Runs                                   | Argument          |
//! |---------------------|----------------------------------------|-------------------|
//! | `beforeBuild`       | Before anything else in a pass         | Site config       |
//! | `afterCompilePages` | After every page body is compiled      | Pages             |
//! | `afterBuildPages`   | After every html file is written       | Pages             |
//! | `afterBuild`        | After assets, at the end of a pass     | Build manifest    |
//!
//! A failing hook aborts the pass like any other build error.
//!
//! Hooks come from code ([`Hooks::register`]) or from `[[hooks]]` entries in
//! `kiln.toml`. A configured hook runs its command from the site root with
//! `{"point": ..., "data": ...}` on stdin, where `data` is the argument above
//! as JSON.

use crate::build::BuildManifest;
use crate::config::SiteConfig;
use crate::data::PageData;
use crate::exec;
use crate::page::Page;
use anyhow::{Result, bail};
use rustc_hash::FxHashMap;
use serde_json::json;
use std::{fmt, path::PathBuf, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeBuild,
    AfterCompilePages,
    AfterBuildPages,
    AfterBuild,
}

impl HookPoint {
    pub const ALL: [Self; 4] = [
        Self::BeforeBuild,
        Self::AfterCompilePages,
        Self::AfterBuildPages,
        Self::AfterBuild,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::BeforeBuild => "beforeBuild",
            Self::AfterCompilePages => "afterCompilePages",
            Self::AfterBuildPages => "afterBuildPages",
            Self::AfterBuild => "afterBuild",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HookPoint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.replace(['_', '-'], "").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.name().to_ascii_lowercase() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|p| p.name()).collect();
                anyhow::anyhow!("unknown hook point `{s}`, expected one of {}", known.join(", "))
            })
    }
}

/// What a hook receives, one variant per point.
#[derive(Clone, Copy)]
pub enum HookArgs<'a> {
    BeforeBuild(&'a SiteConfig),
    AfterCompilePages(&'a [Page]),
    AfterBuildPages(&'a [Page]),
    AfterBuild(&'a BuildManifest),
}

impl HookArgs<'_> {
    pub const fn point(&self) -> HookPoint {
        match self {
            Self::BeforeBuild(_) => HookPoint::BeforeBuild,
            Self::AfterCompilePages(_) => HookPoint::AfterCompilePages,
            Self::AfterBuildPages(_) => HookPoint::AfterBuildPages,
            Self::AfterBuild(_) => HookPoint::AfterBuild,
        }
    }

    /// JSON document handed to command hooks.
    pub fn payload(&self) -> Result<String> {
        let data = match self {
            Self::BeforeBuild(config) => serde_json::to_value(config)?,
            Self::AfterCompilePages(pages) | Self::AfterBuildPages(pages) => {
                let listing: Vec<PageData> = pages.iter().map(PageData::from).collect();
                serde_json::to_value(listing)?
            }
            Self::AfterBuild(manifest) => serde_json::to_value(manifest)?,
        };
        let document = json!({ "point": self.point().name(), "data": data });
        Ok(serde_json::to_string(&document)?)
    }
}

/// Hook that runs `command` in `root`, feeding it [`HookArgs::payload`].
pub fn command_hook(
    command: Vec<String>,
    root: PathBuf,
) -> impl Fn(&HookArgs<'_>) -> Result<()> + Send + Sync + 'static {
    move |args| {
        let payload = args.payload()?;
        exec!(stdin=payload.as_str(); root.as_path(); &command;)?;
        Ok(())
    }
}

pub type Hook = Box<dyn Fn(&HookArgs<'_>) -> Result<()> + Send + Sync>;

#[derive(Default)]
pub struct Hooks {
    table: FxHashMap<HookPoint, Vec<Hook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, point: HookPoint, hook: F)
    where
        F: Fn(&HookArgs<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.table.entry(point).or_default().push(Box::new(hook));
    }

    /// Register by point name, failing on names that are not hook points.
    pub fn register_named<F>(&mut self, name: &str, hook: F) -> Result<()>
    where
        F: Fn(&HookArgs<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let point = name.parse()?;
        self.register(point, hook);
        Ok(())
    }

    pub fn count(&self, point: HookPoint) -> usize {
        self.table.get(&point).map_or(0, Vec::len)
    }

    /// Run the hooks for `args.point()` in registration order.
    pub fn run(&self, args: HookArgs<'_>) -> Result<()> {
        let point = args.point();
        for (index, hook) in self.table.get(&point).into_iter().flatten().enumerate() {
            if let Err(e) = hook(&args) {
                bail!("{point} hook #{} failed: {e:#}", index + 1);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<_> = HookPoint::ALL
            .iter()
            .map(|p| (p.name(), self.count(*p)))
            .collect();
        f.debug_struct("Hooks").field("registered", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_point_names() {
        assert_eq!("beforeBuild".parse::<HookPoint>().unwrap(), HookPoint::BeforeBuild);
        assert_eq!("after_build".parse::<HookPoint>().unwrap(), HookPoint::AfterBuild);
        assert_eq!(
            "after-compile-pages".parse::<HookPoint>().unwrap(),
            HookPoint::AfterCompilePages
        );
        let err = "onDeploy".parse::<HookPoint>().unwrap_err().to_string();
        assert!(err.contains("onDeploy"));
        assert!(err.contains("afterBuildPages"));
    }

    #[test]
    fn test_register_named_rejects_unknown() {
        let mut hooks = Hooks::new();
        assert!(hooks.register_named("nope", |_| Ok(())).is_err());
        assert!(hooks.register_named("afterBuildPages", |_| Ok(())).is_ok());
        assert_eq!(hooks.count(HookPoint::AfterBuildPages), 1);
    }

    #[test]
    fn test_run_dispatches_by_point() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut hooks = Hooks::new();
        let counter = Arc::clone(&calls);
        hooks.register(
            HookPoint::AfterCompilePages,
            move |args| {
                if let HookArgs::AfterCompilePages(pages) = args {
                    counter.fetch_add(pages.len() + 1, Ordering::SeqCst);
                }
                Ok(())
            },
        );

        hooks.run(HookArgs::AfterBuildPages(&[])).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        hooks.run(HookArgs::AfterCompilePages(&[])).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_hook_aborts() {
        let mut hooks = Hooks::new();
        hooks.register(HookPoint::BeforeBuild, |_| bail!("no disk space"));
        let config = SiteConfig::default();
        let err = hooks.run(HookArgs::BeforeBuild(&config)).unwrap_err().to_string();
        assert!(err.contains("beforeBuild hook #1 failed"));
        assert!(err.contains("no disk space"));
    }

    #[test]
    fn test_payload_names_point() {
        let payload = HookArgs::AfterBuildPages(&[]).payload().unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["point"], "afterBuildPages");
        assert_eq!(value["data"], json!([]));

        let config = SiteConfig::default();
        let payload = HookArgs::BeforeBuild(&config).payload().unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["data"]["build"]["default_layout"], config.build.default_layout.as_str());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_hook_receives_payload() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut hooks = Hooks::new();
        let command = vec!["sh".to_owned(), "-c".to_owned(), "cat > payload.json".to_owned()];
        hooks
            .register_named("afterCompilePages", command_hook(command, dir.path().to_path_buf()))
            .unwrap();

        hooks.run(HookArgs::AfterCompilePages(&[])).unwrap();
        let written = std::fs::read_to_string(dir.path().join("payload.json")).unwrap();
        assert_eq!(written, r#"{"point":"afterCompilePages","data":[]}"#);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_hook_failure_aborts() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut hooks = Hooks::new();
        let command = vec!["sh".to_owned(), "-c".to_owned(), "exit 4".to_owned()];
        hooks.register(HookPoint::AfterBuildPages, command_hook(command, dir.path().to_path_buf()));

        let err = hooks.run(HookArgs::AfterBuildPages(&[])).unwrap_err().to_string();
        assert!(err.contains("afterBuildPages hook #1 failed"), "{err}");
    }
}
