//! External command execution utilities.
//!
//! Runs bundler processes with captured output, optionally feeding a source
//! text through stdin.

use anyhow::{Context, Result, bail};
use std::{
    ffi::OsString,
    io::Write,
    path::Path,
    process::{Command, Output, Stdio},
};

// ============================================================================
// Macros
// ============================================================================

/// Run an external command with arguments and capture its output.
///
/// Empty arguments are dropped, so conditional flags can be written inline.
///
/// # Examples
/// ```ignore
/// // With working directory
/// exec!(root; &config.build.bundle.command; "--bundle", entry)?;
///
/// // Feeding stdin
/// exec!(stdin=source; root; &cmd; "--bundle", if minify { "--minify" } else { "" })?;
/// ```
#[macro_export]
macro_rules! exec {
    (stdin=$input:expr; $root:expr; $cmd:expr; $($arg:expr),* $(,)?) => {
        $crate::utils::exec::exec(
            Some($root),
            &$crate::utils::exec::internal::to_cmd_vec($cmd),
            &$crate::utils::exec::internal::filter_args(&[$($crate::utils::exec::internal::to_os($arg)),*]),
            Some($input),
        )
    };
    ($root:expr; $cmd:expr; $($arg:expr),* $(,)?) => {
        $crate::utils::exec::exec(
            Some($root),
            &$crate::utils::exec::internal::to_cmd_vec($cmd),
            &$crate::utils::exec::internal::filter_args(&[$($crate::utils::exec::internal::to_os($arg)),*]),
            None,
        )
    };
}

// ============================================================================
// Argument Conversion
// ============================================================================

#[doc(hidden)]
pub mod internal {
    use std::ffi::OsString;

    #[inline]
    pub fn to_os<S: Into<OsString>>(s: S) -> OsString {
        s.into()
    }

    /// Trait for converting to command vector.
    pub trait ToCmd {
        fn to_cmd(self) -> Vec<OsString>;
    }

    impl<const N: usize> ToCmd for [&str; N] {
        fn to_cmd(self) -> Vec<OsString> {
            self.into_iter().map(OsString::from).collect()
        }
    }

    impl ToCmd for &[String] {
        fn to_cmd(self) -> Vec<OsString> {
            self.iter().map(OsString::from).collect()
        }
    }

    impl ToCmd for &Vec<String> {
        fn to_cmd(self) -> Vec<OsString> {
            self.iter().map(OsString::from).collect()
        }
    }

    #[inline]
    pub fn to_cmd_vec<C: ToCmd>(cmd: C) -> Vec<OsString> {
        cmd.to_cmd()
    }

    /// Filter out empty args.
    #[inline]
    pub fn filter_args(args: &[OsString]) -> Vec<OsString> {
        args.iter().filter(|a| !a.is_empty()).cloned().collect()
    }
}

// ============================================================================
// Command Execution
// ============================================================================

/// Execute a command and capture its output.
///
/// # Errors
/// Returns error if the command cannot be spawned or exits non-zero. The
/// error carries the command's stderr.
pub fn exec(
    root: Option<&Path>,
    cmd: &[OsString],
    args: &[OsString],
    stdin: Option<&str>,
) -> Result<Output> {
    let Some((program, leading)) = cmd.split_first() else {
        bail!("Empty command");
    };
    let name = program.to_string_lossy().into_owned();

    let mut command = Command::new(program);
    command.args(leading).args(args);
    if let Some(root) = root {
        command.current_dir(root);
    }
    command
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to execute `{name}`"))?;

    if let Some(input) = stdin {
        // The pipe is dropped, and so closed, when the closure returns
        let written = child
            .stdin
            .take()
            .context("Failed to acquire stdin")
            .and_then(|mut pipe| {
                pipe.write_all(input.as_bytes())
                    .with_context(|| format!("Failed to write stdin of `{name}`"))
            });
        if let Err(e) = written {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
    }

    let output = child
        .wait_with_output()
        .with_context(|| format!("`{name}` process failed"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("`{name}` exited with {}\n{}", output.status, stderr.trim_end());
    }

    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filter_args_drops_empty() {
        let args = internal::filter_args(&[
            internal::to_os("--bundle"),
            internal::to_os(""),
            internal::to_os("--minify"),
        ]);
        assert_eq!(args, vec![OsString::from("--bundle"), OsString::from("--minify")]);
    }

    #[test]
    fn test_exec_captures_stdout() {
        let dir = TempDir::new().unwrap();
        let output = crate::exec!(dir.path(); ["echo"]; "hello").unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[test]
    fn test_exec_feeds_stdin() {
        let dir = TempDir::new().unwrap();
        let output = crate::exec!(stdin="piped text"; dir.path(); ["cat"];).unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "piped text");
    }

    #[test]
    fn test_exec_nonzero_exit_is_error() {
        let dir = TempDir::new().unwrap();
        let err = crate::exec!(dir.path(); ["sh"]; "-c", "echo broken >&2; exit 3").unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("broken"), "{message}");
    }

    #[test]
    fn test_exec_reports_closed_stdin() {
        let dir = TempDir::new().unwrap();
        // Far larger than a pipe buffer, so the write outlives `true`
        let input = "x".repeat(8 << 20);
        let err = crate::exec!(stdin=input.as_str(); dir.path(); ["true"];).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to write stdin of `true`"));
    }

    #[test]
    fn test_exec_missing_program() {
        let result = exec(None, &[OsString::from("kiln-no-such-binary")], &[], None);
        assert!(result.is_err());
    }
}
