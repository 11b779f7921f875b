//! Terminal logging with colored module prefixes.
//!
//! - `log!` prints `[module] message`, truncated to the terminal width
//! - `ProgressBars` shows one in-place bar per build phase
//! - `WatchStatus` keeps watch-mode outcomes on a single overwritten block
//!
//! ```ignore
//! log!("render"; "{} pages", count);
//!
//! let progress = ProgressBars::new(&[("compile", pages.len())]);
//! progress.inc_by_name("compile");
//! progress.finish();
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{IsTerminal, Write, stdout},
    sync::{
        Mutex, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

/// Cached terminal width (fetched once on first use)
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Number of progress bars currently reserved below the log area
static BAR_COUNT: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// Layout Constants
// ============================================================================
//
// Progress bar format: "[compile] [████░░░░] 42/100"

/// `[`, `]` and the trailing space after a module prefix
const PREFIX_OVERHEAD: usize = 3;
/// " []" around the bar plus the space before the count
const BAR_OVERHEAD: usize = 4;
const MIN_BAR_WIDTH: usize = 10;
const MAX_BAR_WIDTH: usize = 40;

#[inline]
const fn prefix_len(module_len: usize) -> usize {
    module_len + PREFIX_OVERHEAD
}

/// Terminal width, falling back to 120 columns when detection fails.
fn terminal_width() -> usize {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120)) as usize
}

/// Cursor control only makes sense on a real terminal.
fn is_tty() -> bool {
    static TTY: OnceLock<bool> = OnceLock::new();
    *TTY.get_or_init(|| stdout().is_terminal())
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix.
///
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Print one log line, keeping any active progress bars below it.
#[allow(clippy::cast_possible_truncation)]
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);
    let mut out = stdout().lock();

    let bars = if is_tty() { BAR_COUNT.load(Ordering::SeqCst) } else { 0 };
    if bars > 0 {
        execute!(out, cursor::MoveUp(bars as u16)).ok();
        execute!(out, Clear(ClearType::FromCursorDown)).ok();
    }

    // Multiline messages (error chains, template traces) are never truncated
    let message = if message.contains('\n') || !is_tty() {
        message
    } else {
        truncate_str(message, terminal_width().saturating_sub(prefix_len(module.len())))
    };
    writeln!(out, "{prefix} {message}").ok();

    for _ in 0..bars {
        writeln!(out).ok();
    }
    out.flush().ok();
}

fn colorize_prefix(module: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "watch" => prefix.bright_green().bold(),
        "reload" => prefix.bright_blue().bold(),
        "error" => prefix.bright_red().bold(),
        "snippet" | "warn" => prefix.bright_magenta().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Truncate to at most `max_len` bytes on a char boundary.
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Progress Bars
// ============================================================================

/// Several progress bars, one terminal line each, updated in place.
///
/// Bars are only drawn on a terminal; elsewhere the type is inert so build
/// output stays clean in CI logs and tests.
pub struct ProgressBars {
    bars: Vec<ProgressBar>,
    lock: Mutex<()>,
}

struct ProgressBar {
    name: &'static str,
    prefix: ColoredString,
    total: usize,
    current: AtomicUsize,
    row: usize,
}

impl ProgressBars {
    /// Reserve one line per `(name, total)` pair.
    pub fn new(phases: &[(&'static str, usize)]) -> Self {
        let phases: Vec<_> = phases.iter().filter(|(_, n)| *n > 0).copied().collect();

        if is_tty() {
            let mut out = stdout().lock();
            for _ in &phases {
                writeln!(out).ok();
            }
            out.flush().ok();
            BAR_COUNT.store(phases.len(), Ordering::SeqCst);
        }

        let bars = phases
            .into_iter()
            .enumerate()
            .map(|(row, (name, total))| ProgressBar {
                name,
                prefix: colorize_prefix(name),
                total,
                current: AtomicUsize::new(0),
                row,
            })
            .collect();

        Self {
            bars,
            lock: Mutex::new(()),
        }
    }

    pub fn inc_by_name(&self, name: &str) {
        if let Some(bar) = self.bars.iter().find(|b| b.name == name) {
            let current = bar.current.fetch_add(1, Ordering::Relaxed) + 1;
            self.display(bar, current);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn display(&self, bar: &ProgressBar, current: usize) {
        if !is_tty() {
            return;
        }
        let _guard = self.lock.lock().ok();

        let count = format!("{current}/{}", bar.total);
        let overhead = prefix_len(bar.name.len()) + BAR_OVERHEAD + count.len();
        let width = terminal_width()
            .saturating_sub(overhead)
            .clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH);
        let filled = if bar.total > 0 { current * width / bar.total } else { 0 };
        let drawn = "█".repeat(filled) + &"░".repeat(width.saturating_sub(filled));

        let mut out = stdout().lock();
        let up = (self.bars.len() - bar.row) as u16;
        execute!(out, cursor::MoveUp(up), Clear(ClearType::CurrentLine)).ok();
        write!(out, "{} [{drawn}] {count}", bar.prefix).ok();
        execute!(out, cursor::MoveDown(up)).ok();
        write!(out, "\r").ok();
        out.flush().ok();
    }

    /// Clear the bars from the terminal.
    #[allow(clippy::cast_possible_truncation)]
    pub fn finish(&self) {
        if !is_tty() || self.bars.is_empty() || BAR_COUNT.swap(0, Ordering::SeqCst) == 0 {
            return;
        }
        let _guard = self.lock.lock().ok();
        let mut out = stdout().lock();
        execute!(
            out,
            cursor::MoveUp(self.bars.len() as u16),
            Clear(ClearType::FromCursorDown)
        )
        .ok();
        out.flush().ok();
    }
}

impl Drop for ProgressBars {
    fn drop(&mut self) {
        self.finish();
    }
}

// ============================================================================
// Watch Status
// ============================================================================

/// `HH:MM:SS` (UTC) for watch-mode timestamps.
fn timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!(
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}

/// Single-block status display for watch mode; each message replaces the last.
pub struct WatchStatus {
    last_lines: usize,
}

impl WatchStatus {
    pub const fn new() -> Self {
        Self { last_lines: 0 }
    }

    pub fn success(&mut self, message: &str) {
        self.display("✓".green().to_string(), message);
    }

    pub fn error(&mut self, summary: &str, detail: &str) {
        let message = if detail.is_empty() {
            summary.to_owned()
        } else {
            format!("{summary}\n{detail}")
        };
        self.display("✗".red().to_string(), &message);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn display(&mut self, symbol: String, message: &str) {
        let mut out = stdout().lock();
        if self.last_lines > 0 && is_tty() {
            execute!(
                out,
                cursor::MoveUp(self.last_lines as u16),
                Clear(ClearType::FromCursorDown)
            )
            .ok();
        }
        let stamp = format!("[{}]", timestamp()).dimmed();
        writeln!(out, "{stamp} {symbol} {message}").ok();
        out.flush().ok();
        self.last_lines = message.matches('\n').count() + 1;
    }
}
