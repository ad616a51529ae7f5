use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::process::Command;
use std::time::Duration;

/// Control surface of the external paint program. Both operations are
/// best-effort; an error means the run must not start drawing.
pub trait HostApp {
    fn launch(&mut self) -> anyhow::Result<()>;
    fn focus(&mut self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSettings {
    #[serde(default = "default_command")]
    pub command: String,
    /// Application name as shown in the window title, e.g. "Untitled - Paint".
    /// A title matches when it equals this name or ends with " - <name>",
    /// ignoring case.
    #[serde(default = "default_window_title")]
    pub window_title: String,
    #[serde(default = "default_launch_settle_ms")]
    pub launch_settle_ms: u64,
    #[serde(default = "default_focus_settle_ms")]
    pub focus_settle_ms: u64,
}

fn default_command() -> String {
    "mspaint.exe".into()
}

fn default_window_title() -> String {
    "Paint".into()
}

fn default_launch_settle_ms() -> u64 {
    2000
}

fn default_focus_settle_ms() -> u64 {
    500
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            command: default_command(),
            window_title: default_window_title(),
            launch_settle_ms: default_launch_settle_ms(),
            focus_settle_ms: default_focus_settle_ms(),
        }
    }
}

/// Microsoft Paint (or any program configured in [`HostSettings`]).
#[derive(Debug, Clone)]
pub struct PaintHost {
    settings: HostSettings,
    /// Process started by the last `launch`, preferred when focusing.
    child_pid: Option<u32>,
}

impl PaintHost {
    pub fn new(settings: HostSettings) -> Self {
        Self {
            settings,
            child_pid: None,
        }
    }
}

impl HostApp for PaintHost {
    fn launch(&mut self) -> anyhow::Result<()> {
        let parts = shlex::split(&self.settings.command)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow::anyhow!("invalid host command '{}'", self.settings.command))?;
        let (program, args) = parts
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("empty host command"))?;
        let child = Command::new(program)
            .args(args)
            .spawn()
            .with_context(|| format!("spawn {program}"))?;
        self.child_pid = Some(child.id());
        tracing::info!("launched {program} (pid {})", child.id());
        std::thread::sleep(Duration::from_millis(self.settings.launch_settle_ms));
        Ok(())
    }

    fn focus(&mut self) -> anyhow::Result<()> {
        focus_window(&self.settings.window_title, self.child_pid)?;
        std::thread::sleep(Duration::from_millis(self.settings.focus_settle_ms));
        Ok(())
    }
}

/// Whether a window title belongs to the application named `app`: either the
/// bare name or a document title followed by " - <app>".
pub fn title_matches(title: &str, app: &str) -> bool {
    let app = app.trim().to_lowercase();
    if app.is_empty() {
        return false;
    }
    let title = title.trim().to_lowercase();
    title == app || title.ends_with(&format!(" - {app}"))
}

#[cfg(not(target_os = "windows"))]
fn focus_window(title: &str, pid: Option<u32>) -> anyhow::Result<()> {
    let _ = (title, pid);
    anyhow::bail!("window activation is only supported on Windows");
}

#[cfg(target_os = "windows")]
fn focus_window(title: &str, pid: Option<u32>) -> anyhow::Result<()> {
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
    use windows::Win32::System::Console::GetConsoleWindow;
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
        IsWindowVisible, SetForegroundWindow, ShowWindow, SW_RESTORE,
    };

    struct Ctx<'a> {
        needle: &'a str,
        pid: Option<u32>,
        console: HWND,
        by_pid: Option<HWND>,
        by_title: Option<HWND>,
    }

    unsafe extern "system" fn enum_cb(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let ctx = &mut *(lparam.0 as *mut Ctx);
        if hwnd == ctx.console || !IsWindowVisible(hwnd).as_bool() {
            return BOOL(1);
        }
        let len = GetWindowTextLengthW(hwnd);
        if len <= 0 {
            return BOOL(1);
        }
        let mut buf = vec![0u16; len as usize + 1];
        let read = GetWindowTextW(hwnd, &mut buf);
        let window_title = String::from_utf16_lossy(&buf[..read.max(0) as usize]);
        if !title_matches(&window_title, ctx.needle) {
            return BOOL(1);
        }
        let mut owner = 0u32;
        GetWindowThreadProcessId(hwnd, Some(&mut owner as *mut u32));
        if ctx.pid == Some(owner) {
            ctx.by_pid = Some(hwnd);
            return BOOL(0);
        }
        if ctx.by_title.is_none() {
            ctx.by_title = Some(hwnd);
        }
        BOOL(1)
    }

    let mut ctx = Ctx {
        needle: title,
        pid,
        console: unsafe { GetConsoleWindow() },
        by_pid: None,
        by_title: None,
    };
    unsafe {
        // EnumWindows reports an error when the callback stops early.
        let _ = EnumWindows(Some(enum_cb), LPARAM(&mut ctx as *mut Ctx as isize));
    }
    // Packaged Paint may hand off to another process, so fall back to the title.
    let Some(hwnd) = ctx.by_pid.or(ctx.by_title) else {
        anyhow::bail!("no window titled '{title}' found");
    };
    unsafe {
        let _ = ShowWindow(hwnd, SW_RESTORE);
        if !SetForegroundWindow(hwnd).as_bool() {
            anyhow::bail!("could not bring '{title}' to the foreground");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_match_is_case_insensitive_app_suffix() {
        assert!(title_matches("Untitled - Paint", "paint"));
        assert!(title_matches("house.png - Paint ", "Paint"));
        assert!(title_matches("Paint", "paint"));
        assert!(!title_matches("Notepad", "paint"));
        assert!(!title_matches("Untitled - Paint", "  "));
    }

    #[test]
    fn own_console_title_is_not_paint() {
        assert!(!title_matches("C:\\bin\\paint_prompter.exe", "Paint"));
        assert!(!title_matches("Administrator: paint_prompter", "Paint"));
        assert!(!title_matches("Paint tips - Notepad", "Paint"));
    }

    #[test]
    fn empty_command_fails_to_launch() {
        let mut host = PaintHost::new(HostSettings {
            command: "   ".into(),
            ..HostSettings::default()
        });
        assert!(host.launch().is_err());
    }
}
