//! Platform-command action provider

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use super::{Action, ActionError, ActionOutcome, ActionProvider};

/// Upper bound on any helper command
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Spoken name → (Linux binary, macOS application, Windows executable)
const APP_MAPPINGS: &[(&str, &str, &str, &str)] = &[
    ("chrome", "google-chrome", "Google Chrome", "chrome"),
    ("google chrome", "google-chrome", "Google Chrome", "chrome"),
    ("firefox", "firefox", "Firefox", "firefox"),
    ("edge", "microsoft-edge", "Microsoft Edge", "msedge"),
    ("notepad", "gedit", "TextEdit", "notepad"),
    ("calculator", "gnome-calculator", "Calculator", "calc"),
    ("terminal", "gnome-terminal", "Terminal", "cmd"),
    ("vscode", "code", "Visual Studio Code", "code"),
    ("vs code", "code", "Visual Studio Code", "code"),
    ("spotify", "spotify", "Spotify", "spotify"),
    ("vlc", "vlc", "VLC", "vlc"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Self::MacOs,
            "windows" => Self::Windows,
            _ => Self::Linux,
        }
    }
}

/// One candidate command line
type Invocation = (String, Vec<String>);

/// [`ActionProvider`] that shells out to the host's own tools
///
/// Every capability is a short-lived helper process. Missing helpers surface
/// as [`ActionError::Unavailable`] rather than a failed outcome.
#[derive(Debug, Clone)]
pub struct SystemActionProvider {
    platform: Platform,
    screenshot_dir: PathBuf,
}

impl Default for SystemActionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemActionProvider {
    /// Create a provider for the current platform
    #[must_use]
    pub fn new() -> Self {
        let screenshot_dir = directories::UserDirs::new()
            .and_then(|dirs| dirs.picture_dir().map(Path::to_path_buf))
            .unwrap_or_else(std::env::temp_dir)
            .join("Screenshots");

        Self {
            platform: Platform::current(),
            screenshot_dir,
        }
    }

    /// Override where screenshots are written
    #[must_use]
    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    fn open_app(&self, app_name: &str) -> Vec<Invocation> {
        let (linux, macos, windows) = resolve_app(app_name);
        match self.platform {
            Platform::Linux => vec![cmd(&linux, &[])],
            Platform::MacOs => vec![cmd("open", &["-a", &macos])],
            Platform::Windows => vec![cmd("cmd", &["/C", "start", "", &windows])],
        }
    }

    fn close_app(&self, app_name: &str) -> Vec<Invocation> {
        let (linux, macos, windows) = resolve_app(app_name);
        match self.platform {
            Platform::Linux => vec![cmd("pkill", &["-f", &linux])],
            Platform::MacOs => vec![cmd("osascript", &["-e", &format!("quit app \"{macos}\"")])],
            Platform::Windows => vec![cmd("taskkill", &["/IM", &format!("{windows}.exe"), "/F"])],
        }
    }

    fn open_url(&self, url: &str) -> Vec<Invocation> {
        match self.platform {
            Platform::Linux => vec![cmd("xdg-open", &[url])],
            Platform::MacOs => vec![cmd("open", &[url])],
            Platform::Windows => vec![cmd("cmd", &["/C", "start", "", url])],
        }
    }

    fn volume(&self, step: u8, up: bool) -> Vec<Invocation> {
        let sign = if up { '+' } else { '-' };
        match self.platform {
            Platform::Linux => vec![
                cmd("amixer", &["-D", "pulse", "sset", "Master", &format!("{step}%{sign}")]),
                cmd("pactl", &["set-sink-volume", "@DEFAULT_SINK@", &format!("{sign}{step}%")]),
            ],
            Platform::MacOs => {
                let script = format!(
                    "set volume output volume ((output volume of (get volume settings)) {sign} {step})"
                );
                vec![cmd("osascript", &["-e", &script])]
            }
            Platform::Windows => Vec::new(),
        }
    }

    fn mute(&self, muted: bool) -> Vec<Invocation> {
        match self.platform {
            Platform::Linux => vec![
                cmd("amixer", &["-D", "pulse", "sset", "Master", if muted { "mute" } else { "unmute" }]),
                cmd("pactl", &["set-sink-mute", "@DEFAULT_SINK@", if muted { "1" } else { "0" }]),
            ],
            Platform::MacOs => {
                let script = if muted {
                    "set volume with output muted"
                } else {
                    "set volume without output muted"
                };
                vec![cmd("osascript", &["-e", script])]
            }
            Platform::Windows => Vec::new(),
        }
    }

    fn screenshot(&self, path: &Path) -> Vec<Invocation> {
        let path = path.to_string_lossy();
        match self.platform {
            Platform::Linux => vec![
                cmd("gnome-screenshot", &["-f", &path]),
                cmd("grim", &[&path]),
                cmd("scrot", &[&path]),
            ],
            Platform::MacOs => vec![cmd("screencapture", &["-x", &path])],
            Platform::Windows => Vec::new(),
        }
    }

    fn lock_screen(&self) -> Vec<Invocation> {
        match self.platform {
            Platform::Linux => vec![
                cmd("loginctl", &["lock-session"]),
                cmd("gnome-screensaver-command", &["-l"]),
                cmd("xdg-screensaver", &["lock"]),
            ],
            Platform::MacOs => vec![cmd(
                "/System/Library/CoreServices/Menu Extras/User.menu/Contents/Resources/CGSession",
                &["-suspend"],
            )],
            Platform::Windows => vec![cmd("rundll32.exe", &["user32.dll,LockWorkStation"])],
        }
    }

    fn media(&self, next: bool) -> Vec<Invocation> {
        match self.platform {
            Platform::Linux => vec![cmd("playerctl", &[if next { "next" } else { "previous" }])],
            Platform::MacOs => {
                let verb = if next { "next track" } else { "previous track" };
                vec![cmd("osascript", &["-e", &format!("tell application \"Spotify\" to {verb}")])]
            }
            Platform::Windows => Vec::new(),
        }
    }

    fn shutdown(&self) -> Vec<Invocation> {
        match self.platform {
            Platform::Linux => vec![cmd("systemctl", &["poweroff"])],
            Platform::MacOs => vec![cmd("osascript", &["-e", "tell app \"System Events\" to shut down"])],
            Platform::Windows => vec![cmd("shutdown", &["/s", "/t", "0"])],
        }
    }

    fn screenshot_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.screenshot_dir.join(format!("screenshot_{stamp}.png"))
    }
}

#[async_trait]
impl ActionProvider for SystemActionProvider {
    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ActionError> {
        tracing::debug!(capability = action.name(), "executing action");

        match action {
            Action::OpenApp { app_name } => {
                let outcome = spawn_detached(&self.open_app(app_name))?;
                Ok(outcome.with("app_name", app_name.as_str()))
            }
            Action::CloseApp { app_name } => run_first(action.name(), &self.close_app(app_name)).await,
            Action::SearchWeb { query } => {
                let url = search_url(query);
                let outcome = spawn_detached(&self.open_url(&url))?;
                Ok(outcome.with("url", url))
            }
            Action::PlayMusic { song } => match song {
                Some(song) => {
                    let url = format!("https://open.spotify.com/search/{}", urlencoding::encode(song));
                    spawn_detached(&self.open_url(&url))
                }
                None => spawn_detached(&self.open_app("spotify")),
            },
            Action::SetTimer { seconds, label } => {
                let seconds = *seconds;
                let label = label.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(seconds)).await;
                    tracing::info!(%label, "timer finished");
                });
                Ok(ActionOutcome::ok().with("seconds", seconds))
            }
            Action::ReportTime => {
                let time = chrono::Local::now().format("%I:%M %p").to_string();
                Ok(ActionOutcome::ok().with("time", time))
            }
            Action::VolumeUp { step } => run_first(action.name(), &self.volume(*step, true)).await,
            Action::VolumeDown { step } => run_first(action.name(), &self.volume(*step, false)).await,
            Action::Mute => run_first(action.name(), &self.mute(true)).await,
            Action::Unmute => run_first(action.name(), &self.mute(false)).await,
            Action::Screenshot => {
                let path = self.screenshot_path();
                tokio::fs::create_dir_all(&self.screenshot_dir).await?;
                let outcome = run_first(action.name(), &self.screenshot(&path)).await?;
                Ok(outcome.with("path", path.to_string_lossy().into_owned()))
            }
            Action::LockScreen => run_first(action.name(), &self.lock_screen()).await,
            Action::MediaNext => run_first(action.name(), &self.media(true)).await,
            Action::MediaPrevious => run_first(action.name(), &self.media(false)).await,
            Action::Shutdown => run_first(action.name(), &self.shutdown()).await,
        }
    }
}

/// Google search URL for `query`
fn search_url(query: &str) -> String {
    format!("https://www.google.com/search?q={}", urlencoding::encode(query))
}

/// Map a spoken app name to per-platform program names
fn resolve_app(app_name: &str) -> (String, String, String) {
    let key = app_name.trim().to_lowercase();
    APP_MAPPINGS
        .iter()
        .find(|(spoken, ..)| *spoken == key)
        .map_or_else(
            || (key.clone(), app_name.trim().to_string(), key.clone()),
            |(_, linux, macos, windows)| {
                ((*linux).to_string(), (*macos).to_string(), (*windows).to_string())
            },
        )
}

fn cmd(program: &str, argv: &[&str]) -> Invocation {
    (program.to_string(), argv.iter().map(ToString::to_string).collect())
}

fn available(candidates: &[Invocation]) -> impl Iterator<Item = &Invocation> {
    candidates.iter().filter(|(program, _)| which::which(program).is_ok())
}

/// Spawn the first available candidate without waiting for it to exit
fn spawn_detached(candidates: &[Invocation]) -> Result<ActionOutcome, ActionError> {
    let Some((program, argv)) = available(candidates).next() else {
        return Err(unavailable(candidates));
    };

    Command::new(program)
        .args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    Ok(ActionOutcome::ok())
}

/// Run available candidates in order until one exits successfully
async fn run_first(
    capability: &str,
    candidates: &[Invocation],
) -> Result<ActionOutcome, ActionError> {
    run_first_within(capability, candidates, COMMAND_TIMEOUT).await
}

async fn run_first_within(
    capability: &str,
    candidates: &[Invocation],
    limit: Duration,
) -> Result<ActionOutcome, ActionError> {
    let mut tried = false;

    for (program, argv) in available(candidates) {
        tried = true;
        // A helper that outlives its timeout is killed with the dropped future
        let output = timeout(
            limit,
            Command::new(program)
                .args(argv)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ActionError::Failed(format!("{program} timed out")))??;

        if output.status.success() {
            return Ok(ActionOutcome::ok());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(capability, %program, stderr = %stderr.trim(), "helper failed");
    }

    if tried {
        Ok(ActionOutcome::failed())
    } else {
        Err(unavailable(candidates))
    }
}

fn unavailable(candidates: &[Invocation]) -> ActionError {
    let names: Vec<_> = candidates.iter().map(|(program, _)| program.as_str()).collect();
    if names.is_empty() {
        ActionError::Unavailable("this action".to_string())
    } else {
        ActionError::Unavailable(names.join(" / "))
    }
}
