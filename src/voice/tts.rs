//! Text-to-speech (TTS) through the platform speech command

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::Speaker;

/// Speech programs in order of preference
const SPEECH_PROGRAMS: &[&str] = &["say", "espeak-ng", "espeak", "spd-say"];

/// Arguments for `program`, and whether `text` goes on stdin instead
///
/// Text never lands where it could be parsed as an option.
fn speech_args<'a>(program: &str, text: &'a str) -> (Vec<&'a str>, bool) {
    match program {
        // `say` reads stdin when given no message and has no `--`
        "say" => (Vec::new(), true),
        _ => (vec!["--", text], false),
    }
}

/// [`Speaker`] that shells out to `say`, `espeak` or `spd-say`
#[derive(Debug, Clone)]
pub struct SystemSpeaker {
    program: Option<String>,
}

impl Default for SystemSpeaker {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSpeaker {
    /// Pick the first speech program found on `PATH`
    #[must_use]
    pub fn new() -> Self {
        let program = SPEECH_PROGRAMS
            .iter()
            .find(|p| which::which(p).is_ok())
            .map(ToString::to_string);

        match &program {
            Some(p) => tracing::debug!(program = %p, "speech output initialized"),
            None => tracing::warn!("no speech program found, speech output disabled"),
        }

        Self { program }
    }

    /// Whether a speech program is available
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.program.is_some()
    }
}

#[async_trait]
impl Speaker for SystemSpeaker {
    async fn speak(&self, text: &str) -> bool {
        let Some(program) = &self.program else {
            return false;
        };

        let text = text.trim();
        if text.is_empty() {
            return true;
        }

        tracing::debug!(program = %program, chars = text.len(), "speaking");

        let (args, via_stdin) = speech_args(program, text);
        let status = run_speech(program, &args, via_stdin.then_some(text)).await;

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                tracing::warn!(program = %program, code = status.code().unwrap_or(-1), "speech command failed");
                false
            }
            Err(e) => {
                tracing::warn!(program = %program, error = %e, "failed to run speech command");
                false
            }
        }
    }
}

async fn run_speech(
    program: &str,
    args: &[&str],
    input: Option<&str>,
) -> std::io::Result<std::process::ExitStatus> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
        stdin.write_all(text.as_bytes()).await?;
        // Closing stdin ends the message
        drop(stdin);
    }

    child.wait().await
}
