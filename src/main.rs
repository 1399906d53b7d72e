use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

use spark_assistant::actions::{ActionDispatcher, SystemActionProvider};
use spark_assistant::chat::{Chat, OllamaChat};
use spark_assistant::intent::IntentParser;
use spark_assistant::pipeline::{Collaborators, Notification, PipelineController, TimedDispatch};
use spark_assistant::voice::{
    AudioCapture, DisabledTranscriber, Speaker, SystemSpeaker, Transcriber, WhisperTranscriber,
    calculate_energy,
};
use spark_assistant::Config;

/// Spark - Local voice and text assistant
#[derive(Parser)]
#[command(name = "spark", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run a single command and exit
    #[arg(short, long)]
    text: Option<String>,

    /// Disable voice input (text commands only)
    #[arg(long, env = "SPARK_DISABLE_VOICE")]
    no_voice: bool,

    /// Start with wake word monitoring on
    #[arg(long)]
    wake_word: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show how a command would be classified
    Parse {
        /// Command text
        text: String,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speech output
    TestSpeaker {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the speech output.")]
        text: String,
    },
}

const HELP: &str =
    "Commands: /voice (speak a command), /wake on|off, /status, /clear (forget the conversation), /quit";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,spark_assistant=info",
        1 => "info,spark_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Parse { text } => parse(&text),
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker { text } => test_speaker(&text).await,
        };
    }

    let mut config = Config::load()?;
    if cli.no_voice {
        config.voice.enabled = false;
    }
    if cli.wake_word {
        config.voice.wake_word_enabled = true;
    }
    tracing::debug!(?config, "loaded configuration");

    let controller = PipelineController::new(collaborators(&config)?, config.pipeline_settings());
    let notifications = controller
        .take_notifications()
        .ok_or_else(|| anyhow::anyhow!("notification channel already taken"))?;
    let printer = tokio::spawn(print_notifications(notifications));

    controller.start().await;

    let outcome = match cli.text {
        Some(text) => {
            if let Some(handle) = controller.submit_text(&text) {
                handle.await?;
            }
            Ok(())
        }
        None => {
            tracing::info!(voice = config.voice.enabled, "spark ready");
            println!("{HELP}");

            tokio::select! {
                result = repl(&controller) => result,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received ctrl-c");
                    Ok(())
                }
            }
        }
    };

    controller.stop().await;

    // The printer ends once the controller's notifier is gone
    drop(controller);
    if tokio::time::timeout(Duration::from_secs(1), printer).await.is_err() {
        tracing::debug!("notification printer still draining");
    }

    outcome
}

/// Build the collaborators described by `config`
fn collaborators(config: &Config) -> anyhow::Result<Collaborators> {
    let provider = Arc::new(SystemActionProvider::new());
    let dispatcher = ActionDispatcher::new(provider, config.dispatch_settings());

    let transcriber: Arc<dyn Transcriber> = match (&config.api_keys.openai, config.voice.enabled) {
        (Some(key), true) => Arc::new(WhisperTranscriber::new(
            key.clone(),
            config.voice.stt_model.clone(),
            config.voice.stt_url.clone(),
            Duration::from_secs(30),
        )?),
        (None, true) => {
            tracing::warn!("OPENAI_API_KEY not set, voice input unavailable");
            Arc::new(DisabledTranscriber::new("microphone unavailable: no STT key"))
        }
        (_, false) => Arc::new(DisabledTranscriber::new("microphone disabled")),
    };

    let chat: Option<Arc<dyn Chat>> = if config.llm.enabled {
        Some(Arc::new(OllamaChat::new(
            &config.llm.base_url,
            config.llm.model.clone(),
            config.chat_timeout(),
        )?))
    } else {
        None
    };

    let speaker: Option<Arc<dyn Speaker>> = if config.voice.tts_enabled {
        let speaker = SystemSpeaker::new();
        speaker
            .is_available()
            .then(|| Arc::new(speaker) as Arc<dyn Speaker>)
    } else {
        None
    };

    Ok(Collaborators {
        transcriber,
        dispatcher: Arc::new(TimedDispatch::new(dispatcher)),
        chat,
        speaker,
    })
}

/// Read commands from stdin until EOF or `/quit`
async fn repl(controller: &PipelineController) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let handle = match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => {
                println!("{HELP}");
                continue;
            }
            "/status" => {
                let status = controller.wake_word_status();
                println!(
                    "running: {}, wake word: {} ({:?}), chat disabled: {}",
                    controller.is_running(),
                    controller.wake_word_enabled(),
                    status.state,
                    controller.chat_disabled(),
                );
                continue;
            }
            "/clear" => {
                controller.clear_history();
                println!("Conversation cleared.");
                continue;
            }
            "/wake on" => {
                controller.set_wake_word_enabled(true).await;
                continue;
            }
            "/wake off" => {
                controller.set_wake_word_enabled(false).await;
                continue;
            }
            "/voice" => controller.submit_voice(None),
            text => controller.submit_text(text),
        };

        // One command at a time keeps the transcript readable
        if let Some(handle) = handle {
            handle.await?;
        }
    }

    Ok(())
}

async fn print_notifications(mut rx: UnboundedReceiver<Notification>) {
    while let Some(notification) = rx.recv().await {
        match notification {
            Notification::Log(line) => println!("{line}"),
            Notification::Status(status) => tracing::debug!(%status, "status"),
            Notification::Intent(intent) => tracing::debug!(
                kind = %intent.kind,
                confidence = intent.confidence,
                "intent"
            ),
            Notification::Result(result) => tracing::debug!(
                success = result.success,
                kind = %result.intent_kind,
                "result"
            ),
        }
    }
}

/// Print the intent a command parses to
fn parse(text: &str) -> anyhow::Result<()> {
    let intent = IntentParser::new().parse(text);
    println!("{}", serde_json::to_string_pretty(&intent)?);
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Test speech output
async fn test_speaker(text: &str) -> anyhow::Result<()> {
    let speaker = SystemSpeaker::new();
    if !speaker.is_available() {
        anyhow::bail!("no speech program found (install espeak-ng or spd-say)");
    }

    println!("Speaking: \"{text}\"");
    if !speaker.speak(text).await {
        anyhow::bail!("speech output failed");
    }

    println!("If you heard the speech, output is working!");
    Ok(())
}
