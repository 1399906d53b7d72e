//! Spark - Local voice and text assistant
//!
//! This library provides the core functionality for the Spark assistant:
//! - Intent classification of spoken or typed commands
//! - Action dispatch to desktop capabilities (apps, media, volume, timers)
//! - Voice processing (wake word monitoring, STT, TTS)
//! - Chat fallback to a local LLM for everything else
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │        Text REPL  │  Voice command  │  Wake word     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Pipeline                             │
//! │   Controller  │  Session  │  Notifications          │
//! └──────────┬─────────────────────────┬────────────────┘
//!            │                         │
//! ┌──────────▼──────────┐   ┌──────────▼────────────────┐
//! │ Intent + Dispatcher │   │ Chat (Ollama)             │
//! │ System actions      │   │                           │
//! └─────────────────────┘   └───────────────────────────┘
//! ```

pub mod actions;
pub mod chat;
pub mod config;
pub mod error;
pub mod intent;
pub mod pipeline;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use intent::{Intent, IntentKind, IntentParser};
pub use pipeline::PipelineController;
