use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcription {
    Heard(String),
    /// Nothing was said before the timeout.
    NoSpeech,
    Unintelligible,
    ServiceUnavailable(String),
}

impl Transcription {
    pub fn into_text(self) -> Option<String> {
        match self {
            Transcription::Heard(text) => Some(text),
            _ => None,
        }
    }
}

/// Turns one spoken phrase into text.
pub trait Transcriber {
    fn listen(&mut self, timeout: Duration, phrase_limit: Duration) -> Transcription;

    /// Text of the phrase, logging why when there is none.
    fn listen_for_text(&mut self, timeout: Duration, phrase_limit: Duration) -> Option<String> {
        let result = self.listen(timeout, phrase_limit);
        match &result {
            Transcription::Heard(text) => tracing::info!("heard: {text}"),
            Transcription::NoSpeech => tracing::warn!("no speech detected (timeout)"),
            Transcription::Unintelligible => tracing::warn!("speech was unintelligible"),
            Transcription::ServiceUnavailable(e) => {
                tracing::error!("could not reach the transcription service: {e}")
            }
        }
        result.into_text()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// External recognizer command. `{timeout}` and `{phrase_limit}` in the
    /// arguments are replaced by whole seconds. The command prints the
    /// recognized text on stdout.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_phrase_limit_secs")]
    pub phrase_limit_secs: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_phrase_limit_secs() -> u64 {
    10
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: default_timeout_secs(),
            phrase_limit_secs: default_phrase_limit_secs(),
        }
    }
}

impl VoiceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn phrase_limit(&self) -> Duration {
        Duration::from_secs(self.phrase_limit_secs)
    }
}

/// Runs an external recognizer and reads the phrase from its stdout.
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    program: String,
    args: Vec<String>,
}

impl CommandTranscriber {
    pub fn new(command: &str) -> anyhow::Result<Self> {
        let mut parts = shlex::split(command)
            .filter(|p| !p.is_empty())
            .with_context(|| format!("invalid transcriber command '{command}'"))?;
        let program = parts.remove(0);
        Ok(Self {
            program,
            args: parts,
        })
    }

    fn expanded_args(&self, timeout: Duration, phrase_limit: Duration) -> Vec<String> {
        self.args
            .iter()
            .map(|a| {
                a.replace("{timeout}", &timeout.as_secs().to_string())
                    .replace("{phrase_limit}", &phrase_limit.as_secs().to_string())
            })
            .collect()
    }
}

impl Transcriber for CommandTranscriber {
    fn listen(&mut self, timeout: Duration, phrase_limit: Duration) -> Transcription {
        let mut child = match Command::new(&self.program)
            .args(self.expanded_args(timeout, phrase_limit))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return Transcription::ServiceUnavailable(format!("{}: {e}", self.program)),
        };

        // Read both pipes while waiting; a chatty recognizer would otherwise
        // block on a full pipe and never exit.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + timeout + phrase_limit;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Transcription::NoSpeech;
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => return Transcription::ServiceUnavailable(e.to_string()),
            }
        };

        if !status.success() {
            let stderr = collect(stderr);
            return Transcription::ServiceUnavailable(format!("{status}: {}", stderr.trim()));
        }
        let stdout = collect(stdout);
        let text = stdout.trim();
        if text.is_empty() {
            Transcription::Unintelligible
        } else {
            Transcription::Heard(text.to_string())
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(reader: Option<JoinHandle<String>>) -> String {
    reader.and_then(|h| h.join().ok()).unwrap_or_default()
}
