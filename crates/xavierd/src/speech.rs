//! Speech sources - where transcripts come from.
//!
//! Recognition itself lives outside the daemon. A source only hands over
//! finished `(text, confidence)` pairs; the daemon never looks at audio.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{SourceKind, SpeechConfig};

/// A finalized recognition result.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub confidence: f64,
}

impl Transcript {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Failed to open transcript source {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read transcript: {0}")]
    Read(#[from] io::Error),
}

/// Blocking producer of transcripts.
pub trait SpeechSource: Send {
    fn name(&self) -> &str;

    /// Next transcript, or `Ok(None)` once the source is exhausted.
    fn next_transcript(&mut self) -> Result<Option<Transcript>, SpeechError>;
}

/// Replays fixed transcripts, waiting `interval` before each one.
pub struct ScriptedSource {
    transcripts: VecDeque<String>,
    interval: Duration,
    confidence: f64,
}

impl ScriptedSource {
    pub fn new(transcripts: Vec<String>, interval: Duration, confidence: f64) -> Self {
        Self {
            transcripts: transcripts.into(),
            interval,
            confidence,
        }
    }
}

impl SpeechSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn next_transcript(&mut self) -> Result<Option<Transcript>, SpeechError> {
        let Some(text) = self.transcripts.pop_front() else {
            return Ok(None);
        };
        if !self.interval.is_zero() {
            debug!("Simulating voice command in {:?}", self.interval);
            thread::sleep(self.interval);
        }
        info!("Simulated transcript: {}", text);
        Ok(Some(Transcript::new(text, self.confidence)))
    }
}

/// Reads one transcript per line: `text` or `text<TAB>confidence`.
pub struct LineSource<R> {
    reader: R,
    confidence: f64,
    line: String,
}

impl<R: BufRead + Send> LineSource<R> {
    pub fn new(reader: R, confidence: f64) -> Self {
        Self {
            reader,
            confidence,
            line: String::new(),
        }
    }
}

impl<R: BufRead + Send> SpeechSource for LineSource<R> {
    fn name(&self) -> &str {
        "lines"
    }

    fn next_transcript(&mut self) -> Result<Option<Transcript>, SpeechError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            if let Some(transcript) = parse_line(&self.line, self.confidence) {
                return Ok(Some(transcript));
            }
        }
    }
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str, default_confidence: f64) -> Option<Transcript> {
    let line = line.trim_end_matches(['\r', '\n']);

    let (text, confidence) = match line.rsplit_once('\t') {
        Some((text, score)) => match score.trim().parse::<f64>() {
            Ok(c) if (0.0..=1.0).contains(&c) => (text, c),
            _ => {
                warn!("Ignoring confidence {:?} for transcript {:?}", score, text);
                (text, default_confidence)
            }
        },
        None => (line, default_confidence),
    };

    if text.trim().is_empty() {
        return None;
    }
    Some(Transcript::new(text, confidence))
}

/// Line source over a file path, opened on first use so a FIFO does not
/// block startup waiting for its writer.
pub struct PathLineSource {
    path: PathBuf,
    confidence: f64,
    inner: Option<LineSource<BufReader<File>>>,
}

impl PathLineSource {
    pub fn new(path: PathBuf, confidence: f64) -> Self {
        Self {
            path,
            confidence,
            inner: None,
        }
    }
}

impl SpeechSource for PathLineSource {
    fn name(&self) -> &str {
        "lines"
    }

    fn next_transcript(&mut self) -> Result<Option<Transcript>, SpeechError> {
        if self.inner.is_none() {
            let file = File::open(&self.path).map_err(|source| SpeechError::Open {
                path: self.path.clone(),
                source,
            })?;
            info!("Reading transcripts from {}", self.path.display());
            self.inner = Some(LineSource::new(BufReader::new(file), self.confidence));
        }
        match self.inner.as_mut() {
            Some(lines) => lines.next_transcript(),
            None => Ok(None),
        }
    }
}

/// Build the configured source.
pub fn create_source(config: &SpeechConfig) -> Box<dyn SpeechSource> {
    match config.source {
        SourceKind::Scripted => Box::new(ScriptedSource::new(
            config.transcripts.clone(),
            Duration::from_millis(config.interval_ms),
            config.confidence,
        )),
        SourceKind::Lines => {
            let path = config.path.clone().unwrap_or_default();
            Box::new(PathLineSource::new(path, config.confidence))
        }
    }
}

/// Drive `source` on its own thread. The channel closes when the source is
/// exhausted, fails, or the receiver goes away.
pub fn spawn_source(mut source: Box<dyn SpeechSource>) -> io::Result<mpsc::UnboundedReceiver<Transcript>> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name("xavier-speech".to_string())
        .spawn(move || {
            let name = source.name().to_string();
            loop {
                match source.next_transcript() {
                    Ok(Some(transcript)) => {
                        if tx.send(transcript).is_err() {
                            debug!("Transcript receiver closed");
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("Speech source '{}' exhausted", name);
                        break;
                    }
                    Err(e) => {
                        error!("Speech source '{}' failed: {}", name, e);
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}
