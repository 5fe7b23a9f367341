use crate::model::Settings;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Where resolved items go to be heard. Decoding is never done in-process.
pub trait Player {
    fn play(&mut self, uri: &str) -> Result<()>;
    fn stop(&mut self);
    fn current(&self) -> Option<&str>;
    fn elapsed(&self) -> Option<Duration>;
    /// Reports the end of the current item once; later calls return `false`
    /// until something else is played.
    fn is_finished(&mut self) -> bool;
    fn name(&self) -> String;
}

pub fn for_settings(settings: &Settings) -> Box<dyn Player> {
    let Some(command_line) = settings.player_command.as_deref() else {
        return Box::new(NullPlayer::new());
    };
    match CommandPlayer::new(command_line) {
        Ok(player) => Box::new(player),
        Err(err) => {
            warn!("falling back to silent player: {err:#}");
            Box::new(NullPlayer::new())
        }
    }
}

/// Tracks what would be playing without producing sound.
#[derive(Debug, Default)]
pub struct NullPlayer {
    current: Option<String>,
    started_at: Option<Instant>,
}

impl NullPlayer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Player for NullPlayer {
    fn play(&mut self, uri: &str) -> Result<()> {
        self.current = Some(uri.to_string());
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) {
        self.current = None;
        self.started_at = None;
    }

    fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|started| started.elapsed())
    }

    fn is_finished(&mut self) -> bool {
        false
    }

    fn name(&self) -> String {
        String::from("silent")
    }
}

/// Runs an external program per item, appending the item's URI to its
/// arguments. The item ends when the program exits.
#[derive(Debug)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
    current: Option<String>,
    started_at: Option<Instant>,
}

impl CommandPlayer {
    pub fn new(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().context("player command is empty")?;
        Ok(Self {
            program,
            args: parts.collect(),
            child: None,
            current: None,
            started_at: None,
        })
    }
}

impl Player for CommandPlayer {
    fn play(&mut self, uri: &str) -> Result<()> {
        self.stop();
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(uri)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start {}", self.program))?;
        info!("started {} for {uri}", self.program);
        self.child = Some(child);
        self.current = Some(uri.to_string());
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill() {
                debug!("player already gone: {err}");
            }
            let _ = child.wait();
        }
        self.current = None;
        self.started_at = None;
    }

    fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|started| started.elapsed())
    }

    fn is_finished(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => false,
            Ok(Some(status)) => {
                debug!("{} exited with {status}", self.program);
                self.child = None;
                true
            }
            Err(err) => {
                warn!("lost track of {}: {err}", self.program);
                self.child = None;
                true
            }
        }
    }

    fn name(&self) -> String {
        self.program.clone()
    }
}

impl Drop for CommandPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
