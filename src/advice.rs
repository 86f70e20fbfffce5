//! Advice text for a matched label.
//!
//! The language model that writes the advice is external; this module holds the
//! request type, the prompt, a generator that pipes the prompt through a
//! configured program and the fallback generator.

use crate::error::{MatchError, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Returned when no generator is configured.
pub const ADVICE_UNAVAILABLE: &str = "AI advice could not be prepared.";

/// Everything a generator gets to see about one match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdviceRequest {
    pub label: String,
    /// Special category (cat) vs. the rest (dog)
    pub is_special: bool,
    /// Caller-supplied context such as `ownerName` and `living`
    pub context: HashMap<String, String>,
}

impl AdviceRequest {
    fn context_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.context.get(key).map(String::as_str).unwrap_or(default)
    }
}

/// Produces free text for a match. The text is passed through untouched.
pub trait AdviceGenerator: Send + Sync {
    fn advise(&self, request: &AdviceRequest) -> Result<String>;
}

/// Generator used when no model is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdvice;

impl AdviceGenerator for NoAdvice {
    fn advise(&self, _request: &AdviceRequest) -> Result<String> {
        Ok(ADVICE_UNAVAILABLE.to_string())
    }
}

/// Sends the prompt to an external program on stdin and returns its stdout.
///
/// The program is typically a small wrapper around a hosted language model.
#[derive(Debug, Clone)]
pub struct CommandAdvice {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandAdvice {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a command line (whitespace separated, no quoting).
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| MatchError::InvalidConfig("Empty advice command".to_string()))?;
        Ok(Self::new(program, parts.map(str::to_string).collect()))
    }

    fn failure(&self, reason: impl std::fmt::Display) -> MatchError {
        MatchError::Advice {
            reason: format!("{}: {}", self.program.display(), reason),
        }
    }
}

impl AdviceGenerator for CommandAdvice {
    fn advise(&self, request: &AdviceRequest) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.failure(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(build_prompt(request).as_bytes())
                .map_err(|e| self.failure(e))?;
        }

        let output = child.wait_with_output().map_err(|e| self.failure(e))?;
        if !output.status.success() {
            return Err(self.failure(format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Run `generator`, turning a failure into text instead of an error.
pub fn advise_or_message(generator: &dyn AdviceGenerator, request: &AdviceRequest) -> String {
    generator
        .advise(request)
        .unwrap_or_else(|e| format!("advice error: {}", e))
}

/// The veterinary prompt sent to the language model.
pub fn build_prompt(request: &AdviceRequest) -> String {
    let animal = if request.is_special { "cat" } else { "dog" };
    let owner = request.context_or("ownerName", "User");
    let living = request.context_or("living", "unknown");

    format!(
        "You are a veterinary expert.\n\
         Detected animal: **{animal}** ({label})\n\
         Owner: {owner}, Living area: {living}\n\
         \n\
         Please provide:\n\
         1. A short summary of the breed\n\
         2. Whether the breed suits the owner's living area ({living})\n\
         3. Care recommendations\n\
         \n\
         Tone: friendly | expert.",
        label = request.label,
    )
}
