use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::registry::Registry;

/// What a built-in gets to work with while it runs.
#[derive(Debug)]
pub struct Invocation<'a> {
    /// Platform id of the user who sent the command.
    pub invoker: u64,
    pub registry: &'a mut Registry,
}

/// A command backed by code instead of a stored reply.
pub trait Builtin: Send + Sync {
    fn id(&self) -> &'static str;
    fn help(&self) -> &'static str;

    /// Runs the command and returns the reply text.
    ///
    /// # Errors
    ///
    /// An error means the command could not run at all; the caller logs it and
    /// sends nothing. Expected failures (bad usage, permission denied) are
    /// ordinary replies.
    fn execute(&self, inv: &mut Invocation<'_>, argument: &str) -> Result<String>;
}

/// Which names a built-in answers to, and whether it is switched on.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuiltinSpec {
    pub id: String,
    #[serde(default = "enabled_true")]
    pub enabled: bool,
    #[serde(default)]
    pub commands: Vec<String>,
}

const fn enabled_true() -> bool {
    true
}

impl BuiltinSpec {
    #[must_use]
    pub fn new(id: &str, commands: &[&str]) -> Self {
        Self {
            id: id.to_owned(),
            enabled: true,
            commands: commands.iter().map(|c| (*c).to_owned()).collect(),
        }
    }
}

/// Supplies a built-in's default spec and builds its instance.
pub trait BuiltinFactory {
    /// Adds this built-in's default spec unless one with the same id is present.
    fn register_defaults(&self, specs: &mut Vec<BuiltinSpec>);

    #[must_use]
    fn build(&self) -> Arc<dyn Builtin>;
}

/// Pushes `spec` unless `specs` already carries its id.
pub fn push_default(specs: &mut Vec<BuiltinSpec>, spec: BuiltinSpec) {
    if !specs.iter().any(|s| s.id == spec.id) {
        specs.push(spec);
    }
}

/// Splits `"<first> <rest>"`, trimming both halves. `rest` may be empty.
#[must_use]
pub fn split_first_word(argument: &str) -> Option<(&str, &str)> {
    let argument = argument.trim();
    if argument.is_empty() {
        return None;
    }
    Some(
        argument
            .split_once(char::is_whitespace)
            .map_or((argument, ""), |(first, rest)| (first, rest.trim())),
    )
}
