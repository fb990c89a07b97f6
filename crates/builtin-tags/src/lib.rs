use std::sync::Arc;

use anyhow::Result;

use tag_core::{Builtin, BuiltinFactory, BuiltinSpec, Invocation, push_default};

#[derive(Debug)]
pub struct TagsPlugin;

impl BuiltinFactory for TagsPlugin {
    fn register_defaults(&self, specs: &mut Vec<BuiltinSpec>) {
        push_default(specs, BuiltinSpec::new("tags", &["tags"]));
    }

    fn build(&self) -> Arc<dyn Builtin> {
        Arc::new(TagList)
    }
}

/// Lists every stored tag, one per line, oldest first.
#[derive(Debug)]
pub struct TagList;

impl Builtin for TagList {
    fn id(&self) -> &'static str {
        "tags"
    }
    fn help(&self) -> &'static str {
        "List all tags."
    }
    fn execute(&self, inv: &mut Invocation<'_>, _argument: &str) -> Result<String> {
        let names = inv.registry.list_commands();
        if names.is_empty() {
            return Ok("(no tags yet)".to_owned());
        }
        Ok(names.join("\n"))
    }
}

#[derive(Debug)]
pub struct InfoPlugin;

impl BuiltinFactory for InfoPlugin {
    fn register_defaults(&self, specs: &mut Vec<BuiltinSpec>) {
        push_default(specs, BuiltinSpec::new("info", &["info"]));
    }

    fn build(&self) -> Arc<dyn Builtin> {
        Arc::new(TagInfo)
    }
}

/// Shows who owns a tag and when it was created.
#[derive(Debug)]
pub struct TagInfo;

impl Builtin for TagInfo {
    fn id(&self) -> &'static str {
        "info"
    }
    fn help(&self) -> &'static str {
        "Show a tag's owner and creation time: info <name>"
    }
    fn execute(&self, inv: &mut Invocation<'_>, argument: &str) -> Result<String> {
        let name = argument.split_whitespace().next().unwrap_or_default();
        if name.is_empty() {
            return Ok("Usage: info <name>".to_owned());
        }
        Ok(inv.registry.tag(name).map_or_else(
            || format!("No tag named `{name}`"),
            ToString::to_string,
        ))
    }
}
