//! Built-ins that change the registry: creating, editing and aliasing tags.

use std::sync::Arc;

use anyhow::Result;

use tag_core::{Builtin, BuiltinFactory, BuiltinSpec, Invocation, push_default, split_first_word};

#[derive(Debug)]
pub struct NewPlugin;

impl BuiltinFactory for NewPlugin {
    fn register_defaults(&self, specs: &mut Vec<BuiltinSpec>) {
        push_default(specs, BuiltinSpec::new("new", &["new"]));
    }

    fn build(&self) -> Arc<dyn Builtin> {
        Arc::new(NewTag)
    }
}

/// `new <name> <reply>`: the invoker becomes the owner.
#[derive(Debug)]
pub struct NewTag;

impl Builtin for NewTag {
    fn id(&self) -> &'static str {
        "new"
    }
    fn help(&self) -> &'static str {
        "Create a tag: new <name> <reply>"
    }
    fn execute(&self, inv: &mut Invocation<'_>, argument: &str) -> Result<String> {
        let Some((name, reply)) = split_first_word(argument).filter(|(_, r)| !r.is_empty()) else {
            return Ok(format!("Usage: {}", self.help()));
        };
        if inv.registry.new_command(inv.invoker, name, reply) {
            Ok(format!("Created tag `{name}`"))
        } else {
            Ok(format!("`{name}` is already taken"))
        }
    }
}

#[derive(Debug)]
pub struct EditPlugin;

impl BuiltinFactory for EditPlugin {
    fn register_defaults(&self, specs: &mut Vec<BuiltinSpec>) {
        push_default(specs, BuiltinSpec::new("edit", &["edit"]));
    }

    fn build(&self) -> Arc<dyn Builtin> {
        Arc::new(EditTag)
    }
}

/// `edit <name> <reply>`: only the owner or the super-owner may edit.
#[derive(Debug)]
pub struct EditTag;

impl Builtin for EditTag {
    fn id(&self) -> &'static str {
        "edit"
    }
    fn help(&self) -> &'static str {
        "Replace a tag's reply: edit <name> <reply>"
    }
    fn execute(&self, inv: &mut Invocation<'_>, argument: &str) -> Result<String> {
        let Some((name, reply)) = split_first_word(argument).filter(|(_, r)| !r.is_empty()) else {
            return Ok(format!("Usage: {}", self.help()));
        };
        if inv.registry.edit_command(name, inv.invoker, reply) {
            Ok(format!("Updated tag `{name}`"))
        } else if inv.registry.tag(name).is_some() {
            Ok(format!("You don't own `{name}`"))
        } else {
            Ok(format!("No tag named `{name}`"))
        }
    }
}

#[derive(Debug)]
pub struct AliasPlugin;

impl BuiltinFactory for AliasPlugin {
    fn register_defaults(&self, specs: &mut Vec<BuiltinSpec>) {
        push_default(specs, BuiltinSpec::new("alias", &["alias"]));
    }

    fn build(&self) -> Arc<dyn Builtin> {
        Arc::new(AddAlias)
    }
}

/// `alias <command> <alias>`
#[derive(Debug)]
pub struct AddAlias;

impl Builtin for AddAlias {
    fn id(&self) -> &'static str {
        "alias"
    }
    fn help(&self) -> &'static str {
        "Add another name for a command: alias <command> <alias>"
    }
    fn execute(&self, inv: &mut Invocation<'_>, argument: &str) -> Result<String> {
        let mut words = argument.split_whitespace();
        let (Some(name), Some(alias), None) = (words.next(), words.next(), words.next()) else {
            return Ok(format!("Usage: {}", self.help()));
        };
        if inv.registry.new_alias(name, alias) {
            Ok(format!("`{alias}` now runs `{}`", inv.registry.resolve(alias)))
        } else if inv.registry.exists(name) {
            Ok(format!("`{alias}` is already taken"))
        } else {
            Ok(format!("No command named `{name}`"))
        }
    }
}

#[cfg(test)]
mod tests {
    use tag_core::{JsonStore, Registry, RegistryConfig, Response, TagStore};
    use tempfile::TempDir;

    use super::*;

    const SUPER: u64 = 1;

    fn registry(tmp: &TempDir) -> Registry {
        let mut registry = Registry::new(
            Box::new(JsonStore::new(tmp.path())),
            RegistryConfig {
                super_owner: Some(SUPER),
            },
        );
        for factory in [&NewPlugin as &dyn BuiltinFactory, &EditPlugin, &AliasPlugin] {
            let mut specs = Vec::new();
            factory.register_defaults(&mut specs);
            registry.register_builtin(&specs[0].commands, &factory.build());
        }
        registry
    }

    fn text(response: Option<Response>) -> String {
        match response {
            Some(Response::Text { body, .. }) => body,
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn new_assigns_invoker_as_owner() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry(&tmp);

        assert_eq!(
            text(reg.dispatch(42, "new", "hello hi there")),
            "Created tag `hello`"
        );
        let tag = reg.tag("hello").unwrap();
        assert_eq!(tag.owner, 42);
        assert_eq!(tag.reply, "hi there");

        assert_eq!(text(reg.dispatch(7, "new", "hello again")), "`hello` is already taken");
        assert_eq!(text(reg.dispatch(7, "new", "lonely")), "Usage: Create a tag: new <name> <reply>");
    }

    #[test]
    fn edit_checks_ownership() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry(&tmp);
        assert!(reg.new_command(42, "hello", "hi there"));

        assert_eq!(text(reg.dispatch(99, "edit", "hello defaced")), "You don't own `hello`");
        assert_eq!(reg.tag("hello").unwrap().reply, "hi there");

        assert_eq!(text(reg.dispatch(42, "edit", "hello hi again")), "Updated tag `hello`");
        assert_eq!(text(reg.dispatch(SUPER, "edit", "hello fixed")), "Updated tag `hello`");
        assert_eq!(reg.tag("hello").unwrap().reply, "fixed");
        assert_eq!(text(reg.dispatch(42, "edit", "nope x")), "No tag named `nope`");
    }

    #[test]
    fn alias_is_persisted_immediately() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry(&tmp);
        assert!(reg.new_command(42, "hello", "hi there"));

        assert_eq!(text(reg.dispatch(5, "alias", "hello hey")), "`hey` now runs `hello`");
        assert_eq!(text(reg.dispatch(5, "alias", "hello hey")), "`hey` is already taken");
        assert_eq!(text(reg.dispatch(5, "alias", "ghost boo")), "No command named `ghost`");
        assert_eq!(
            text(reg.dispatch(5, "alias", "hello")),
            "Usage: Add another name for a command: alias <command> <alias>"
        );

        let on_disk = JsonStore::new(tmp.path()).load().unwrap();
        assert_eq!(on_disk.aliases.get("hey").map(String::as_str), Some("hello"));
    }
}
