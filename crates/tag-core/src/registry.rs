use core::fmt;
use std::{collections::HashMap, sync::Arc};

use tracing::{debug, warn};

use crate::{
    builtin::{Builtin, Invocation},
    error::StoreResult,
    store::{AliasMap, TagStore},
    tag::CommandTag,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryConfig {
    /// User allowed to edit every tag regardless of who owns it.
    pub super_owner: Option<u64>,
}

/// What a dispatched command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Tag(CommandTag),
    Text { builtin: &'static str, body: String },
}

/// Tags, aliases and built-ins keyed by command name.
///
/// Every mutation is written through to the store. A failed write is logged
/// and the in-memory state is kept; it is retried on the next write.
pub struct Registry {
    tags: Vec<CommandTag>,
    index: HashMap<String, usize>,
    aliases: AliasMap,
    builtins: HashMap<String, Arc<dyn Builtin>>,
    store: Box<dyn TagStore>,
    config: RegistryConfig,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("tags", &self.tags.len())
            .field("aliases", &self.aliases.len())
            .field("builtins", &self.builtin_names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Command names must be reachable from a message, so no whitespace.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_whitespace)
}

impl Registry {
    pub fn new(store: Box<dyn TagStore>, config: RegistryConfig) -> Self {
        Self {
            tags: Vec::new(),
            index: HashMap::new(),
            aliases: AliasMap::new(),
            builtins: HashMap::new(),
            store,
            config,
        }
    }

    /// Makes `builtin` answer to each of `names`. Later registrations win.
    pub fn register_builtin<S: AsRef<str>>(&mut self, names: &[S], builtin: &Arc<dyn Builtin>) {
        for name in names {
            let name = name.as_ref().trim();
            if !is_valid_name(name) {
                warn!(builtin = builtin.id(), name, "Skipping invalid built-in command name");
                continue;
            }
            if let Some(previous) = self.builtins.insert(name.to_owned(), Arc::clone(builtin)) {
                debug!(name, previous = previous.id(), now = builtin.id(), "Built-in name rebound");
            }
        }
    }

    /// Replaces tags and aliases with what the store holds. Returns the tag count.
    ///
    /// # Errors
    ///
    /// Propagates the store's read error; the registry is left untouched.
    ///
    /// A name stored more than once keeps its first entry.
    pub fn load(&mut self) -> StoreResult<usize> {
        let snapshot = self.store.load()?;
        let mut tags = Vec::with_capacity(snapshot.tags.len());
        let mut index = HashMap::with_capacity(snapshot.tags.len());
        for tag in snapshot.tags {
            if index.contains_key(&tag.name) {
                warn!(name = %tag.name, owner = tag.owner, "Dropping duplicate stored tag");
                continue;
            }
            index.insert(tag.name.clone(), tags.len());
            tags.push(tag);
        }
        self.tags = tags;
        self.index = index;
        self.aliases = snapshot.aliases;
        Ok(self.tags.len())
    }

    /// Writes every tag and alias to the store.
    ///
    /// # Errors
    ///
    /// Propagates the store's write error.
    pub fn flush(&self) -> StoreResult<()> {
        self.store.save(&self.tags, &self.aliases)
    }

    fn persist(&self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "Saving commands failed; keeping in-memory state");
        }
    }

    /// The alias target if `name` is an alias, otherwise `name` itself.
    #[must_use]
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map_or(name, String::as_str)
    }

    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        let canonical = self.resolve(name);
        self.index.contains_key(canonical) || self.builtins.contains_key(canonical)
    }

    /// The tag `name` resolves to, if it is a basic command.
    #[must_use]
    pub fn tag(&self, name: &str) -> Option<&CommandTag> {
        self.index
            .get(self.resolve(name))
            .and_then(|&i| self.tags.get(i))
    }

    pub fn new_command(&mut self, owner: u64, name: &str, reply: &str) -> bool {
        if !is_valid_name(name) || self.exists(name) || self.aliases.contains_key(name) {
            return false;
        }
        self.index.insert(name.to_owned(), self.tags.len());
        self.tags.push(CommandTag::new(owner, name, reply));
        self.persist();
        true
    }

    pub fn edit_command(&mut self, name: &str, user: u64, new_reply: &str) -> bool {
        let super_owner = self.config.super_owner;
        let Some(&i) = self.index.get(self.resolve(name)) else {
            return false;
        };
        let Some(tag) = self.tags.get_mut(i) else {
            return false;
        };
        if !tag.is_owned_by(user) && super_owner != Some(user) {
            return false;
        }
        new_reply.clone_into(&mut tag.reply);
        self.persist();
        true
    }

    /// Adds `alias` pointing at whatever `name` resolves to.
    pub fn new_alias(&mut self, name: &str, alias: &str) -> bool {
        if !is_valid_name(alias) || self.exists(alias) || self.aliases.contains_key(alias) {
            return false;
        }
        if !self.exists(name) {
            return false;
        }
        let target = self.resolve(name).to_owned();
        self.aliases.insert(alias.to_owned(), target);
        self.persist();
        true
    }

    /// Basic command names in creation order.
    #[must_use]
    pub fn list_commands(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }

    #[must_use]
    pub fn builtin_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builtins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Resolves `command` and runs it. Unknown commands yield `None`, as do
    /// built-ins that fail outright.
    pub fn dispatch(&mut self, invoker: u64, command: &str, argument: &str) -> Option<Response> {
        let canonical = self.resolve(command).to_owned();
        if let Some(tag) = self.tag(&canonical) {
            return Some(Response::Tag(tag.clone()));
        }
        let builtin = Arc::clone(self.builtins.get(&canonical)?);
        let mut inv = Invocation {
            invoker,
            registry: self,
        };
        match builtin.execute(&mut inv, argument) {
            Ok(body) => Some(Response::Text {
                builtin: builtin.id(),
                body,
            }),
            Err(e) => {
                warn!(error = %e, builtin = builtin.id(), command = %canonical, "Built-in failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::{Result, anyhow};

    use super::*;
    use crate::{error::StoreError, store::Snapshot};

    #[derive(Clone, Default)]
    struct MemoryStore {
        saved: Arc<Mutex<Snapshot>>,
        saves: Arc<Mutex<usize>>,
        fail_writes: bool,
    }

    impl TagStore for MemoryStore {
        fn load(&self) -> StoreResult<Snapshot> {
            Ok(self.saved.lock().unwrap().clone())
        }

        fn save(&self, tags: &[CommandTag], aliases: &AliasMap) -> StoreResult<()> {
            if self.fail_writes {
                return Err(StoreError::Io {
                    path: "memory".into(),
                    source: std::io::Error::other("disk full"),
                });
            }
            *self.saves.lock().unwrap() += 1;
            *self.saved.lock().unwrap() = Snapshot {
                tags: tags.to_vec(),
                aliases: aliases.clone(),
            };
            Ok(())
        }
    }

    struct Echo;

    impl Builtin for Echo {
        fn id(&self) -> &'static str {
            "echo"
        }
        fn help(&self) -> &'static str {
            "echo"
        }
        fn execute(&self, inv: &mut Invocation<'_>, argument: &str) -> Result<String> {
            Ok(format!("{}:{argument}", inv.invoker))
        }
    }

    struct Broken;

    impl Builtin for Broken {
        fn id(&self) -> &'static str {
            "broken"
        }
        fn help(&self) -> &'static str {
            "always fails"
        }
        fn execute(&self, _inv: &mut Invocation<'_>, _argument: &str) -> Result<String> {
            Err(anyhow!("boom"))
        }
    }

    const SUPER: u64 = 1;

    fn registry_with(store: MemoryStore) -> Registry {
        let mut registry = Registry::new(
            Box::new(store),
            RegistryConfig {
                super_owner: Some(SUPER),
            },
        );
        let echo: Arc<dyn Builtin> = Arc::new(Echo);
        registry.register_builtin(&["echo"], &echo);
        registry
    }

    fn registry() -> Registry {
        registry_with(MemoryStore::default())
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut reg = registry();
        assert!(reg.new_command(42, "hello", "hi there"));
        assert!(reg.new_alias("hello", "hey"));

        for name in ["hello", "hey", "unknown"] {
            let once = reg.resolve(name).to_owned();
            assert_eq!(reg.resolve(&once), once);
        }
    }

    #[test]
    fn alias_resolves_to_canonical_target() {
        let mut reg = registry();
        assert!(reg.new_command(42, "hello", "hi there"));
        assert!(reg.new_alias("hello", "hey"));
        assert!(reg.new_alias("hey", "yo"));

        assert_eq!(reg.resolve("hey"), "hello");
        assert_eq!(reg.resolve("yo"), "hello");
        assert!(reg.exists("yo"));
    }

    #[test]
    fn alias_to_missing_command_is_rejected() {
        let mut reg = registry();
        assert!(!reg.new_alias("hey", "hello"));
        assert!(reg.aliases().is_empty());
    }

    #[test]
    fn alias_cannot_shadow_existing_names() {
        let mut reg = registry();
        assert!(reg.new_command(42, "hello", "hi"));
        assert!(reg.new_command(42, "bye", "cya"));
        assert!(reg.new_alias("hello", "hey"));

        assert!(!reg.new_alias("hello", "bye"));
        assert!(!reg.new_alias("bye", "hey"));
        assert!(!reg.new_alias("hello", "echo"));
        assert!(!reg.new_alias("hello", "two words"));
        assert_eq!(reg.resolve("hey"), "hello");
    }

    #[test]
    fn alias_may_point_at_builtin() {
        let mut reg = registry();
        assert!(reg.new_alias("echo", "say"));
        assert_eq!(
            reg.dispatch(9, "say", "hi"),
            Some(Response::Text {
                builtin: "echo",
                body: "9:hi".to_owned()
            })
        );
    }

    #[test]
    fn new_command_rejects_taken_names() {
        let mut reg = registry();
        assert!(reg.new_command(42, "hello", "hi there"));
        assert!(reg.new_alias("hello", "hey"));

        assert!(!reg.new_command(5, "hello", "other"));
        assert!(!reg.new_command(5, "hey", "other"));
        assert!(!reg.new_command(5, "echo", "other"));
        assert!(!reg.new_command(5, "", "other"));
        assert!(!reg.new_command(5, "a b", "other"));
        assert_eq!(reg.tag("hello").unwrap().reply, "hi there");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn edit_by_stranger_is_denied() {
        let mut reg = registry();
        assert!(reg.new_command(42, "hello", "hi there"));

        assert!(!reg.edit_command("hello", 99, "defaced"));
        assert_eq!(reg.tag("hello").unwrap().reply, "hi there");
    }

    #[test]
    fn edit_by_owner_or_super_owner_through_alias() {
        let mut reg = registry();
        assert!(reg.new_command(42, "hello", "hi there"));
        assert!(reg.new_alias("hello", "hey"));

        assert!(reg.edit_command("hey", 42, "hello again"));
        assert_eq!(reg.tag("hello").unwrap().reply, "hello again");
        assert!(reg.edit_command("hello", SUPER, "moderated"));
        let tag = reg.tag("hello").unwrap();
        assert_eq!(tag.reply, "moderated");
        assert_eq!(tag.owner, 42);
    }

    #[test]
    fn edit_of_builtin_or_missing_fails() {
        let mut reg = registry();
        assert!(!reg.edit_command("echo", SUPER, "x"));
        assert!(!reg.edit_command("nope", SUPER, "x"));
    }

    #[test]
    fn list_keeps_creation_order() {
        let mut reg = registry();
        for name in ["zeta", "alpha", "mid"] {
            assert!(reg.new_command(1, name, "r"));
        }
        assert_eq!(reg.list_commands(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn every_mutation_is_persisted() {
        let store = MemoryStore::default();
        let mut reg = registry_with(store.clone());

        assert!(reg.new_command(42, "hello", "hi"));
        assert!(reg.edit_command("hello", 42, "hi there"));
        assert!(reg.new_alias("hello", "hey"));
        assert!(!reg.new_alias("hello", "hey"));

        assert_eq!(*store.saves.lock().unwrap(), 3);
        let saved = store.saved.lock().unwrap().clone();
        assert_eq!(saved.tags[0].reply, "hi there");
        assert_eq!(saved.aliases.get("hey").map(String::as_str), Some("hello"));
    }

    #[test]
    fn failed_save_keeps_memory_state() {
        let store = MemoryStore {
            fail_writes: true,
            ..MemoryStore::default()
        };
        let mut reg = registry_with(store);

        assert!(reg.new_command(42, "hello", "hi"));
        assert!(reg.flush().is_err());
        assert_eq!(reg.tag("hello").unwrap().reply, "hi");
    }

    #[test]
    fn load_restores_saved_state() {
        let store = MemoryStore::default();
        let mut first = registry_with(store.clone());
        assert!(first.new_command(42, "hello", "hi there"));
        assert!(first.new_alias("hello", "hey"));

        let mut second = registry_with(store);
        assert_eq!(second.load().unwrap(), 1);
        assert_eq!(second.tag("hey"), first.tag("hello"));
        assert_eq!(second.list_commands(), vec!["hello"]);
    }

    #[test]
    fn load_keeps_first_of_duplicate_names() {
        let store = MemoryStore::default();
        store.saved.lock().unwrap().tags = vec![
            CommandTag::new(42, "hello", "first"),
            CommandTag::new(7, "bye", "later"),
            CommandTag::new(43, "hello", "second"),
        ];

        let mut reg = registry_with(store);
        assert_eq!(reg.load().unwrap(), 2);
        assert_eq!(reg.list_commands(), vec!["hello", "bye"]);
        assert_eq!(reg.tag("hello").unwrap().reply, "first");
        assert_eq!(reg.tag("bye").unwrap().owner, 7);
    }

    #[test]
    fn dispatch_prefers_tags_and_reports_unknowns() {
        let mut reg = registry();
        assert!(reg.new_command(42, "hello", "hi there"));

        match reg.dispatch(3, "hello", "ignored") {
            Some(Response::Tag(tag)) => assert_eq!(tag.owner, 42),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(reg.dispatch(3, "missing", ""), None);
    }

    #[test]
    fn failing_builtin_yields_nothing() {
        let mut reg = registry();
        let broken: Arc<dyn Builtin> = Arc::new(Broken);
        reg.register_builtin(&["broken"], &broken);
        assert_eq!(reg.dispatch(1, "broken", ""), None);
    }
}
