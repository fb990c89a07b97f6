use std::{collections::HashMap, sync::Arc};

use builtin_manage::{AliasPlugin, EditPlugin, NewPlugin};
use builtin_tags::{InfoPlugin, TagsPlugin};
use tag_core::{Builtin, BuiltinFactory, BuiltinSpec, Registry, RegistryConfig, TagStore};
use tracing::{info, warn};

use crate::config::BotConfig;

fn factories() -> Vec<Box<dyn BuiltinFactory>> {
    vec![
        Box::new(TagsPlugin),
        Box::new(InfoPlugin),
        Box::new(NewPlugin),
        Box::new(EditPlugin),
        Box::new(AliasPlugin),
    ]
}

/// Builds the registry with every enabled built-in bound to its names.
///
/// Configured specs take precedence over a built-in's defaults; a built-in
/// without configured names answers to its id.
pub fn build_registry(config: &BotConfig, store: Box<dyn TagStore>) -> Registry {
    let factories = factories();
    let builtins: HashMap<&'static str, Arc<dyn Builtin>> = factories
        .iter()
        .map(|f| {
            let builtin = f.build();
            (builtin.id(), builtin)
        })
        .collect();

    let mut specs: Vec<BuiltinSpec> = config.builtins.clone().unwrap_or_default();
    for factory in &factories {
        factory.register_defaults(&mut specs);
    }

    let mut registry = Registry::new(
        store,
        RegistryConfig {
            super_owner: config.super_owner,
        },
    );
    for spec in specs {
        let Some(builtin) = builtins.get(spec.id.as_str()) else {
            warn!("Unknown built-in ID: {}", spec.id);
            continue;
        };
        if !spec.enabled {
            info!(builtin = %spec.id, "Built-in disabled");
            continue;
        }
        let names = if spec.commands.is_empty() {
            vec![spec.id]
        } else {
            spec.commands
        };
        registry.register_builtin(&names, builtin);
    }
    registry
}
