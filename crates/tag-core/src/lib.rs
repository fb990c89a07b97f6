pub mod builtin;
pub mod error;
pub mod parser;
pub mod registry;
pub mod store;
pub mod tag;

pub use builtin::{Builtin, BuiltinFactory, BuiltinSpec, Invocation, push_default, split_first_word};
pub use error::{StoreError, StoreResult};
pub use parser::{ParsedCommand, parse};
pub use registry::{Registry, RegistryConfig, Response, is_valid_name};
pub use store::{AliasMap, JsonStore, Snapshot, TagStore};
pub use tag::CommandTag;
