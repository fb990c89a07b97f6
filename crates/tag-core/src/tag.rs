use core::fmt;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, macros::format_description};

/// A user-defined reply stored under a command name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTag {
    pub name: String,
    pub reply: String,
    pub owner: u64,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

impl CommandTag {
    /// Creates a tag stamped with the current time, truncated to whole seconds
    /// so it survives a round trip through the store unchanged.
    #[must_use]
    pub fn new(owner: u64, name: impl Into<String>, reply: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            name: name.into(),
            reply: reply.into(),
            owner,
            created_at: now.replace_nanosecond(0).unwrap_or(now),
        }
    }

    #[must_use]
    pub fn is_owned_by(&self, user: u64) -> bool {
        self.owner == user
    }
}

impl fmt::Display for CommandTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let created = self
            .created_at
            .format(format_description!(
                "[year repr:last_two]/[month]/[day] [hour]:[minute]:[second]"
            ))
            .map_err(|_| fmt::Error)?;
        write!(
            f,
            "Command: {}\nOwner id: {}\nCreated: {created}",
            self.name, self.owner
        )
    }
}
