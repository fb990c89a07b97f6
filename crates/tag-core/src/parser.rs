/// A message of the form `<prefix>/<command> <argument>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub command: &'a str,
    /// Everything after the command, trimmed. Empty when nothing follows.
    pub argument: &'a str,
}

/// Matches `text` against `<prefix>/<command> <argument>`.
///
/// The prefix is compared ASCII case-insensitively and must start the message.
/// The command runs up to the first whitespace. `None` means the message is
/// ordinary chatter and should be ignored.
#[must_use]
pub fn parse<'a>(prefix: &str, text: &'a str) -> Option<ParsedCommand<'a>> {
    let head = text.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = text[prefix.len()..].strip_prefix('/')?;
    let (command, argument) = rest
        .split_once(char::is_whitespace)
        .unwrap_or((rest, ""));
    if command.is_empty() {
        return None;
    }
    Some(ParsedCommand {
        command,
        argument: argument.trim(),
    })
}
