//! Bot command parsing (`/cmd@botname argument`).

/// A parsed command and its trimmed argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    pub name: &'a str,
    pub argument: &'a str,
}

/// Parse `text` as a command.
///
/// Returns `None` for plain text, a bare `/`, or a command addressed to a
/// different bot (`/start@other_bot` when our username is known).
pub fn parse_command<'a>(text: &'a str, username: Option<&str>) -> Option<Command<'a>> {
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\u{a0}');
    let (head, rest) = match text.find([' ', '\u{a0}']) {
        Some(idx) => {
            let sep_len = text[idx..].chars().next().map_or(1, char::len_utf8);
            (&text[..idx], &text[idx + sep_len..])
        }
        None => (text, ""),
    };

    let name = head.strip_prefix('/')?;
    let (name, target) = match name.rsplit_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (name, None),
    };
    if name.is_empty() {
        return None;
    }
    if let (Some(target), Some(username)) = (target, username)
        && target != username
    {
        return None;
    }

    Some(Command {
        name,
        argument: rest.trim_matches(|c: char| c.is_whitespace() || c == '\u{a0}'),
    })
}
