//! Text framing for the command protocol.
//!
//! A frame is a list of fields joined by [`DELIMITER`]. Inside a field, a
//! literal delimiter or escape character is prefixed with [`ESCAPE`]. One
//! outbound transport message may carry several frames separated by
//! [`FRAME_SEPARATOR`].

use std::borrow::Cow;

/// Separates fields within a frame.
pub const DELIMITER: char = ':';

/// Makes the following character literal.
pub const ESCAPE: char = '\\';

/// Separates coalesced frames in one outbound message.
pub const FRAME_SEPARATOR: char = '\n';

/// Split a frame into unescaped fields.
///
/// Always yields at least one field. A trailing escape with nothing after it
/// is kept as a literal backslash.
pub fn split(frame: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = frame.chars();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE => current.push(chars.next().unwrap_or(ESCAPE)),
            DELIMITER => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}

/// Escape one field so [`split`] returns it unchanged.
pub fn escape(field: &str) -> Cow<'_, str> {
    if !field.contains([DELIMITER, ESCAPE]) {
        return Cow::Borrowed(field);
    }
    let mut out = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        if c == DELIMITER || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    Cow::Owned(out)
}

/// Escape and join fields into one frame.
pub fn join<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        out.push_str(&escape(field.as_ref()));
    }
    out
}

/// Clean an inbound message: line breaks become spaces, surrounding
/// whitespace is trimmed.
pub fn normalize(raw: &str) -> String {
    raw.replace(['\r', '\n'], " ").trim().to_owned()
}

/// Split a coalesced outbound message back into frames.
pub fn frames(message: &str) -> impl Iterator<Item = &str> {
    message.split(FRAME_SEPARATOR).filter(|f| !f.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain_fields() {
        assert_eq!(split("PLAY:1:0,0"), vec!["PLAY", "1", "0,0"]);
        assert_eq!(split("MKRM"), vec!["MKRM"]);
        assert_eq!(split(""), vec![""]);
        assert_eq!(split("CHAT:1:"), vec!["CHAT", "1", ""]);
    }

    #[test]
    fn split_honors_escapes() {
        assert_eq!(split(r"CHAT:1:time\: 12\:30"), vec!["CHAT", "1", "time: 12:30"]);
        assert_eq!(split(r"CHAT:1:back\\slash"), vec!["CHAT", "1", r"back\slash"]);
        assert_eq!(split(r"CHAT:1:\x"), vec!["CHAT", "1", "x"]);
    }

    #[test]
    fn trailing_escape_is_literal() {
        assert_eq!(split(r"CHAT:1:oops\"), vec!["CHAT", "1", r"oops\"]);
    }

    #[test]
    fn escape_borrows_when_clean() {
        assert!(matches!(escape("hello"), Cow::Borrowed("hello")));
        assert_eq!(escape(r"a:b\c"), r"a\:b\\c");
    }

    #[test]
    fn join_escapes_each_field() {
        let frame = join(["CHAT", "17", "Guest1", "see you at 5:00"]);
        assert_eq!(frame, r"CHAT:17:Guest1:see you at 5\:00");
        assert_eq!(split(&frame), vec!["CHAT", "17", "Guest1", "see you at 5:00"]);
    }

    #[test]
    fn normalize_flattens_line_breaks() {
        assert_eq!(normalize("  CHAT:1:hi\r\nthere \n"), "CHAT:1:hi  there");
        assert_eq!(normalize("\n\n"), "");
    }

    #[test]
    fn frames_splits_coalesced_messages() {
        let got: Vec<_> = frames("MKRM:1\nJNSL:1:0\n").collect();
        assert_eq!(got, vec!["MKRM:1", "JNSL:1:0"]);
    }
}
