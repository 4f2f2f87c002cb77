//! Shell quoting
//!
//! Arguments are always passed to processes as separate argv entries. Quoting
//! is only applied when a command line is rendered as text, for logs and
//! batch scripts.

/// Quotes a single word for POSIX shells
///
/// Words made only of safe characters are returned as-is, so paths and flag
/// values stay readable.
pub fn quote(word: &str) -> String {
    if !word.is_empty() && word.chars().all(is_safe) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Joins words into a shell command line, quoting where needed
pub fn join<I, S>(words: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .map(|w| quote(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_./:=,@%+-".contains(c)
}
