//! DOT format helpers for graph export.

/// Escapes text for use inside a quoted DOT label.
///
/// Quotes, backslashes, newlines and the record-label brackets `<`, `>`, `{`,
/// `}` and `|` are escaped; carriage returns are dropped.
///
/// # Examples
///
/// ```rust,ignore
/// use ssagraph::utils::escape_dot;
///
/// assert_eq!(escape_dot("v3: Phi<i32>"), "v3: Phi\\<i32\\>");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\l"),
            '\r' => {}
            '<' | '>' | '{' | '}' | '|' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_dot_plain() {
        assert_eq!(escape_dot("v1: Goto"), "v1: Goto");
    }

    #[test]
    fn test_escape_dot_quotes_and_backslash() {
        assert_eq!(escape_dot("say \"hi\" \\"), "say \\\"hi\\\" \\\\");
    }

    #[test]
    fn test_escape_dot_lines_are_left_justified() {
        assert_eq!(escape_dot("a\r\nb"), "a\\lb");
    }

    #[test]
    fn test_escape_dot_record_characters() {
        assert_eq!(escape_dot("{x|<y>}"), "\\{x\\|\\<y\\>\\}");
    }
}
