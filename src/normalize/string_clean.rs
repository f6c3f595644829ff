//! L2: string clean (§4.2). Strips control characters and whitespace noise
//! from every string-valued field; non-string fields pass through untouched.

use serde_json::Value;

use crate::model::Record;

pub fn apply(record: &Record) -> Record {
    let mut out = Record::new();
    for (field, value) in record {
        let cleaned = match value {
            Value::String(s) => clean(s).map(Value::String).unwrap_or(Value::Null),
            other => other.clone(),
        };
        out.insert(field.clone(), cleaned);
    }
    out
}

pub fn clean(input: &str) -> Option<String> {
    let normalized = input.replace("\r\n", "\n").replace('\r', "\n");

    let lines: Vec<String> = normalized
        .split('\n')
        .map(strip_line)
        .filter(|line| !line.is_empty())
        .collect();

    let joined = lines.join("\n");
    let trimmed = joined.trim();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn strip_line(line: &str) -> String {
    let without_control: String = line
        .chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .collect();

    let mut collapsed = String::with_capacity(without_control.len());
    let mut last_was_space = false;
    for c in without_control.trim().chars() {
        if c.is_whitespace() {
            if !last_was_space {
                collapsed.push(' ');
            }
            last_was_space = true;
        } else {
            collapsed.push(c);
            last_was_space = false;
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_internal_whitespace() {
        assert_eq!(clean("hello    world").as_deref(), Some("hello world"));
    }

    #[test]
    fn strips_outer_whitespace() {
        assert_eq!(clean("  hello  ").as_deref(), Some("hello"));
    }

    #[test]
    fn normalizes_crlf_and_drops_blank_lines() {
        let input = "line1\r\n\r\nline2\r\n   \r\nline3";
        assert_eq!(clean(input).as_deref(), Some("line1\nline2\nline3"));
    }

    #[test]
    fn empty_result_becomes_none() {
        assert_eq!(clean("   \t  "), None);
    }

    #[test]
    fn strips_control_characters_but_keeps_tab() {
        let input = "a\u{0007}b\tc";
        assert_eq!(clean(input).as_deref(), Some("ab c"));
    }
}
