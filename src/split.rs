use memchr::{memchr, memchr_iter};

const QUOTE: u8 = b'"';

/// Split one physical line into its fields.
///
/// Quoting rules:
/// - `"` toggles the quoted state; inside a quoted field `""` is a literal `"`.
/// - the delimiter only ends a field outside quotes.
/// - the last field is always pushed, so a trailing delimiter yields a trailing `""`.
///
/// Each field is then trimmed, and a field fully wrapped in quotes loses exactly
/// one quote on each side. Quotes anywhere else are kept as-is.
pub fn split_line(line: &str, delimiter: u8) -> Vec<String> {
    debug_assert!(delimiter.is_ascii() && delimiter != QUOTE);

    // No quotes on the line: plain delimiter split gives the same result.
    if memchr(QUOTE, line.as_bytes()).is_none() {
        return split_unquoted(line, delimiter);
    }

    let delimiter = delimiter as char;
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                current.push('"');
                chars.next();
            } else {
                in_quotes = !in_quotes;
            }
        } else if ch == delimiter && !in_quotes {
            fields.push(finish_field(&current));
            current.clear();
        } else {
            current.push(ch);
        }
    }
    fields.push(finish_field(&current));
    fields
}

fn split_unquoted(line: &str, delimiter: u8) -> Vec<String> {
    let bytes = line.as_bytes();
    let mut fields = Vec::new();
    let mut start = 0usize;
    for i in memchr_iter(delimiter, bytes) {
        // delimiter is ASCII, so `i` is always a char boundary
        fields.push(line[start..i].trim().to_string());
        start = i + 1;
    }
    fields.push(line[start..].trim().to_string());
    fields
}

fn finish_field(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') {
        // a lone `"` both starts and ends with a quote and strips to nothing
        trimmed.get(1..trimmed.len() - 1).unwrap_or_default().to_string()
    } else {
        trimmed.to_string()
    }
}
