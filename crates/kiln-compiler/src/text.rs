//! Markup text handling: whitespace collapsing and character references.

/// Collapse a raw text child the way markup compilers do.
///
/// Lines are trimmed (except the leading edge of the first line and the
/// trailing edge of the last), blank lines are dropped, and the remaining
/// lines are joined with a single space. `None` when nothing is left.
pub(crate) fn clean_text(raw: &str) -> Option<String> {
    let lines: Vec<&str> = raw.split('\n').collect();
    let last = lines.len() - 1;
    let mut out = String::new();

    for (i, line) in lines.iter().enumerate() {
        let line = line.trim_end_matches('\r');
        let mut trimmed = line;
        if i != 0 {
            trimmed = trimmed.trim_start_matches([' ', '\t']);
        }
        if i != last {
            trimmed = trimmed.trim_end_matches([' ', '\t']);
        }
        if trimmed.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(trimmed);
    }

    if out.is_empty() {
        None
    } else {
        Some(decode_entities(&out))
    }
}

/// Replace `&amp;`, `&#123;`, `&#x7B;` and the other common references.
/// Unknown references are left as written.
pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').filter(|&end| end <= 10) {
            Some(end) => match decode_reference(&tail[1..end]) {
                Some(ch) => {
                    out.push(ch);
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = &tail[1..];
                }
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "middot" => '·',
        "bull" => '•',
        "times" => '×',
        "larr" => '←',
        "rarr" => '→',
        "uarr" => '↑',
        "darr" => '↓',
        "laquo" => '«',
        "raquo" => '»',
        "deg" => '°',
        "euro" => '€',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_keeps_inner_spaces() {
        assert_eq!(clean_text(" Hello, world "), Some(" Hello, world ".into()));
    }

    #[test]
    fn test_multiline_collapses() {
        assert_eq!(
            clean_text("\n      Total:\n      42 items\n    "),
            Some("Total: 42 items".into())
        );
    }

    #[test]
    fn test_whitespace_only_with_newline_is_dropped() {
        assert_eq!(clean_text("\n    "), None);
        assert_eq!(clean_text("   \n\t\n  "), None);
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(decode_entities("&#123;&#x7D;"), "{}");
        assert_eq!(decode_entities("&copy; 2024"), "© 2024");
        assert_eq!(decode_entities("R&D &unknown; &"), "R&D &unknown; &");
    }
}
