//! Operation labels from call-expression text.
//!
//! Two shapes are recognised:
//!
//! ```text
//! open(path, flags) != -1          -> "open"   (callee)
//! (rc = open(path, flags)) != -1   -> "rc"     (assignment target)
//! ```
//!
//! The text usually comes from `stringify!` inside the guard macros.

/// Label length cap for text that holds no call.
pub const LABEL_MAX: usize = 64;

/// Parsed view of a call expression's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallShape<'a> {
    pub text: &'a str,
    /// Variable assigned by `(<var> = <op>(...))`.
    pub target: Option<&'a str>,
    /// Name in front of the first call parenthesis.
    pub callee: Option<&'a str>,
}

impl<'a> CallShape<'a> {
    /// Assignment target if there is one, else the callee, else the
    /// trimmed text cut to `max` bytes.
    pub fn label(&self, max: usize) -> &'a str {
        self.target
            .or(self.callee)
            .unwrap_or_else(|| truncate(self.text.trim(), max))
    }
}

pub fn parse_call(text: &str) -> CallShape<'_> {
    let open = find_from(text, 1, |_, b| b == b'(');
    let assign = find_from(text, 1, |i, b| b == b'=' && is_assignment(text.as_bytes(), i));

    let Some(p1) = open else {
        return CallShape {
            text,
            target: None,
            callee: None,
        };
    };

    match assign {
        Some(p2) if p2 < p1 => CallShape {
            text,
            target: non_empty(clean_target(&text[..p2])),
            callee: non_empty(clean_callee(&text[p2 + 1..p1])),
        },
        _ => CallShape {
            text,
            target: None,
            callee: non_empty(clean_callee(&text[..p1])),
        },
    }
}

/// Label for `text` using [`LABEL_MAX`].
pub fn extract_label(text: &str) -> &str {
    extract_label_with_max(text, LABEL_MAX)
}

pub fn extract_label_with_max(text: &str, max: usize) -> &str {
    parse_call(text).label(max)
}

fn find_from(text: &str, start: usize, pred: impl Fn(usize, u8) -> bool) -> Option<usize> {
    text.bytes()
        .enumerate()
        .skip(start)
        .find(|&(i, b)| pred(i, b))
        .map(|(i, _)| i)
}

// `==`, `!=`, `<=`, `>=` and `=>` are not assignments; `<<=` and `>>=` are.
fn is_assignment(bytes: &[u8], i: usize) -> bool {
    let prev = i.checked_sub(1).and_then(|p| bytes.get(p)).copied();
    let before_prev = i.checked_sub(2).and_then(|p| bytes.get(p)).copied();
    let next = bytes.get(i + 1).copied();
    if matches!(next, Some(b'=' | b'>')) {
        return false;
    }
    match prev {
        Some(b'<' | b'>') => before_prev == prev,
        Some(b'=' | b'!') => false,
        _ => true,
    }
}

fn clean_target(s: &str) -> &str {
    s.trim_start_matches(|c: char| c == '(' || c.is_whitespace())
        .trim_end_matches(|c: char| c.is_whitespace() || "+-*/%&|^<>".contains(c))
}

fn clean_callee(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_whitespace() || "(!&*".contains(c))
        .trim_end()
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_call() {
        assert_eq!(extract_label("open(path, flags) != -1"), "open");
        assert_eq!(extract_label("write(fd, buf, len) == len"), "write");
    }

    #[test]
    fn test_assignment_form_yields_target() {
        assert_eq!(extract_label("(rc = open(path, flags)) != -1"), "rc");
        let shape = parse_call("(rc = open(path, flags)) != -1");
        assert_eq!(shape.target, Some("rc"));
        assert_eq!(shape.callee, Some("open"));
    }

    #[test]
    fn test_comparison_is_not_assignment() {
        let shape = parse_call("n == read(fd, buf, len)");
        assert_eq!(shape.target, None);
        assert_eq!(shape.callee, Some("n == read"));
        assert_eq!(extract_label("a >= len(x)"), "a >= len");
    }

    #[test]
    fn test_compound_assignment_target() {
        assert_eq!(extract_label("(total += read(fd, buf, n)) > 0"), "total");
        assert_eq!(extract_label("(a <<= f(x)) > 0"), "a");
        assert_eq!(extract_label("(a >>= f(x))"), "a");
        let shape = parse_call("(mask >>= shift(bits))");
        assert_eq!(shape.target, Some("mask"));
        assert_eq!(shape.callee, Some("shift"));
        // a lone `<` or `>` before `=` is still a comparison
        assert_eq!(parse_call("n <= len(x)").target, None);
        assert_eq!(parse_call("n >= len(x)").target, None);
    }

    #[test]
    fn test_stringified_rust_expressions() {
        assert_eq!(extract_label(stringify!(file.read(&mut buf).is_ok())), "file.read");
        assert_eq!(extract_label(stringify!(!ptr.is_null())), "ptr.is_null");
        assert_eq!(extract_label(stringify!(libc::close(fd) == 0)), "libc::close");
    }

    #[test]
    fn test_no_call_falls_back_to_text() {
        assert_eq!(extract_label("  ready  "), "ready");
        assert_eq!(extract_label("(x)"), "(x)");
        let long = "x".repeat(200);
        assert_eq!(extract_label(&long).len(), LABEL_MAX);
        assert_eq!(extract_label(""), "");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "é".repeat(40);
        let label = extract_label_with_max(&text, 5);
        assert_eq!(label, "éé");
    }

    #[test]
    fn test_paren_at_position_zero_is_skipped() {
        assert_eq!(extract_label("(foo(x)) != 0"), "foo");
    }
}
