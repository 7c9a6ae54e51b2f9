//! Log-safe string helpers.

/// Strip line breaks so user-controlled values cannot forge log lines.
pub fn sanitize(input: &str) -> String {
    input.replace(['\n', '\r'], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_line_breaks() {
        assert_eq!(sanitize("a\r\nb\nc"), "abc");
        assert_eq!(sanitize("plain"), "plain");
    }
}
