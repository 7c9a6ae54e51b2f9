//! Static HTML pages served by the gateway itself.
//!
//! The same page is used for the bare public domain (informational text) and
//! for error responses (the HTML-escaped error message).

use std::fmt::Write;

/// Render the gateway page, optionally showing `error`.
pub fn render(error: Option<&str>) -> Result<String, std::fmt::Error> {
    let mut page = String::with_capacity(1024);
    writeln!(page, "<!DOCTYPE html>")?;
    writeln!(page, "<html lang=\"en\">")?;
    writeln!(page, "<head>")?;
    writeln!(page, "<meta charset=\"utf-8\">")?;
    writeln!(page, "<title>Onion Gateway</title>")?;
    writeln!(page, "</head>")?;
    writeln!(page, "<body>")?;
    match error {
        Some(error) => {
            writeln!(page, "<h1>Error</h1>")?;
            writeln!(page, "<p>{}</p>", escape_html(error))?;
        }
        None => {
            writeln!(page, "<h1>Onion Gateway</h1>")?;
            writeln!(
                page,
                "<p>This gateway makes hidden services reachable from a regular browser. \
                 Replace <code>.onion</code> in an address with this domain to visit it.</p>"
            )?;
            writeln!(
                page,
                "<p>Traffic is decrypted at the gateway. Use a Tor client for anything sensitive.</p>"
            )?;
        }
    }
    writeln!(page, "</body>")?;
    write!(page, "</html>")?;
    Ok(page)
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_page() {
        let page = render(None).unwrap();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<h1>Onion Gateway</h1>"));
        assert!(!page.contains("<h1>Error</h1>"));
    }

    #[test]
    fn test_error_page_escapes_message() {
        let page = render(Some("invalid domain <script>x</script> called")).unwrap();
        assert!(page.contains("invalid domain &lt;script&gt;x&lt;/script&gt; called"));
        assert!(!page.contains("<script>"));
    }
}
