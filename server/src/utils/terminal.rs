//! Terminal output helpers

/// Render a URL for the startup banner.
///
/// Emits an OSC 8 clickable hyperlink when the terminal advertises support,
/// otherwise just the URL in cyan.
pub fn terminal_link(url: &str) -> String {
    if supports_hyperlinks::on(supports_hyperlinks::Stream::Stdout) {
        format!("\x1b]8;;{}\x07\x1b[36m{}\x1b[0m\x1b]8;;\x07", url, url)
    } else {
        format!("\x1b[36m{}\x1b[0m", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_carries_url_and_color() {
        let out = terminal_link("http://127.0.0.1:8520/api/docs");
        assert!(out.contains("http://127.0.0.1:8520/api/docs"));
        assert!(out.starts_with('\x1b'));
        assert!(out.contains("\x1b[36m"));
        assert!(out.ends_with("\x1b[0m") || out.ends_with("\x1b]8;;\x07"));
    }

    #[test]
    fn test_plain_fallback_shape() {
        // Whichever branch runs, the output either is the plain cyan form or
        // wraps it in an OSC 8 pair.
        let url = "http://localhost:8520";
        let out = terminal_link(url);
        if !out.contains("\x1b]8;;") {
            assert_eq!(out, format!("\x1b[36m{}\x1b[0m", url));
        } else {
            assert!(out.contains(&format!("\x1b]8;;{}\x07", url)));
        }
    }
}
