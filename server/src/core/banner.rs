//! Startup banner and URL display

use super::config::is_all_interfaces;
use super::constants::APP_NAME;
use crate::utils::terminal::terminal_link;

/// Print the startup banner with URLs
pub fn print_banner(host: &str, port: u16, upstream_url: &str) {
    // Use localhost for display when binding to all interfaces
    let display_host = if is_all_interfaces(host) {
        "localhost"
    } else {
        host
    };

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();

    const W: usize = 12;

    let api_url = format!("http://{}:{}/api/v1", display_host, port);
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "API:",
        terminal_link(&api_url)
    );

    let docs_url = format!("http://{}:{}/api/docs", display_host, port);
    println!(
        "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "Docs:",
        terminal_link(&docs_url)
    );

    println!(
        "  \x1b[90m➜  {:<W$} {}\x1b[0m",
        "Upstream:", upstream_url
    );

    if host == "127.0.0.1" || host == "localhost" {
        println!(
            "  \x1b[90m➜  {:<W$} use --host 0.0.0.0 to expose\x1b[0m",
            "Network:"
        );
    } else {
        let network_url = format!("http://{}:{}", host, port);
        println!(
            "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
            "Network:",
            terminal_link(&network_url)
        );
    }

    println!();
}
