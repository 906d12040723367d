//! CLI output formatting utilities.

use crate::tools::Source;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print the sources backing an answer.
    pub fn sources(sources: &[Source]) {
        if sources.is_empty() {
            return;
        }
        Output::header("Sources");
        for source in sources {
            println!("  {} {}", style("*").cyan(), source_line(source));
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// One-line rendering of a source, with its link when known.
fn source_line(source: &Source) -> String {
    match &source.url {
        Some(url) => format!("{} ({})", source.text, style(url).dim()),
        None => source.text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_line_without_url() {
        let source = Source {
            text: "Rust Fundamentals - Lesson 2".to_string(),
            url: None,
        };
        assert_eq!(source_line(&source), "Rust Fundamentals - Lesson 2");
    }

    #[test]
    fn test_source_line_with_url() {
        console::set_colors_enabled(false);
        let source = Source {
            text: "Rust Fundamentals - Lesson 1".to_string(),
            url: Some("https://example.com/rust/1".to_string()),
        };
        assert_eq!(
            source_line(&source),
            "Rust Fundamentals - Lesson 1 (https://example.com/rust/1)"
        );
    }
}
