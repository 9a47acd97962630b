//! Reading fields back out of a stored `<entry>` payload, and formatting the
//! chat message a Publisher ultimately sends.

use roxmltree::Document;

const SUMMARY_MAX_CHARS: usize = 200;
const SUMMARY_KEPT_CHARS: usize = SUMMARY_MAX_CHARS - 3; // "..." makes up the rest

fn child_text(payload: &str, tag: &str) -> Option<String> {
    let doc = Document::parse(payload).ok()?;
    doc.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn extract_link(payload: &str) -> Option<String> {
    child_text(payload, "link")
}

pub fn extract_title(payload: &str) -> Option<String> {
    child_text(payload, "title")
}

pub fn extract_summary(payload: &str) -> Option<String> {
    child_text(payload, "summary")
}

fn truncate_summary(summary: &str) -> String {
    if summary.chars().count() > SUMMARY_MAX_CHARS {
        let shortened: String = summary.chars().take(SUMMARY_KEPT_CHARS).collect();
        format!("{shortened}...")
    } else {
        summary.to_string()
    }
}

/// Build the chat message for a scored item about to be published.
///
/// Format:
/// ```text
/// **{rank:.1}** · {source_name}
///
/// **{title}**
/// {summary, truncated to 200 chars total (197 + "...") if longer}
///
/// {link}
/// ```
pub fn format_news_message(
    rank: f64,
    source_name: &str,
    title: &str,
    summary: Option<&str>,
    link: &str,
) -> String {
    let mut out = format!("**{rank:.1}** · {source_name}\n\n**{title}**\n");
    if let Some(summary) = summary {
        out.push_str(&truncate_summary(summary));
        out.push('\n');
    }
    out.push('\n');
    out.push_str(link);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_fields_from_stored_payload() {
        let payload = "<entry><title>T</title><link>https://x/y</link><summary>S</summary></entry>";
        assert_eq!(extract_title(payload).as_deref(), Some("T"));
        assert_eq!(extract_link(payload).as_deref(), Some("https://x/y"));
        assert_eq!(extract_summary(payload).as_deref(), Some("S"));
    }

    #[test]
    fn format_news_message_matches_expected_layout() {
        let msg = format_news_message(8.7, "Example Feed", "Big News", Some("Something happened."), "https://x/y");
        assert_eq!(
            msg,
            "**8.7** · Example Feed\n\n**Big News**\nSomething happened.\n\nhttps://x/y"
        );
    }

    #[test]
    fn format_news_message_without_summary_skips_that_line() {
        let msg = format_news_message(8.0, "Example Feed", "Big News", None, "https://x/y");
        assert_eq!(msg, "**8.0** · Example Feed\n\n**Big News**\n\nhttps://x/y");
    }

    #[test]
    fn format_news_message_truncates_long_summaries_to_200_chars_total() {
        let long = "a".repeat(250);
        let msg = format_news_message(8.0, "Feed", "Title", Some(&long), "https://x");
        let expected_summary = format!("{}...", "a".repeat(197));
        assert_eq!(expected_summary.chars().count(), 200);
        assert!(msg.contains(&expected_summary));
    }
}
