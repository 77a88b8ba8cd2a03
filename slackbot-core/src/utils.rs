// ABOUTME: Text helpers for Slack message bodies
// ABOUTME: Slack escapes only &, < and > in message text; these undo that

/// Undo Slack's HTML entity escaping of `&`, `<` and `>`
pub fn unescape_slack_text(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    // &amp; last so "&amp;lt;" stays "&lt;"
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
