//! ---
//! rda_section: "04-configuration-orchestration"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Settings persistence, sanitizing, migration, and access policy resolution."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
use crate::model::Settings;

/// Escape text for inclusion in HTML element content or attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Append the configured login message to `existing` login screen markup.
pub fn output_login_message(existing: &str, settings: &Settings) -> String {
    if settings.login_message.is_empty() {
        return existing.to_owned();
    }
    format!(
        "{existing}<p class=\"message\">{}</p>",
        escape_html(&settings.login_message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_message(message: &str) -> Settings {
        let mut settings = Settings::activation_defaults("https://example.org/");
        settings.login_message = message.to_owned();
        settings
    }

    #[test]
    fn empty_message_leaves_markup_untouched() {
        let settings = settings_with_message("");
        assert_eq!(output_login_message("<div>x</div>", &settings), "<div>x</div>");
    }

    #[test]
    fn message_is_escaped_and_appended() {
        let settings = settings_with_message("Back at 5 & <soon>");
        assert_eq!(
            output_login_message("", &settings),
            "<p class=\"message\">Back at 5 &amp; &lt;soon&gt;</p>"
        );
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(escape_html(r#"it's "here""#), "it&#039;s &quot;here&quot;");
    }
}
