//! ---
//! rda_section: "04-configuration-orchestration"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Settings persistence, sanitizing, migration, and access policy resolution."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
//! Save-time sanitizers, one per settings field.
//!
//! Sanitizers never fail: malformed input degrades to a default instead of an error.

use once_cell::sync::Lazy;
use rda_security::ADMIN_CAPABILITY;
use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::model::SettingField;

/// Schemes a redirect URL may use.
const ALLOWED_PROTOCOLS: &[&str] = &[
    "http", "https", "ftp", "ftps", "mailto", "news", "irc", "irc6", "ircs", "gopher", "nntp",
    "feed", "telnet", "mms", "rtsp", "sms", "svn", "tel", "fax", "xmpp", "webcal", "urn",
];

static URL_DISALLOWED_CHARS: Lazy<Regex> =
    Lazy::new(|| compile(r"[^a-zA-Z0-9\-~+_.?#=!&;,/:%@$|*'()\[\]\x{80}-\x{10FFFF}]"));
static URL_ENCODED_LINE_BREAKS: Lazy<Regex> = Lazy::new(|| compile(r"(?i)%0[ad]"));
static URL_SCHEME: Lazy<Regex> = Lazy::new(|| compile(r"^([a-zA-Z][a-zA-Z0-9+.\-]*):"));
static SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?is)<script[^>]*?>.*?</script\s*>|<style[^>]*?>.*?</style\s*>")
});
static HTML_TAG: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<[^>]*>"));
static UNCLOSED_TAG: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<[a-zA-Z/!?].*$"));
static PERCENT_OCTET: Lazy<Regex> = Lazy::new(|| compile(r"%[a-fA-F0-9]{2}"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| compile(r"\s+"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex to compile")
}

/// Whether a submitted value counts as empty: null, false, 0, "", "0", or an empty collection.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty() || text == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Inverse of [`is_empty_value`].
pub fn is_truthy(value: &Value) -> bool {
    !is_empty_value(value)
}

/// Scalar rendering of a submitted value. Booleans render as `1` or the empty string.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_owned(),
        Value::Bool(false) => String::new(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Facts the sanitizers need beyond the submitted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeContext {
    /// Absolute home URL of the site.
    pub home_url: String,
    /// Switch value persisted at the time the sanitizer runs.
    pub persisted_switch: Option<String>,
}

/// Access switch: stored as submitted.
pub fn sanitize_access_switch(value: &Value) -> String {
    value_to_string(value)
}

/// Access capability: an empty submission falls back to the persisted switch.
pub fn sanitize_access_cap(value: &Value, persisted_switch: Option<&str>) -> String {
    if is_empty_value(value) {
        return match persisted_switch {
            Some(switch) if !switch.is_empty() => switch.to_owned(),
            _ => ADMIN_CAPABILITY.to_owned(),
        };
    }
    value_to_string(value)
}

/// Redirect URL: empty or unsafe input falls back to the home URL.
pub fn sanitize_redirect_url(value: &str, home_url: &str) -> String {
    let candidate = value.trim_start().replace(' ', "%20");
    let candidate = URL_DISALLOWED_CHARS.replace_all(&candidate, "");
    let mut candidate = candidate.into_owned();
    while URL_ENCODED_LINE_BREAKS.is_match(&candidate) {
        candidate = URL_ENCODED_LINE_BREAKS
            .replace_all(&candidate, "")
            .into_owned();
    }
    if candidate.is_empty() {
        return home_url.to_owned();
    }

    if candidate.starts_with(['/', '#', '?']) {
        return Url::parse(home_url)
            .and_then(|home| home.join(&candidate))
            .map_or_else(|_| home_url.to_owned(), String::from);
    }

    let candidate = match URL_SCHEME.captures(&candidate) {
        Some(captures) => {
            let scheme = captures[1].to_ascii_lowercase();
            if !ALLOWED_PROTOCOLS.contains(&scheme.as_str()) {
                return home_url.to_owned();
            }
            candidate
        }
        None => format!("http://{candidate}"),
    };

    match Url::parse(&candidate) {
        Ok(_) => candidate,
        Err(_) => home_url.to_owned(),
    }
}

/// Profile access flag: empty or falsy means disabled.
pub fn sanitize_enable_profile(value: &Value) -> bool {
    is_truthy(value)
}

/// Login message: plain text on a single line.
pub fn sanitize_login_message(value: &str) -> String {
    let text = SCRIPT_OR_STYLE.replace_all(value, "");
    let text = HTML_TAG.replace_all(&text, "");
    let text = UNCLOSED_TAG.replace_all(&text, "");
    let mut text = text.into_owned();
    while PERCENT_OCTET.is_match(&text) {
        text = PERCENT_OCTET.replace_all(&text, "").into_owned();
    }
    let text: String = text
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect();
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_owned()
}

/// Apply the sanitizer registered for `field` and return the value to persist.
pub fn sanitize_field(field: SettingField, value: &Value, ctx: &SanitizeContext) -> Value {
    match field {
        SettingField::AccessSwitch => Value::String(sanitize_access_switch(value)),
        SettingField::AccessCap => {
            Value::String(sanitize_access_cap(value, ctx.persisted_switch.as_deref()))
        }
        SettingField::RedirectUrl => {
            Value::String(sanitize_redirect_url(&value_to_string(value), &ctx.home_url))
        }
        SettingField::EnableProfile => Value::Bool(sanitize_enable_profile(value)),
        SettingField::LoginMessage => {
            Value::String(sanitize_login_message(&value_to_string(value)))
        }
    }
}
