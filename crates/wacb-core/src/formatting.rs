//! Human-facing strings: portal display names and room notices.

use std::sync::OnceLock;

use regex::{Captures, Regex};

pub const UNKNOWN_MESSAGE_NOTICE: &str =
    "Unknown message type, please view it on the WhatsApp app";

/// Values available to the display-name template.
#[derive(Clone, Debug, Default)]
pub struct DisplaynameParams<'a> {
    pub phone: Option<&'a str>,
    pub full_name: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub push_name: Option<&'a str>,
    pub business_name: Option<&'a str>,
}

impl<'a> DisplaynameParams<'a> {
    /// Params for a cloud contact: the profile name doubles as full and push name.
    pub fn for_contact(wa_id: &'a str, profile_name: Option<&'a str>) -> Self {
        Self {
            phone: Some(wa_id),
            full_name: profile_name,
            first_name: profile_name.and_then(|n| n.split_whitespace().next()),
            push_name: profile_name,
            business_name: None,
        }
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*\.?(\w+)\s*\}\}").expect("valid regex"))
}

/// Render a Go-style display-name template (`{{.FullName}} ({{.Phone}})`).
///
/// Unknown placeholders render as empty. If the template names the person
/// but every name placeholder came out empty, or nothing but whitespace and
/// punctuation remains, the formatted phone number is used instead.
pub fn render_displayname(template: &str, params: &DisplaynameParams<'_>) -> String {
    let phone = params.phone.map(format_phone).unwrap_or_default();
    let mut names_used = false;
    let mut names_filled = false;

    let rendered = placeholder_re().replace_all(template, |caps: &Captures<'_>| {
        let name = match &caps[1] {
            "Phone" => return phone.clone(),
            "FullName" => params.full_name,
            "FirstName" => params.first_name,
            "PushName" => params.push_name,
            "BusinessName" => params.business_name,
            _ => return String::new(),
        };
        let name = name.map(str::trim).unwrap_or("");
        names_used = true;
        names_filled |= !name.is_empty();
        name.to_string()
    });

    let rendered = rendered.trim();
    if (names_used && !names_filled) || !rendered.chars().any(char::is_alphanumeric) {
        phone
    } else {
        rendered.to_string()
    }
}

/// `+<digits>` unless the id already carries a plus sign.
pub fn format_phone(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('+') {
        raw.to_string()
    } else {
        format!("+{raw}")
    }
}

pub fn inbound_media_failure_notice(reason: &str) -> String {
    format!("Failed to upload media from WhatsApp: {reason}")
}

pub fn outbound_media_failure_notice(reason: &str) -> String {
    format!("Failed to send media to WhatsApp: {reason}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_DISPLAYNAME_TEMPLATE;

    #[test]
    fn renders_default_template() {
        let params = DisplaynameParams::for_contact("5550001", Some("Ada Lovelace"));
        assert_eq!(
            render_displayname(DEFAULT_DISPLAYNAME_TEMPLATE, &params),
            "Ada Lovelace (+5550001)"
        );
    }

    #[test]
    fn first_name_and_spacing_variants() {
        let params = DisplaynameParams::for_contact("5550001", Some("Ada Lovelace"));
        assert_eq!(render_displayname("{{ .FirstName }}", &params), "Ada");
        assert_eq!(render_displayname("{{Phone}}", &params), "+5550001");
    }

    #[test]
    fn empty_render_falls_back_to_phone() {
        let params = DisplaynameParams::for_contact("5550001", None);
        assert_eq!(render_displayname("{{.FullName}}", &params), "+5550001");
        assert_eq!(render_displayname("{{.Nope}}", &params), "+5550001");
    }

    #[test]
    fn nameless_contact_drops_template_punctuation() {
        let params = DisplaynameParams::for_contact("5550001", None);
        assert_eq!(
            render_displayname(DEFAULT_DISPLAYNAME_TEMPLATE, &params),
            "+5550001"
        );
        assert_eq!(
            render_displayname("WA: {{.PushName}} / {{.BusinessName}}", &params),
            "+5550001"
        );

        let business = DisplaynameParams {
            business_name: Some("Acme"),
            ..params
        };
        assert_eq!(
            render_displayname("{{.FullName}}{{.BusinessName}} ({{.Phone}})", &business),
            "Acme (+5550001)"
        );
        assert_eq!(render_displayname("Line {{.Phone}}", &business), "Line +5550001");
    }

    #[test]
    fn notices() {
        assert_eq!(
            inbound_media_failure_notice("media data is empty"),
            "Failed to upload media from WhatsApp: media data is empty"
        );
        assert!(
            outbound_media_failure_notice("x").starts_with("Failed to send media to WhatsApp")
        );
    }
}
