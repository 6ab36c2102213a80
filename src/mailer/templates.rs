//! Mail bodies for confirmation requests and delivered bottles.

use url::Url;

use super::{Envelope, Sender};
use crate::bottle::Bottle;
use crate::config::MailConfig;
use crate::datetime::format_http_date;
use crate::{BottleError, Result};

/// Subject of the confirmation request.
pub const CONFIRM_SUBJECT: &str = "Confirm your bottle.email";

/// Subject of a delivered bottle.
pub const DELIVERY_SUBJECT: &str = "Your bottle.email from the past";

/// Escape text for inclusion in an HTML body.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' => out.push_str("<br>"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the confirmation link `{base_url}?id={id}`.
///
/// Links already mailed out depend on this shape staying stable.
pub fn confirmation_link(base_url: &str, id: &str) -> Result<String> {
    let mut url = Url::parse(base_url)
        .map_err(|e| BottleError::Config(format!("invalid confirm.base_url: {e}")))?;
    url.query_pairs_mut().clear().append_pair("id", id);
    Ok(url.into())
}

/// Mail asking the sender to confirm a new bottle.
pub fn confirmation_envelope(config: &MailConfig, bottle: &Bottle, link: &str) -> Envelope {
    let link = escape_html(link);
    let html = format!(
        "<h4>Confirmation required.</h4>\n\
         <p>Confirm your bottle.email from this link: <a href=\"{link}\">{link}</a>.</p>\n\
         <p>You'll receive your bottle.email at {when}.</p>\n\
         <p><b>How exciting!</b> 🤩</p>\n\
         <p>Regards, bottle.</p>\n",
        when = format_http_date(&bottle.send_at),
    );

    Envelope {
        to: bottle.email.clone(),
        from: Sender {
            email: config.from_email.clone(),
            name: config.confirm_from_name.clone(),
        },
        subject: CONFIRM_SUBJECT.to_string(),
        html,
    }
}

/// Mail carrying the bottle's text to its recipient.
pub fn delivery_envelope(config: &MailConfig, bottle: &Bottle) -> Envelope {
    let html = format!(
        "<h4>Hi, it is I, you..</h4>\n<p>{}</p>\n<p>Regards, bottle.</p>\n",
        escape_html(&bottle.text)
    );

    Envelope {
        to: bottle.email.clone(),
        from: Sender {
            email: config.from_email.clone(),
            name: config.from_name.clone(),
        },
        subject: DELIVERY_SUBJECT.to_string(),
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bottle::BottleStatus;
    use chrono::{TimeZone, Utc};

    fn bottle(text: &str) -> Bottle {
        let send_at = Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap();
        Bottle {
            id: "4f1c".to_string(),
            email: "a@x.com".to_string(),
            text: text.to_string(),
            status: BottleStatus::Unconfirmed,
            created_at: send_at - chrono::Duration::days(1),
            confirmed_at: None,
            send_at,
            sent_at: None,
            claimed_at: None,
            attempts: 0,
            last_error: None,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(
            escape_html("<script>\"x\"</script>"),
            "&lt;script&gt;&quot;x&quot;&lt;/script&gt;"
        );
        assert_eq!(escape_html("line 1\nline 2"), "line 1<br>line 2");
    }

    #[test]
    fn test_confirmation_link() {
        let link = confirmation_link("https://example.com/confirmBottle", "abc-123").unwrap();
        assert_eq!(link, "https://example.com/confirmBottle?id=abc-123");
    }

    #[test]
    fn test_confirmation_link_replaces_existing_query() {
        let link = confirmation_link("https://example.com/confirmBottle?id=old", "new").unwrap();
        assert_eq!(link, "https://example.com/confirmBottle?id=new");
    }

    #[test]
    fn test_confirmation_link_invalid_base() {
        assert!(confirmation_link("not a url", "abc").is_err());
    }

    #[test]
    fn test_confirmation_envelope() {
        let config = MailConfig::default();
        let b = bottle("hi");
        let envelope = confirmation_envelope(&config, &b, "https://x/confirmBottle?id=4f1c");

        assert_eq!(envelope.to, "a@x.com");
        assert_eq!(envelope.subject, CONFIRM_SUBJECT);
        assert_eq!(envelope.from.name, "bottle.email");
        assert!(envelope.html.contains("https://x/confirmBottle?id=4f1c"));
        assert!(envelope.html.contains("Tue, 20 Oct 2026 10:00:00 GMT"));
    }

    #[test]
    fn test_delivery_envelope_escapes_text() {
        let config = MailConfig::default();
        let envelope = delivery_envelope(&config, &bottle("<b>remember</b> me"));

        assert_eq!(envelope.subject, DELIVERY_SUBJECT);
        assert_eq!(envelope.from.name, "You from the past");
        assert!(envelope.html.contains("&lt;b&gt;remember&lt;/b&gt; me"));
        assert!(!envelope.html.contains("<b>remember"));
    }
}
