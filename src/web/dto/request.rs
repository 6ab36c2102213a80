//! Request DTOs for the bottle endpoints.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Bottle submission body.
///
/// Every field is optional at the wire level so that a missing field is
/// reported as invalid arguments rather than a deserialization failure.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SubmitBottleRequest {
    /// Recipient address; the bottle is mailed back to its sender.
    #[serde(default)]
    #[schema(example = "me@example.com")]
    pub email: Option<String>,
    /// Message body.
    #[serde(default)]
    #[schema(example = "Did you finish the garden?")]
    pub text: Option<String>,
    /// When to deliver, RFC 3339 or `YYYY-MM-DD[THH:MM[:SS]]` in UTC.
    #[serde(default)]
    #[schema(example = "2027-01-01T09:00:00Z")]
    pub time: Option<String>,
}

/// Confirmation link query.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConfirmQuery {
    /// Bottle id taken from the confirmation mail.
    #[serde(default)]
    pub id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_request_missing_fields() {
        let req: SubmitBottleRequest = serde_json::from_str(r#"{"email":"a@x.com"}"#).unwrap();
        assert_eq!(req.email.as_deref(), Some("a@x.com"));
        assert!(req.text.is_none());
        assert!(req.time.is_none());
    }
}
