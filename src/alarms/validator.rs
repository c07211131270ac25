//! Validation of user-submitted alarm descriptions.

use std::str::FromStr;

use alloy::{json_abi::JsonAbi, primitives::Address};
use thiserror::Error;
use url::Url;

use crate::models::{AlarmDraft, NewAlarm, NotificationTarget};

/// A description that cannot become an alarm. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid alarm: {}", problems.join("; "))]
pub struct ValidationError {
    /// Every problem found, in field order.
    pub problems: Vec<String>,
}

/// Checks a `NewAlarm` and turns it into a storable `AlarmDraft`.
///
/// All fields are checked before returning, so the error lists every problem
/// at once.
pub fn validate_new_alarm(description: NewAlarm) -> Result<AlarmDraft, ValidationError> {
    let mut problems = Vec::new();

    let address = match description.address.as_deref().map(str::trim) {
        None | Some("") => {
            problems.push("address is required".to_string());
            None
        }
        Some(raw) => match parse_address(raw) {
            Ok(address) => Some(address),
            Err(problem) => {
                problems.push(problem);
                None
            }
        },
    };

    let abi = match description.abi {
        None => {
            problems.push("abi is required".to_string());
            None
        }
        Some(raw) => match parse_abi(raw) {
            Ok(abi) => Some(abi),
            Err(problem) => {
                problems.push(problem);
                None
            }
        },
    };

    let event_names = normalize_event_names(description.event_names);
    if event_names.is_empty() {
        problems.push("at least one event name is required".to_string());
    } else if let Some(abi) = &abi {
        for name in &event_names {
            if !abi.events.contains_key(name) {
                problems.push(format!("event '{name}' is not declared in the abi"));
            }
        }
    }

    let notification_target = match parse_target(description.email, description.webhook) {
        Ok(target) => Some(target),
        Err(problem) => {
            problems.push(problem);
            None
        }
    };

    match (address, abi, notification_target) {
        (Some(address), Some(abi), Some(notification_target)) if problems.is_empty() => {
            Ok(AlarmDraft {
                address,
                abi,
                event_names,
                notification_target,
                block_confirmations: description.block_confirmations.unwrap_or_default(),
            })
        }
        _ => Err(ValidationError { problems }),
    }
}

fn parse_address(raw: &str) -> Result<Address, String> {
    if !raw.starts_with("0x") || raw.len() != 42 {
        return Err(format!("address '{raw}' must be 0x followed by 40 hex digits"));
    }
    Address::from_str(raw).map_err(|e| format!("address '{raw}' is invalid: {e}"))
}

/// Accepts the ABI either as a JSON array or as a string holding one.
fn parse_abi(raw: serde_json::Value) -> Result<JsonAbi, String> {
    let parsed = match raw {
        serde_json::Value::String(text) => serde_json::from_str::<JsonAbi>(&text),
        value @ serde_json::Value::Array(_) => serde_json::from_value::<JsonAbi>(value),
        _ => return Err("abi must be a JSON array or a string containing one".to_string()),
    };
    parsed.map_err(|e| format!("abi could not be parsed: {e}"))
}

/// Trims names, drops blanks and duplicates, keeps first-seen order.
fn normalize_event_names(names: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !normalized.iter().any(|seen| seen == name) {
            normalized.push(name.to_string());
        }
    }
    normalized
}

fn parse_target(
    email: Option<String>,
    webhook: Option<String>,
) -> Result<NotificationTarget, String> {
    let email = email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
    let webhook = webhook.map(|w| w.trim().to_string()).filter(|w| !w.is_empty());

    match (email, webhook) {
        (Some(email), None) => {
            let well_formed = match email.split_once('@') {
                Some((local, domain)) => {
                    !local.is_empty()
                        && !domain.is_empty()
                        && !domain.contains('@')
                        && !email.contains(char::is_whitespace)
                }
                None => false,
            };
            if well_formed {
                Ok(NotificationTarget::Email(email))
            } else {
                Err(format!("email '{email}' is not a valid address"))
            }
        }
        (None, Some(webhook)) => {
            let url = Url::parse(&webhook)
                .map_err(|e| format!("webhook '{webhook}' is not a valid url: {e}"))?;
            if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
                return Err(format!("webhook '{webhook}' must be an http(s) url"));
            }
            Ok(NotificationTarget::Webhook(url))
        }
        (Some(_), Some(_)) => Err("only one of email or webhook may be set".to_string()),
        (None, None) => Err("one of email or webhook is required".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_helpers::erc20_abi_json;

    fn valid_description() -> NewAlarm {
        NewAlarm {
            address: Some("0x00000000000000000000000000000000000000aa".to_string()),
            abi: Some(serde_json::from_str(erc20_abi_json()).unwrap()),
            event_names: vec!["Transfer".to_string()],
            email: Some("ops@example.com".to_string()),
            webhook: None,
            block_confirmations: None,
        }
    }

    #[test]
    fn test_valid_description_becomes_draft() {
        let draft = validate_new_alarm(valid_description()).unwrap();
        assert_eq!(draft.event_names, vec!["Transfer"]);
        assert_eq!(draft.block_confirmations, 0);
        assert_eq!(draft.notification_target, NotificationTarget::Email("ops@example.com".into()));
    }

    #[test]
    fn test_abi_given_as_string_is_accepted() {
        let description =
            NewAlarm { abi: Some(json!(erc20_abi_json())), ..valid_description() };
        let draft = validate_new_alarm(description).unwrap();
        assert!(draft.abi.events.contains_key("Approval"));
    }

    #[test]
    fn test_event_names_are_trimmed_and_deduplicated() {
        let description = NewAlarm {
            event_names: vec![
                " Transfer ".to_string(),
                "".to_string(),
                "Approval".to_string(),
                "Transfer".to_string(),
            ],
            ..valid_description()
        };
        let draft = validate_new_alarm(description).unwrap();
        assert_eq!(draft.event_names, vec!["Transfer", "Approval"]);
    }

    #[test]
    fn test_all_problems_reported_together() {
        let description = NewAlarm {
            address: Some("0x1234".to_string()),
            abi: None,
            event_names: vec![],
            email: None,
            webhook: None,
            block_confirmations: None,
        };

        let err = validate_new_alarm(description).unwrap_err();
        assert_eq!(err.problems.len(), 4, "{:?}", err.problems);
        assert!(err.to_string().starts_with("Invalid alarm: "));
    }

    #[test]
    fn test_undeclared_event_is_rejected() {
        let description =
            NewAlarm { event_names: vec!["Swap".to_string()], ..valid_description() };
        let err = validate_new_alarm(description).unwrap_err();
        assert_eq!(err.problems, vec!["event 'Swap' is not declared in the abi"]);
    }

    #[test]
    fn test_email_and_webhook_are_exclusive() {
        let description = NewAlarm {
            webhook: Some("https://hooks.example.com".to_string()),
            ..valid_description()
        };
        let err = validate_new_alarm(description).unwrap_err();
        assert_eq!(err.problems, vec!["only one of email or webhook may be set"]);
    }

    #[test]
    fn test_target_formats() {
        assert!(parse_target(Some("a@b".into()), None).is_ok());
        assert!(parse_target(Some("@b".into()), None).is_err());
        assert!(parse_target(Some("a@b@c".into()), None).is_err());
        assert!(parse_target(Some("no-at-sign".into()), None).is_err());
        assert!(parse_target(None, Some("https://hooks.example.com/x".into())).is_ok());
        assert!(parse_target(None, Some("ftp://hooks.example.com".into())).is_err());
        assert!(parse_target(None, Some("not a url".into())).is_err());
        assert!(parse_target(Some(" ".into()), None).is_err());
    }

    #[test]
    fn test_abi_of_wrong_shape_is_rejected() {
        let description = NewAlarm { abi: Some(json!({"not": "an abi"})), ..valid_description() };
        let err = validate_new_alarm(description).unwrap_err();
        assert_eq!(err.problems.len(), 1);
        assert!(err.problems[0].starts_with("abi must be"));
    }
}
