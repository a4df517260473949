//! Owner-supplied certification payloads

use bson::{oid::ObjectId, DateTime};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::db::schemas::{CertificationDoc, CertificationStatus};
use crate::types::{ProfileError, Result};

/// Keys only moderation may write
const MODERATION_KEYS: &[&str] = &["status", "isVerified", "is_verified"];

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp
pub fn parse_date(field: &str, raw: &str) -> Result<DateTime> {
    let raw = raw.trim();

    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(DateTime::from_chrono(ts.with_timezone(&Utc)));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| DateTime::from_chrono(midnight.and_utc()))
        .ok_or_else(|| {
            ProfileError::Validation(format!("{} must be a date (YYYY-MM-DD)", field))
        })
}

fn check_range(start: Option<DateTime>, end: Option<DateTime>) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ProfileError::Validation(
                "endDate cannot be before startDate".into(),
            ));
        }
    }
    Ok(())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Body of a certification submission
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCertification {
    pub title: Option<String>,
    pub institute: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
    pub file: Option<String>,
}

impl NewCertification {
    /// Validate and build a pending, unverified certification
    pub fn into_doc(self) -> Result<CertificationDoc> {
        let required = [
            ("title", present(&self.title)),
            ("institute", present(&self.institute)),
            ("startDate", present(&self.start_date)),
            ("endDate", present(&self.end_date)),
            ("description", present(&self.description)),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ProfileError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let start = parse_date("startDate", present(&self.start_date).unwrap_or_default())?;
        let end = parse_date("endDate", present(&self.end_date).unwrap_or_default())?;
        check_range(Some(start), Some(end))?;

        Ok(CertificationDoc {
            id: ObjectId::new(),
            title: present(&self.title).unwrap_or_default().to_string(),
            institute: present(&self.institute).unwrap_or_default().to_string(),
            start_date: Some(start),
            end_date: Some(end),
            description: present(&self.description).unwrap_or_default().to_string(),
            file: present(&self.file).map(str::to_string),
            status: CertificationStatus::Pending,
            is_verified: false,
        })
    }
}

/// Body of an owner edit. Blank or absent fields are left unchanged.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationEdit {
    pub title: Option<String>,
    pub institute: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
    pub file: Option<String>,
}

impl CertificationEdit {
    /// Parse an edit body, refusing any attempt to set moderation fields
    pub fn from_json(body: Value) -> Result<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| ProfileError::BadRequest("Expected a JSON object".into()))?;

        if let Some(key) = MODERATION_KEYS.iter().find(|k| object.contains_key(**k)) {
            return Err(ProfileError::Validation(format!(
                "{} can only be changed by an administrator",
                key
            )));
        }

        Ok(serde_json::from_value(body)?)
    }

    pub fn is_empty(&self) -> bool {
        [
            &self.title,
            &self.institute,
            &self.start_date,
            &self.end_date,
            &self.description,
            &self.file,
        ]
        .iter()
        .all(|v| present(v).is_none())
    }

    /// Apply to `cert`; returns whether anything changed
    pub fn apply(&self, cert: &mut CertificationDoc) -> Result<bool> {
        let start = match present(&self.start_date) {
            Some(raw) => Some(parse_date("startDate", raw)?),
            None => cert.start_date,
        };
        let end = match present(&self.end_date) {
            Some(raw) => Some(parse_date("endDate", raw)?),
            None => cert.end_date,
        };
        check_range(start, end)?;

        let before = cert.clone();

        if let Some(title) = present(&self.title) {
            cert.title = title.to_string();
        }
        if let Some(institute) = present(&self.institute) {
            cert.institute = institute.to_string();
        }
        if let Some(description) = present(&self.description) {
            cert.description = description.to_string();
        }
        if let Some(file) = present(&self.file) {
            cert.file = Some(file.to_string());
        }
        cert.start_date = start;
        cert.end_date = end;

        Ok(*cert != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full() -> NewCertification {
        NewCertification {
            title: Some("Rust Fundamentals".into()),
            institute: Some("Ferris Institute".into()),
            start_date: Some("2024-01-10".into()),
            end_date: Some("2024-03-01".into()),
            description: Some("Ownership and borrowing".into()),
            file: None,
        }
    }

    #[test]
    fn test_submission_starts_pending() {
        let cert = full().into_doc().unwrap();
        assert_eq!(cert.status, CertificationStatus::Pending);
        assert!(!cert.is_verified);
        assert_eq!(cert.title, "Rust Fundamentals");
        assert!(cert.start_date.unwrap() < cert.end_date.unwrap());
    }

    #[test]
    fn test_missing_fields_listed() {
        let mut input = full();
        input.institute = None;
        input.description = Some("   ".into());

        match input.into_doc() {
            Err(ProfileError::Validation(msg)) => {
                assert!(msg.contains("institute"));
                assert!(msg.contains("description"));
                assert!(!msg.contains("title"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_dates_rejected() {
        let mut input = full();
        input.start_date = Some("last spring".into());
        assert!(matches!(input.into_doc(), Err(ProfileError::Validation(_))));

        let mut reversed = full();
        reversed.start_date = Some("2024-05-01".into());
        assert!(matches!(reversed.into_doc(), Err(ProfileError::Validation(_))));
    }

    #[test]
    fn test_rfc3339_accepted() {
        let dt = parse_date("startDate", "2024-01-10T12:30:00Z").unwrap();
        let day = parse_date("startDate", "2024-01-10").unwrap();
        assert!(dt > day);
    }

    #[test]
    fn test_edit_refuses_moderation_fields() {
        for body in [
            json!({ "title": "x", "status": "approved" }),
            json!({ "isVerified": true }),
        ] {
            let err = CertificationEdit::from_json(body).unwrap_err();
            assert!(matches!(err, ProfileError::Validation(_)));
        }
    }

    #[test]
    fn test_edit_blank_fields_unchanged() {
        let mut cert = full().into_doc().unwrap();
        let edit = CertificationEdit::from_json(json!({ "title": "", "institute": "Crab College" }))
            .unwrap();

        assert!(edit.apply(&mut cert).unwrap());
        assert_eq!(cert.title, "Rust Fundamentals");
        assert_eq!(cert.institute, "Crab College");
    }

    #[test]
    fn test_edit_range_checked_against_stored_dates() {
        let mut cert = full().into_doc().unwrap();
        let edit = CertificationEdit::from_json(json!({ "endDate": "2023-12-31" })).unwrap();
        assert!(matches!(edit.apply(&mut cert), Err(ProfileError::Validation(_))));
    }

    #[test]
    fn test_empty_edit_detected() {
        let edit = CertificationEdit::from_json(json!({ "title": "  " })).unwrap();
        assert!(edit.is_empty());
    }
}
