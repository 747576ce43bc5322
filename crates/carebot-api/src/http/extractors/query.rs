//! Query parameter extractors.

use serde::Deserialize;

use crate::http::error::AppError;

/// `?limit=` on the patient history endpoint. Kept as text so a bad value
/// becomes an enveloped validation error instead of a bare rejection.
#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<String>,
}

impl HistoryQuery {
    pub fn limit(&self) -> Result<Option<u32>, AppError> {
        match self.limit.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<u32>()
                .map(Some)
                .map_err(|_| AppError::Validation(format!("Invalid limit '{raw}'"))),
        }
    }
}

/// `GET /ws?sessionId=…&patientId=…`
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WsQuery {
    pub session_id: Option<String>,
    pub patient_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_limit_parsing() {
        let q = |s: Option<&str>| HistoryQuery {
            limit: s.map(str::to_string),
        };
        assert_eq!(q(None).limit().unwrap(), None);
        assert_eq!(q(Some("")).limit().unwrap(), None);
        assert_eq!(q(Some("25")).limit().unwrap(), Some(25));
        assert!(q(Some("ten")).limit().is_err());
        assert!(q(Some("-1")).limit().is_err());
    }
}
