use serde::{Deserialize, Serialize};

/// Standard `{ success, data, message }` wrapper returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommunitySummary;

    #[test]
    fn acknowledgement_without_data_parses() {
        let envelope: ApiEnvelope<serde_json::Value> =
            serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(envelope.success);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn payload_without_default_parses_with_and_without_data() {
        let listed: ApiEnvelope<Vec<CommunitySummary>> =
            serde_json::from_str(r#"{"success":true,"data":[{"_id":"c1","name":"North"}]}"#)
                .unwrap();
        assert_eq!(listed.data.unwrap()[0].name, "North");

        let rejected: ApiEnvelope<CommunitySummary> =
            serde_json::from_str(r#"{"success":false,"message":"not a member"}"#).unwrap();
        assert!(!rejected.success);
        assert!(rejected.data.is_none());
        assert_eq!(rejected.message.as_deref(), Some("not a member"));
    }

    #[test]
    fn absent_fields_are_not_serialized() {
        let envelope = ApiEnvelope::<CommunitySummary> {
            success: false,
            data: None,
            message: Some("not a member".to_string()),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(json, r#"{"success":false,"message":"not a member"}"#);
    }
}
