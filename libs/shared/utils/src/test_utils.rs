use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::Session;

pub const TEST_ACCESS_TOKEN: &str = "test-access-token";

pub struct TestConfig {
    pub api_base_url: String,
    pub api_prefix: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            api_prefix: "/api".to_string(),
        }
    }
}

impl TestConfig {
    /// Point at a mock server, e.g. `MockServer::uri()`.
    pub fn for_server(uri: &str) -> Self {
        Self {
            api_base_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            api_base_url: self.api_base_url.clone(),
            api_prefix: self.api_prefix.clone(),
            port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub fn test_session() -> Arc<Session> {
    Arc::new(Session::with_token(TEST_ACCESS_TOKEN))
}

pub struct MockApiResponses;

impl MockApiResponses {
    pub fn weekly_rule(id: Uuid, practitioner: Uuid, day_of_week: u8, start: &str, end: &str) -> Value {
        json!({
            "id": id,
            "practitioner": practitioner,
            "recurrence_type": "weekly",
            "day_of_week": day_of_week,
            "specific_date": null,
            "start_time": start,
            "end_time": end,
            "is_available": true,
            "notes": null
        })
    }

    pub fn dated_rule(id: Uuid, practitioner: Uuid, kind: &str, date: &str, start: &str, end: &str) -> Value {
        json!({
            "id": id,
            "practitioner": practitioner,
            "recurrence_type": kind,
            "day_of_week": null,
            "specific_date": date,
            "start_time": start,
            "end_time": end,
            "is_available": kind != "unavailable",
            "notes": null
        })
    }

    pub fn slot(date: &str, start: &str, end: &str) -> Value {
        json!({
            "date": date,
            "start_time": start,
            "end_time": end
        })
    }

    pub fn practitioner_profile(id: Uuid) -> Value {
        json!({
            "id": id,
            "full_name": "Dr. Test Practitioner",
            "specialty": "Physiotherapy",
            "is_verified": true
        })
    }

    pub fn not_found() -> Value {
        json!({ "detail": "Not found." })
    }

    pub fn field_error(field: &str, message: &str) -> Value {
        let mut body = serde_json::Map::new();
        body.insert(field.to_string(), json!([message]));
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_models::auth::TokenProvider;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default().to_app_config();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.api_root(), "http://localhost:8000/api");
        assert!(config.is_configured());
    }

    #[test]
    fn test_session_carries_token() {
        assert_eq!(test_session().access_token().as_deref(), Some(TEST_ACCESS_TOKEN));
    }

    #[test]
    fn test_field_error_shape() {
        assert_eq!(
            MockApiResponses::field_error("end_time", "Too early"),
            json!({ "end_time": ["Too early"] })
        );
    }
}
