// libs/availability-cell/tests/client_test.rs
// Data client against a mocked scheduling API.

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use availability_cell::models::*;
use availability_cell::services::AvailabilityClient;
use availability_cell::AvailabilityError;
use shared_api::ApiError;
use shared_utils::test_utils::{test_session, MockApiResponses, TestConfig, TEST_ACCESS_TOKEN};

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn client_for(mock_server: &MockServer) -> AvailabilityClient {
    let config = TestConfig::for_server(&mock_server.uri()).to_app_config();
    AvailabilityClient::new(&config, test_session())
}

#[tokio::test]
async fn test_get_mine_sends_filters_and_token() {
    let mock_server = MockServer::start().await;
    let practitioner = Uuid::new_v4();
    let rule_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/api/availability/"))
        .and(header("Authorization", format!("Bearer {}", TEST_ACCESS_TOKEN).as_str()))
        .and(query_param("recurrence_type", "weekly"))
        .and(query_param("is_available", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockApiResponses::weekly_rule(rule_id, practitioner, 1, "09:00:00", "17:00:00")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let filters = AvailabilityFilters {
        recurrence_type: Some(RecurrenceKind::Weekly),
        day_of_week: None,
        is_available: Some(true),
    };
    let rules = client_for(&mock_server).get_mine(Some(&filters)).await.unwrap();

    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].id, rule_id);
    assert_eq!(rules[0].recurrence, Recurrence::Weekly(DayOfWeek::TUESDAY));
}

#[tokio::test]
async fn test_create_then_list_includes_new_rule() {
    let mock_server = MockServer::start().await;
    let practitioner = Uuid::new_v4();
    let rule_id = Uuid::new_v4();
    let created = MockApiResponses::weekly_rule(rule_id, practitioner, 0, "09:00:00", "12:00:00");

    Mock::given(method("POST"))
        .and(path("/api/availability/"))
        .and(body_json(json!({
            "recurrence_type": "weekly",
            "day_of_week": 0,
            "specific_date": null,
            "start_time": "09:00:00",
            "end_time": "12:00:00",
            "is_available": true,
            "notes": null
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(created.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/availability/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([created])))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let new_rule =
        NewAvailabilityRule::new(Recurrence::Weekly(DayOfWeek::MONDAY), time(9, 0), time(12, 0), true, None).unwrap();

    let saved = client.create(&new_rule).await.unwrap();
    assert_eq!(saved.id, rule_id);

    let rules = client.get_mine(None).await.unwrap();
    let listed = rules.iter().find(|rule| rule.id == saved.id).expect("created rule is listed");
    assert_eq!(listed.recurrence, Recurrence::Weekly(DayOfWeek::MONDAY));
    assert_eq!(listed.start_time, time(9, 0));
    assert_eq!(listed.end_time, time(12, 0));
    assert!(listed.is_available);
}

#[tokio::test]
async fn test_delete_then_get_one_is_not_found() {
    let mock_server = MockServer::start().await;
    let rule_id = Uuid::new_v4();
    let rule_path = format!("/api/availability/{}/", rule_id);

    Mock::given(method("DELETE"))
        .and(path(rule_path.as_str()))
        .respond_with(ResponseTemplate::new(204))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(rule_path.as_str()))
        .respond_with(ResponseTemplate::new(404).set_body_json(MockApiResponses::not_found()))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(rule_path.as_str()))
        .respond_with(ResponseTemplate::new(404).set_body_json(MockApiResponses::not_found()))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.delete(rule_id).await.unwrap();

    let err = client.get_one(rule_id).await.unwrap_err();
    assert!(err.is_not_found());

    let err = client.delete(rule_id).await.unwrap_err();
    assert_matches!(err, AvailabilityError::Api(ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_empty_slot_range_is_not_an_error() {
    let mock_server = MockServer::start().await;
    let practitioner = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/api/practitioners/{}/available-slots/", practitioner).as_str()))
        .and(query_param("start_date", "2024-01-01"))
        .and(query_param("end_date", "2024-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let slots = client_for(&mock_server)
        .get_practitioner_slots(practitioner, date(2024, 1, 1), date(2024, 1, 1))
        .await
        .unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn test_repeated_slot_reads_are_identical() {
    let mock_server = MockServer::start().await;
    let practitioner = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/api/practitioners/{}/available-slots/", practitioner).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockApiResponses::slot("2024-03-04", "09:00:00", "09:30:00"),
            MockApiResponses::slot("2024-03-04", "09:30", "10:00"),
        ])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let first = client
        .get_practitioner_slots(practitioner, date(2024, 3, 1), date(2024, 3, 31))
        .await
        .unwrap();
    let second = client
        .get_practitioner_slots(practitioner, date(2024, 3, 1), date(2024, 3, 31))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first[1].start_time, time(9, 30));
}

#[tokio::test]
async fn test_bulk_create_fans_out_per_weekday() {
    let mock_server = MockServer::start().await;
    let practitioner = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/api/availability/bulk-create/"))
        .and(body_partial_json(json!({
            "practitioner": practitioner,
            "days_of_week": [0, 2, 4],
            "start_time": "09:00:00",
            "end_time": "17:00:00"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "slots": ([0, 2, 4].iter().map(|day| {
                MockApiResponses::weekly_rule(Uuid::new_v4(), practitioner, *day, "09:00:00", "17:00:00")
            }).collect::<Vec<_>>())
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = BulkAvailabilityRequest {
        practitioner,
        days_of_week: [DayOfWeek::MONDAY, DayOfWeek::WEDNESDAY, DayOfWeek::FRIDAY].into_iter().collect(),
        start_time: time(9, 0),
        end_time: time(17, 0),
        is_available: true,
        notes: None,
    };
    let created = client_for(&mock_server).bulk_create(&request).await.unwrap();

    assert_eq!(created.len(), 3);
    let days: Vec<_> = created.iter().filter_map(|rule| rule.recurrence.day_of_week()).collect();
    assert_eq!(days, vec![DayOfWeek::MONDAY, DayOfWeek::WEDNESDAY, DayOfWeek::FRIDAY]);
    assert!(created.iter().all(|rule| rule.start_time == time(9, 0) && rule.end_time == time(17, 0)));
}

#[tokio::test]
async fn test_bulk_create_accepts_partial_response() {
    let mock_server = MockServer::start().await;
    let practitioner = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/api/availability/bulk-create/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "slots": [MockApiResponses::weekly_rule(Uuid::new_v4(), practitioner, 0, "09:00:00", "10:00:00")]
        })))
        .mount(&mock_server)
        .await;

    let request = BulkAvailabilityRequest {
        practitioner,
        days_of_week: [DayOfWeek::MONDAY, DayOfWeek::TUESDAY].into_iter().collect(),
        start_time: time(9, 0),
        end_time: time(10, 0),
        is_available: true,
        notes: None,
    };
    let created = client_for(&mock_server).bulk_create(&request).await.unwrap();
    assert_eq!(created.len(), 1);
}

#[tokio::test]
async fn test_update_puts_to_rule_path() {
    let mock_server = MockServer::start().await;
    let practitioner = Uuid::new_v4();
    let rule_id = Uuid::new_v4();

    Mock::given(method("PUT"))
        .and(path(format!("/api/availability/{}/", rule_id).as_str()))
        .and(body_json(json!({ "end_time": "18:00:00" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::weekly_rule(
            rule_id,
            practitioner,
            3,
            "09:00:00",
            "18:00:00",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let update = AvailabilityUpdate {
        end_time: Some(time(18, 0)),
        ..Default::default()
    };
    let updated = client_for(&mock_server).update(rule_id, &update).await.unwrap();
    assert_eq!(updated.end_time, time(18, 0));
}

#[tokio::test]
async fn test_create_validation_error_carries_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/availability/"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(MockApiResponses::field_error("start_time", "Overlaps an existing rule.")),
        )
        .mount(&mock_server)
        .await;

    let new_rule = NewAvailabilityRule::new(
        Recurrence::OneTime(date(2024, 4, 2)),
        time(9, 0),
        time(10, 0),
        true,
        None,
    )
    .unwrap();
    let err = client_for(&mock_server).create(&new_rule).await.unwrap_err();

    assert_matches!(
        err,
        AvailabilityError::Api(ApiError::Validation { ref fields, .. })
            if fields["start_time"] == vec!["Overlaps an existing rule.".to_string()]
    );
}

#[tokio::test]
async fn test_unauthorized_is_auth_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/availability/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Invalid token." })))
        .mount(&mock_server)
        .await;

    let err = client_for(&mock_server).get_mine(None).await.unwrap_err();
    assert_matches!(err, AvailabilityError::Api(ApiError::Auth(_)));
}

#[tokio::test]
async fn test_transport_failure_is_network_error() {
    let config = TestConfig::for_server("http://127.0.0.1:9").to_app_config();
    let client = AvailabilityClient::new(&config, test_session());

    let err = client
        .get_practitioner_slots(Uuid::new_v4(), date(2024, 1, 1), date(2024, 1, 31))
        .await
        .unwrap_err();
    assert_matches!(err, AvailabilityError::Api(ApiError::Network(_)));
}

#[tokio::test]
async fn test_check_slot_posts_date_and_time() {
    let mock_server = MockServer::start().await;
    let practitioner = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/api/availability/check-slot/"))
        .and(body_json(json!({
            "practitioner": practitioner,
            "date": "2024-05-06",
            "time": "14:30:00"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "available": false,
            "reason": "Already booked"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let check = client_for(&mock_server)
        .check_slot(practitioner, date(2024, 5, 6), time(14, 30))
        .await
        .unwrap();
    assert_eq!(check, SlotCheck::unavailable("Already booked"));
}

#[tokio::test]
async fn test_public_practitioner_availability() {
    let mock_server = MockServer::start().await;
    let practitioner = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/api/practitioners/{}/availability/", practitioner).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockApiResponses::dated_rule(Uuid::new_v4(), practitioner, "unavailable", "2024-12-25", "00:00:00", "23:59:00")
        ])))
        .mount(&mock_server)
        .await;

    let rules = client_for(&mock_server)
        .get_practitioner_availability(practitioner)
        .await
        .unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].recurrence, Recurrence::Unavailable(date(2024, 12, 25)));
    assert!(!rules[0].is_available);
}

#[tokio::test]
async fn test_missing_profile_is_none() {
    let mock_server = MockServer::start().await;
    let practitioner = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/api/practitioners/me/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(MockApiResponses::not_found()))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/practitioners/me/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::practitioner_profile(practitioner)))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert_eq!(client.get_my_profile().await.unwrap(), None);
    assert_eq!(client.get_my_profile().await.unwrap().map(|p| p.id), Some(practitioner));
}

#[tokio::test]
async fn test_token_changes_apply_to_next_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/availability/"))
        .and(header("Authorization", "Bearer rotated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = test_session();
    let config = TestConfig::for_server(&mock_server.uri()).to_app_config();
    let client = AvailabilityClient::new(&config, session.clone());
    session.sign_in("rotated");

    assert!(client.get_mine(None).await.unwrap().is_empty());
}
