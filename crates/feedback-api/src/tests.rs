//! Router tests against an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use feedback_core::{
  prize::PrizeCatalog,
  survey::{
    DiscoveryChannel, FoodQuality, PrepSpeed, Respondent, ServiceQuality,
    SurveyAnswers, SurveyRecord,
  },
};
use feedback_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::api_router;

async fn router() -> Router {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  api_router(Arc::new(store), PrizeCatalog::default())
}

async fn send(
  app: &Router,
  method: &str,
  uri: &str,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let json = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
  };
  (status, json)
}

fn survey_body(name: &str, phone: &str) -> Value {
  let who = Respondent::new(name, phone);
  let answers = SurveyAnswers {
    discovery_channel: DiscoveryChannel::Influencer,
    influencer_name:   Some("@chef".into()),
    overall_rating:    5,
    service:           ServiceQuality::Excellent,
    speed:             PrepSpeed::AsExpected,
    food:              FoodQuality::Perfect,
    food_improvement:  None,
    suggestion:        None,
  };
  let record = SurveyRecord::new(who.key(), &who, &answers);
  serde_json::to_value(record).unwrap()
}

const KEY: &str = "11999990000";

// ─── Paths ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_collection_is_404() {
  let app = router().await;
  let (status, body) = send(&app, "GET", "/documents/users/1", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].is_string());

  let (status, _) = send(&app, "GET", "/documents/users", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_normalized_key_is_400() {
  let app = router().await;
  let (status, _) =
    send(&app, "GET", "/documents/prize_claims/(11)99999-0000", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_document_is_404() {
  let app = router().await;
  let uri = format!("/documents/survey_responses/{KEY}");
  let (status, _) = send(&app, "GET", &uri, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Survey responses ────────────────────────────────────────────────────────

#[tokio::test]
async fn survey_put_stores_and_reads_back() {
  let app = router().await;
  let uri = format!("/documents/survey_responses/{KEY}");

  let (status, doc) =
    send(&app, "PUT", &uri, Some(survey_body("Ana", "(11) 99999-0000"))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(doc["key"], KEY);
  assert_eq!(doc["fields"]["name"], "Ana");
  assert!(doc["fields"].get("createdAt").is_none());

  let (status, doc) = send(&app, "GET", &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(doc["fields"]["influencerName"], "@chef");
}

#[tokio::test]
async fn survey_for_another_key_is_rejected() {
  let app = router().await;
  let uri = "/documents/survey_responses/21988887777";
  let (status, _) =
    send(&app, "PUT", uri, Some(survey_body("Ana", "11999990000"))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_survey_is_rejected() {
  let app = router().await;
  let uri = format!("/documents/survey_responses/{KEY}");
  let mut body = survey_body("Ana", KEY);
  body["overallRating"] = json!(9);
  let (status, err) = send(&app, "PUT", &uri, Some(body)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(err["error"].as_str().unwrap().contains("overallRating"));

  let (status, _) = send(&app, "PUT", &uri, Some(json!({ "name": "Ana" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn survey_post_and_patch_are_not_allowed() {
  let app = router().await;
  let uri = format!("/documents/survey_responses/{KEY}");
  for method in ["POST", "PATCH"] {
    let (status, _) = send(&app, method, &uri, Some(survey_body("Ana", KEY))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method}");
  }
}

// ─── Prize claims ────────────────────────────────────────────────────────────

#[tokio::test]
async fn claim_then_duplicate_is_409() {
  let app = router().await;
  let uri = format!("/documents/prize_claims/{KEY}");

  let (status, doc) = send(&app, "POST", &uri, Some(json!({ "uid": KEY }))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(doc["fields"], json!({ "uid": KEY }));

  let (status, _) = send(&app, "POST", &uri, Some(json!({ "uid": KEY }))).await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn claim_body_must_be_only_the_matching_uid() {
  let app = router().await;
  let uri = format!("/documents/prize_claims/{KEY}");
  for body in [
    json!({ "uid": "21988887777" }),
    json!({ "uid": KEY, "prize": "Coca lata" }),
    json!({}),
  ] {
    let (status, _) = send(&app, "POST", &uri, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }
}

#[tokio::test]
async fn prize_patch_is_idempotent_and_first_prize_sticks() {
  let app = router().await;
  let uri = format!("/documents/prize_claims/{KEY}");
  send(&app, "POST", &uri, Some(json!({ "uid": KEY }))).await;

  let prize = json!({ "prize": "Batata 100g" });
  let (status, first) = send(&app, "PATCH", &uri, Some(prize.clone())).await;
  assert_eq!(status, StatusCode::OK);
  let (status, second) = send(&app, "PATCH", &uri, Some(prize)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(first["fields"], second["fields"]);
  assert_eq!(second["fields"], json!({ "uid": KEY, "prize": "Batata 100g" }));

  let (status, _) =
    send(&app, "PATCH", &uri, Some(json!({ "prize": "Coca lata" }))).await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn prize_patch_rules() {
  let app = router().await;
  let uri = format!("/documents/prize_claims/{KEY}");

  let (status, _) =
    send(&app, "PATCH", &uri, Some(json!({ "prize": "Coca lata" }))).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  send(&app, "POST", &uri, Some(json!({ "uid": KEY }))).await;
  let (status, _) = send(&app, "PATCH", &uri, Some(json!({ "prize": "Pizza" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  let (status, _) = send(
    &app,
    "PATCH",
    &uri,
    Some(json!({ "prize": "Coca lata", "uid": "1" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = send(&app, "PUT", &uri, Some(json!({ "uid": KEY }))).await;
  assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

// ─── Metrics and catalog ─────────────────────────────────────────────────────

#[tokio::test]
async fn metrics_aggregate_stored_surveys() {
  let app = router().await;
  for (name, phone) in [("Ana", "11999990000"), ("Bia", "21988887777")] {
    let key: String = phone.chars().filter(char::is_ascii_digit).collect();
    let uri = format!("/documents/survey_responses/{key}");
    let (status, _) = send(&app, "PUT", &uri, Some(survey_body(name, phone))).await;
    assert_eq!(status, StatusCode::OK);
  }

  let (status, m) = send(&app, "GET", "/metrics", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(m["total_responses"], 2);
  assert_eq!(m["average_rating"], 5.0);
  assert_eq!(m["discovery"], json!([{ "name": "Influencer", "value": 2 }]));

  let (status, list) = send(&app, "GET", "/documents/survey_responses", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(list.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn prizes_lists_the_catalog() {
  let app = router().await;
  let (status, body) = send(&app, "GET", "/prizes", None).await;
  assert_eq!(status, StatusCode::OK);
  let catalog: PrizeCatalog = serde_json::from_value(body).unwrap();
  assert_eq!(catalog, PrizeCatalog::default());
}
