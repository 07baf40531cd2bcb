use axum::http::{self, Request, StatusCode};
use axum::routing::RouterIntoService;
use axum::Router;
use courier_mock::{app, OTP_CODE};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::{Service, ServiceExt};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<String> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body.to_string()).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(String::new()).unwrap()
}

type App = RouterIntoService<String>;

async fn send(app: &mut App, req: Request<String>) -> axum::response::Response {
    ServiceExt::ready(app).await.unwrap().call(req).await.unwrap()
}

/// Run the OTP + sign-in flow and return the sign-in body.
async fn signed_in(app: &mut App, phone: &str) -> Value {
    let body = format!(r#"{{"phoneNumber":"{phone}"}}"#);
    let resp = send(app, json_request("POST", "/otp", None, &body)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let otp_id = body_json(resp).await["otpId"].as_str().unwrap().to_string();

    let body = format!(
        r#"{{"verificationCode":"{OTP_CODE}","verificationId":"{otp_id}","phoneNumber":"{phone}"}}"#
    );
    let resp = send(app, json_request("POST", "/sign-in", None, &body)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await
}

fn router() -> Router {
    app()
}

// --- otp / sign-in ---

#[tokio::test]
async fn otp_requires_phone_number() {
    let resp = router()
        .oneshot(json_request("POST", "/otp", None, r#"{"phoneNumber":"  "}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["errorCode"], "INVALID_PHONE_NUMBER");
    assert_eq!(body["errorMessage"], "Phone number is required.");
}

#[tokio::test]
async fn sign_in_with_wrong_code_fails() {
    let mut app = router().into_service();
    let otp = json_request("POST", "/otp", None, r#"{"phoneNumber":"250788000001"}"#);
    let resp = send(&mut app, otp).await;
    let otp_id = body_json(resp).await["otpId"].as_str().unwrap().to_string();

    let body = format!(
        r#"{{"verificationCode":"000000","verificationId":"{otp_id}","phoneNumber":"250788000001"}}"#
    );
    let resp = send(&mut app, json_request("POST", "/sign-in", None, &body)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["errorCode"], "INVALID_OTP");
}

#[tokio::test]
async fn sign_in_returns_token_and_account() {
    let mut app = router().into_service();
    let session = signed_in(&mut app, "250788000002").await;
    assert!(session["accessToken"].as_str().is_some());
    assert!(session["userId"].as_str().is_some());
    assert_eq!(session["accounts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_sign_in_returns_422() {
    let resp = router()
        .oneshot(json_request("POST", "/sign-in", None, r#"{"phoneNumber":"1"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- bearer checks ---

#[tokio::test]
async fn packages_require_token() {
    let mut app = router().into_service();
    let session = signed_in(&mut app, "250788000003").await;
    let customer_id = session["accounts"][0]["customerId"].as_str().unwrap();

    let uri = format!("/customers/{customer_id}/packages");
    let resp = send(&mut app, get_request(&uri, None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["errorCode"], "UNAUTHORIZED");
}

#[tokio::test]
async fn packages_of_other_customer_are_forbidden() {
    let mut app = router().into_service();
    let session = signed_in(&mut app, "250788000004").await;
    let token = session["accessToken"].as_str().unwrap();

    let resp = send(&mut app, get_request("/customers/someone-else/packages", Some(token))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn packages_filter_by_status() {
    let mut app = router().into_service();
    let session = signed_in(&mut app, "250788000005").await;
    let token = session["accessToken"].as_str().unwrap();
    let customer_id = session["accounts"][0]["customerId"].as_str().unwrap();

    let uri = format!("/customers/{customer_id}/packages");
    let resp = send(&mut app, get_request(&uri, Some(token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["count"], 2);

    let uri = format!("/customers/{customer_id}/packages?status=PENDING&page=1&size=10");
    let resp = send(&mut app, get_request(&uri, Some(token))).await;
    let page = body_json(resp).await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["status"], "PENDING");
    assert!(page["next"].is_null());
}

#[tokio::test]
async fn packages_page_beyond_range_is_empty() {
    let mut app = router().into_service();
    let session = signed_in(&mut app, "250788000009").await;
    let token = session["accessToken"].as_str().unwrap();
    let customer_id = session["accounts"][0]["customerId"].as_str().unwrap();

    let uri = format!("/customers/{customer_id}/packages?page={}&size=10", usize::MAX);
    let resp = send(&mut app, get_request(&uri, Some(token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_json(resp).await;
    assert_eq!(page["count"], 2);
    assert!(page["results"].as_array().unwrap().is_empty());
    assert!(page["next"].is_null());
    assert!(page["previous"].is_string());

    let uri = format!("/customers/{customer_id}/packages?size={}", usize::MAX);
    let resp = send(&mut app, get_request(&uri, Some(token))).await;
    assert_eq!(body_json(resp).await["results"].as_array().unwrap().len(), 2);
}

// --- refresh / sign-out ---

#[tokio::test]
async fn expired_token_can_be_refreshed() {
    let mut app = router().into_service();
    let session = signed_in(&mut app, "250788000006").await;
    let old = session["accessToken"].as_str().unwrap().to_string();
    let user_id = session["userId"].as_str().unwrap().to_string();
    let customer_id = session["accounts"][0]["customerId"].as_str().unwrap().to_string();
    let packages = format!("/customers/{customer_id}/packages");

    let resp = send(&mut app, json_request("POST", "/__test/expire-tokens", None, "")).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&mut app, get_request(&packages, Some(&old))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body = format!(r#"{{"userId":"{user_id}"}}"#);
    let resp = send(&mut app, json_request("POST", "/refresh-token", None, &body)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fresh = body_json(resp).await["accessToken"].as_str().unwrap().to_string();
    assert_ne!(fresh, old);

    let resp = send(&mut app, get_request(&packages, Some(&fresh))).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_without_session_is_unauthorized() {
    let resp = router()
        .oneshot(json_request("POST", "/refresh-token", None, r#"{"userId":"nobody"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["errorCode"], "SESSION_EXPIRED");
}

#[tokio::test]
async fn sign_out_ends_session() {
    let mut app = router().into_service();
    let session = signed_in(&mut app, "250788000007").await;
    let token = session["accessToken"].as_str().unwrap().to_string();
    let user_id = session["userId"].as_str().unwrap().to_string();
    let body = format!(r#"{{"userId":"{user_id}"}}"#);

    let resp = send(&mut app, json_request("POST", "/sign-out", Some(&token), &body)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = send(&mut app, json_request("POST", "/refresh-token", None, &body)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- contacts ---

#[tokio::test]
async fn contacts_create_then_list() {
    let mut app = router().into_service();
    let session = signed_in(&mut app, "250788000008").await;
    let token = session["accessToken"].as_str().unwrap().to_string();
    let customer_id = session["accounts"][0]["customerId"].as_str().unwrap().to_string();
    let uri = format!("/customers/{customer_id}/contacts");

    let body = r#"{"phoneNumberOne":"250788111111","name":"Depot","isDefault":true}"#;
    let resp = send(&mut app, json_request("POST", &uri, Some(&token), body)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    assert_eq!(created["customerId"], customer_id.as_str());
    assert_eq!(created["name"], "Depot");

    let resp = send(&mut app, get_request(&format!("{uri}?isDefault=false"), Some(&token))).await;
    assert_eq!(body_json(resp).await["totalCount"], 0);

    let resp = send(&mut app, get_request(&uri, Some(&token))).await;
    let list = body_json(resp).await;
    assert_eq!(list["totalCount"], 1);
    assert_eq!(list["contacts"][0]["phoneNumberOne"], "250788111111");
}

// --- failures ---

#[tokio::test]
async fn fail_route_returns_500_with_detail() {
    let resp = router().oneshot(get_request("/__test/fail", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await["errorCode"], "INTERNAL_ERROR");
}
