use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use cookie::SameSite;
use http_body_util::BodyExt;
use plugwise_booking::build_app;
use plugwise_booking::infra::memory::MemoryStore;
use plugwise_booking::security::config::SecurityConfig;
use plugwise_booking::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

// ─── Test helpers ───────────────────────────────────────────────────────

const TICKET_FORM: &str = "selectedStation=MG+Road&stationId=st-1&date=2025-03-14\
    &selectedTimeSlot=9%3A00+AM&chargerType=AC&vehicleType=car&vehicleBrand=Tata\
    &vehicleModel=Nexon+EV&vehicleNumber=KA01AB1234&amount=500";

fn test_app() -> Router {
    let security = SecurityConfig {
        session_secret: "integration-test-secret-integration-test".into(),
        session_ttl_minutes: 60,
        session_cookie_name: "plugwise_session".into(),
        flash_cookie_name: "plugwise_flash".into(),
        secure_cookies: false,
        same_site: SameSite::Lax,
    };
    build_app(AppState::new(Arc::new(MemoryStore::new()), security))
}

fn form_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn api_request(method: &str, uri: &str, body: Value, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, cookie)
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// The `name=value` pair a browser would send back for cookie `name`.
fn cookie_pair(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

async fn register(app: &Router, name: &str, phone: &str) -> Result<String> {
    let body = format!("name={name}&phone={phone}&password=p&confirm_password=p");
    let response = app.clone().oneshot(form_request("/register", &body, None)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    Ok(cookie_pair(&response, "plugwise_session").expect("session cookie"))
}

async fn flash_message(app: &Router, response: &Response) -> Result<String> {
    let cookie = cookie_pair(response, "plugwise_flash").expect("flash cookie");
    let body = body_json(app.clone().oneshot(get("/flash", Some(&cookie))).await?).await;
    Ok(body["flash"]["message"].as_str().unwrap_or_default().to_string())
}

async fn profile(app: &Router, session: &str) -> Result<Value> {
    let response = app.clone().oneshot(get("/profile", Some(session))).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(body_json(response).await)
}

fn booking_payload() -> Value {
    json!({
        "stationId": "st-9",
        "stationName": "Whitefield Supercharge",
        "date": "2025-04-02",
        "timeSlot": "6:00 PM",
        "chargerType": "DC Fast",
        "plugType": "CCS2",
        "vehicleType": "car",
        "vehicleBrand": "Hyundai",
        "vehicleModel": "Kona",
        "vehicleNumber": "KA53Z0001",
        "totalAmount": 650,
        "paymentMethod": "card",
        "cardNumber": "4111 1111 1111 1234",
    })
}

// ─── Surface A: forms, redirects and flashes ───────────────────────────

#[tokio::test]
async fn test_register_book_and_cancel_scenario() -> Result<()> {
    let app = test_app();
    let session = register(&app, "A", "999").await?;

    let dup = app
        .clone()
        .oneshot(form_request(
            "/register",
            "name=B&phone=999&password=q&confirm_password=q",
            None,
        ))
        .await?;
    assert_eq!(dup.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&dup), "/register");
    assert_eq!(flash_message(&app, &dup).await?, "Phone number already registered!");

    let ticket = app
        .clone()
        .oneshot(form_request("/generate_ticket", TICKET_FORM, Some(&session)))
        .await?;
    assert_eq!(ticket.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&ticket), "/profile");

    let body = profile(&app, &session).await?;
    let booking = &body["bookings"][0];
    let booking_id = booking["booking_id"].as_str().unwrap().to_string();
    assert!(booking_id.starts_with("PLG"));
    assert!(booking_id[3..].chars().all(|c| c.is_ascii_digit()));
    assert_eq!(booking["status"], "Active");
    assert_eq!(booking["amount"], 500);
    assert_eq!(booking["booking_time"].as_str().unwrap().len(), "2025-03-14 09:00:00".len());

    let cancel_uri = format!("/cancel_booking/{booking_id}");
    let response = app
        .clone()
        .oneshot(form_request(&cancel_uri, "", Some(&session)))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Booking cancelled successfully");

    let response = app
        .clone()
        .oneshot(form_request(&cancel_uri, "", Some(&session)))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("already cancelled"));

    // Booking and the copy in the user record agree.
    let body = profile(&app, &session).await?;
    assert_eq!(body["bookings"][0]["status"], "cancelled");
    assert_eq!(body["user"]["bookings"][0]["status"], "cancelled");
    assert_eq!(body["user"]["bookings"][0]["booking_id"], booking_id.as_str());
    assert!(body["user"].get("password_hash").is_none());
    Ok(())
}

#[tokio::test]
async fn test_login_and_logout() -> Result<()> {
    let app = test_app();
    register(&app, "A", "999").await?;

    let wrong = app
        .clone()
        .oneshot(form_request("/login", "phone=999&password=nope", None))
        .await?;
    assert_eq!(location(&wrong), "/login");
    assert!(cookie_pair(&wrong, "plugwise_session").is_none());
    assert_eq!(flash_message(&app, &wrong).await?, "Invalid credentials!");

    let unknown = app
        .clone()
        .oneshot(form_request("/login", "phone=123&password=p", None))
        .await?;
    assert_eq!(flash_message(&app, &unknown).await?, "Invalid credentials!");

    let ok = app
        .clone()
        .oneshot(form_request("/login", "phone=999&password=p", None))
        .await?;
    assert_eq!(ok.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&ok), "/");
    let session = cookie_pair(&ok, "plugwise_session").expect("session cookie");
    assert_eq!(profile(&app, &session).await?["user"]["phone"], "999");

    let out = app.clone().oneshot(get("/logout", Some(&session))).await?;
    assert_eq!(location(&out), "/");
    assert_eq!(cookie_pair(&out, "plugwise_session").as_deref(), Some("plugwise_session="));
    assert_eq!(flash_message(&app, &out).await?, "You have been logged out.");
    Ok(())
}

#[tokio::test]
async fn test_session_routes_redirect_to_login() -> Result<()> {
    let app = test_app();

    let response = app.clone().oneshot(get("/profile", None)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let forged = app
        .clone()
        .oneshot(form_request(
            "/generate_ticket",
            TICKET_FORM,
            Some("plugwise_session=not.a.token"),
        ))
        .await?;
    assert_eq!(location(&forged), "/login");
    Ok(())
}

#[tokio::test]
async fn test_bad_ticket_gets_generic_flash() -> Result<()> {
    let app = test_app();
    let session = register(&app, "A", "999").await?;

    let response = app
        .clone()
        .oneshot(form_request(
            "/generate_ticket",
            "selectedStation=MG+Road&selectedTimeSlot=1%3A00+AM",
            Some(&session),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/plugwise_me");
    let message = flash_message(&app, &response).await?;
    assert!(!message.contains("is required"));
    assert!(!message.contains("1:00 AM"));

    assert_eq!(profile(&app, &session).await?["bookings"], json!([]));
    Ok(())
}

#[tokio::test]
async fn test_confirmation_books_with_payment() -> Result<()> {
    let app = test_app();
    let session = register(&app, "A", "999").await?;

    let form = "stationName=Indiranagar&date=2025-03-15&timeSlot=10%3A00+AM&chargerType=AC\
        &vehicleType=bike&vehicleBrand=Ather&vehicleModel=450X&vehicleNumber=KA03XY9876\
        &amount=300&paymentMethod=upi&upiId=a%40okbank";
    let response = app
        .clone()
        .oneshot(form_request("/confirmation", form, Some(&session)))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    let booking_id = body["booking"]["booking_id"].as_str().unwrap().to_string();
    assert!(booking_id.starts_with("BK"));
    assert_eq!(body["booking"]["payment_method"], "upi");

    let payment = body_json(
        app.clone()
            .oneshot(get(&format!("/api/bookings/{booking_id}/payment"), Some(&session)))
            .await?,
    )
    .await;
    assert_eq!(payment["payment"]["amount"], 300);
    assert_eq!(payment["payment"]["details"]["upi_id"], "a@okbank");
    Ok(())
}

#[tokio::test]
async fn test_cancel_someone_elses_booking() -> Result<()> {
    let app = test_app();
    let owner = register(&app, "A", "999").await?;
    let stranger = register(&app, "B", "888").await?;

    app.clone()
        .oneshot(form_request("/generate_ticket", TICKET_FORM, Some(&owner)))
        .await?;
    let booking_id = profile(&app, &owner).await?["bookings"][0]["booking_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(form_request(
            &format!("/cancel_booking/{booking_id}"),
            "",
            Some(&stranger),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["message"], "Unauthorized to cancel this booking");
    assert_eq!(profile(&app, &owner).await?["bookings"][0]["status"], "Active");
    Ok(())
}

#[tokio::test]
async fn test_redirect_targets_resolve() -> Result<()> {
    let app = test_app();

    let home = app.clone().oneshot(get("/", None)).await?;
    assert_eq!(home.status(), StatusCode::OK);
    assert_eq!(body_json(home).await["page"], "home");

    let session = register(&app, "A", "999").await?;

    // Failed registration lands on /register with its flash still readable.
    let dup = app
        .clone()
        .oneshot(form_request(
            "/register",
            "name=B&phone=999&password=q&confirm_password=q",
            None,
        ))
        .await?;
    let flash = cookie_pair(&dup, "plugwise_flash").expect("flash cookie");
    let page = app.clone().oneshot(get(location(&dup), Some(&flash))).await?;
    assert_eq!(page.status(), StatusCode::OK);
    let body = body_json(page).await;
    assert_eq!(body["page"], "register");
    assert_eq!(body["flash"]["message"], "Phone number already registered!");

    let wrong = app
        .clone()
        .oneshot(form_request("/login", "phone=999&password=nope", None))
        .await?;
    let page = app.clone().oneshot(get(location(&wrong), None)).await?;
    assert_eq!(page.status(), StatusCode::OK);
    assert_eq!(body_json(page).await["page"], "login");

    let bad_ticket = app
        .clone()
        .oneshot(form_request("/generate_ticket", "selectedStation=MG+Road", Some(&session)))
        .await?;
    assert_eq!(location(&bad_ticket), "/plugwise_me");
    let page = app.clone().oneshot(get("/plugwise_me", Some(&session))).await?;
    assert_eq!(page.status(), StatusCode::OK);
    let body = body_json(page).await;
    assert_eq!(body["user_name"], "A");
    assert!(body["station_info"].is_null());

    let page = app
        .clone()
        .oneshot(get(
            "/plugwise_me?station_id=st-1&name=MG+Road&address=Bengaluru&type=AC&power=22kW&price=12",
            Some(&session),
        ))
        .await?;
    let body = body_json(page).await;
    assert_eq!(body["station_info"]["id"], "st-1");
    assert_eq!(body["station_info"]["name"], "MG Road");
    assert_eq!(body["station_info"]["type"], "AC");
    assert_eq!(body["station_info"]["price"], "12");

    let anonymous = app.clone().oneshot(get("/plugwise_me", None)).await?;
    assert_eq!(location(&anonymous), "/login");
    Ok(())
}

// ─── Surface B: JSON API ────────────────────────────────────────────────

#[tokio::test]
async fn test_api_requires_session() -> Result<()> {
    let app = test_app();
    let response = app
        .clone()
        .oneshot(get("/api/bookings/PLG1", None))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Login required");
    Ok(())
}

#[tokio::test]
async fn test_api_booking_roundtrip() -> Result<()> {
    let app = test_app();
    let session = register(&app, "A", "999").await?;
    let user_id = profile(&app, &session).await?["user"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(api_request("POST", "/api/bookings", booking_payload(), &session))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Booking and payment information stored successfully");
    let booking_id = body["booking_id"].as_str().unwrap().to_string();
    assert!(booking_id.starts_with("PLG"));

    let body = body_json(
        app.clone()
            .oneshot(get(&format!("/api/bookings/{booking_id}"), Some(&session)))
            .await?,
    )
    .await;
    assert_eq!(body["booking"]["station_name"], "Whitefield Supercharge");
    assert_eq!(body["booking"]["date"], "2025-04-02");
    assert_eq!(body["booking"]["amount"], 650);
    assert_eq!(body["booking"]["status"], "Active");

    let body = body_json(
        app.clone()
            .oneshot(get(&format!("/api/bookings/user/{user_id}"), Some(&session)))
            .await?,
    )
    .await;
    assert_eq!(body["bookings"].as_array().unwrap().len(), 1);

    let payment = body_json(
        app.clone()
            .oneshot(get(&format!("/api/bookings/{booking_id}/payment"), Some(&session)))
            .await?,
    )
    .await;
    assert_eq!(payment["payment"]["payment_status"], "completed");
    assert_eq!(payment["payment"]["details"]["last4"], "1234");
    assert!(!payment["payment"]["details"].to_string().contains("4111"));

    let again = app
        .clone()
        .oneshot(api_request(
            "POST",
            &format!("/api/bookings/{booking_id}/payment"),
            json!({ "paymentMethod": "upi", "upiId": "a@okbank" }),
            &session,
        ))
        .await?;
    assert_eq!(again.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn test_api_hides_other_users_data() -> Result<()> {
    let app = test_app();
    let owner = register(&app, "A", "999").await?;
    let stranger = register(&app, "B", "888").await?;
    let owner_id = profile(&app, &owner).await?["user"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let body = body_json(
        app.clone()
            .oneshot(api_request("POST", "/api/bookings", booking_payload(), &owner))
            .await?,
    )
    .await;
    let booking_id = body["booking_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/bookings/{booking_id}"), Some(&stranger)))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Booking not found");

    let response = app
        .clone()
        .oneshot(get(&format!("/api/bookings/user/{owner_id}"), Some(&stranger)))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut payload = booking_payload();
    payload["userId"] = json!(owner_id);
    let response = app
        .clone()
        .oneshot(api_request("POST", "/api/bookings", payload, &stranger))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_api_stranger_cannot_pay_or_read_payment() -> Result<()> {
    let app = test_app();
    let owner = register(&app, "A", "999").await?;
    let stranger = register(&app, "B", "888").await?;

    let mut payload = booking_payload();
    payload.as_object_mut().unwrap().remove("cardNumber");
    payload["paymentMethod"] = json!("upi");
    payload["upiId"] = json!("a@okbank");
    let body = body_json(
        app.clone()
            .oneshot(api_request("POST", "/api/bookings", payload, &owner))
            .await?,
    )
    .await;
    let booking_id = body["booking_id"].as_str().unwrap().to_string();
    let payment_uri = format!("/api/bookings/{booking_id}/payment");

    for body in [
        json!({ "paymentMethod": "upi", "upiId": "b@okbank", "amount": 1 }),
        json!({ "paymentMethod": "upi", "upiId": "b@okbank" }),
    ] {
        let response = app
            .clone()
            .oneshot(api_request("POST", &payment_uri, body, &stranger))
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "Booking not found");
    }

    let response = app.clone().oneshot(get(&payment_uri, Some(&stranger))).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Booking not found");

    // The owner's record is untouched.
    let payment = body_json(app.clone().oneshot(get(&payment_uri, Some(&owner))).await?).await;
    assert_eq!(payment["payment"]["details"]["upi_id"], "a@okbank");
    Ok(())
}

#[tokio::test]
async fn test_api_validation_errors() -> Result<()> {
    let app = test_app();
    let session = register(&app, "A", "999").await?;

    let mut payload = booking_payload();
    payload["timeSlot"] = json!("3:00 AM");
    let response = app
        .clone()
        .oneshot(api_request("POST", "/api/bookings", payload, &session))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);

    let mut payload = booking_payload();
    payload["upiId"] = json!("a@okbank");
    let response = app
        .clone()
        .oneshot(api_request("POST", "/api/bookings", payload, &session))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_api_malformed_bodies_get_json_400() -> Result<()> {
    let app = test_app();
    let session = register(&app, "A", "999").await?;

    let mut mistyped = booking_payload();
    mistyped["totalAmount"] = json!("500");
    let mut bad_user = booking_payload();
    bad_user["userId"] = json!("not-a-uuid");
    for payload in [mistyped, bad_user] {
        let response = app
            .clone()
            .oneshot(api_request("POST", "/api/bookings", payload, &session))
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }

    let garbled = Request::builder()
        .method("POST")
        .uri("/api/bookings/PLG1/payment")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &session)
        .body(Body::from("{\"paymentMethod\": "))
        .unwrap();
    let response = app.clone().oneshot(garbled).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);

    let untyped = Request::builder()
        .method("POST")
        .uri("/api/bookings")
        .header(header::COOKIE, &session)
        .body(Body::from(booking_payload().to_string()))
        .unwrap();
    let response = app.clone().oneshot(untyped).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);

    assert_eq!(profile(&app, &session).await?["bookings"], json!([]));
    Ok(())
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let response = test_app().oneshot(get("/health", None)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
