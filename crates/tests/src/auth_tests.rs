use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn register_creates_user_and_returns_token() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&serde_json::json!({
            "email": "Alice@Test.com",
            "name": "Alice",
            "password": "Password123!",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 201);

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["success"], true);
    assert!(json["accessToken"].is_string());
    assert_eq!(json["expiresIn"], 7 * 24 * 3600);
    assert_eq!(json["user"]["email"], "alice@test.com");
    assert_eq!(json["user"]["name"], "Alice");
}

#[tokio::test]
async fn register_without_name_uses_email_local_part() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&serde_json::json!({
            "email": "carol@test.com",
            "password": "Password123!",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["user"]["name"], "carol");
}

#[tokio::test]
async fn register_duplicate_email_conflicts() {
    let app = TestApp::spawn().await;
    app.register_user("dup@test.com", "Dup", "Password123!")
        .await;

    let resp = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&serde_json::json!({
            "email": "DUP@test.com",
            "name": "Dup Again",
            "password": "Password123!",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 409);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["msg"], "User with this email already exists");
}

#[tokio::test]
async fn register_missing_password_is_rejected() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&serde_json::json!({ "email": "nopass@test.com" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn login_with_valid_credentials() {
    let app = TestApp::spawn().await;
    let registered = app
        .register_user("bob@test.com", "Bob", "Password123!")
        .await;

    let user = app.login_user("bob@test.com", "Password123!").await;
    assert_eq!(user.id, registered.id);
    assert_eq!(user.email, "bob@test.com");
    assert!(!user.access_token.is_empty());
}

#[tokio::test]
async fn login_with_wrong_password_fails() {
    let app = TestApp::spawn().await;
    app.register_user("carl@test.com", "Carl", "Password123!")
        .await;

    let resp = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({
            "email": "carl@test.com",
            "password": "WrongPassword!",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 401);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["msg"], "Invalid email or password");
}

#[tokio::test]
async fn login_unknown_email_fails_like_wrong_password() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({
            "email": "ghost@test.com",
            "password": "Password123!",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 401);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["msg"], "Invalid email or password");
}

#[tokio::test]
async fn otp_login_round_trip() {
    let app = TestApp::spawn().await;
    let registered = app
        .register_user("otp@test.com", "Otp", "Password123!")
        .await;

    let resp = app
        .client
        .post(app.url("/api/auth/emaillogin"))
        .json(&serde_json::json!({ "email": "otp@test.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["msg"], "OTP sent to your email");

    let code = app.mailer.last_otp("otp@test.com").expect("OTP was not mailed");
    assert_eq!(code.len(), 4);

    let resp = app
        .client
        .post(app.url("/api/auth/emailverify"))
        .json(&serde_json::json!({ "email": "otp@test.com", "otp": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["user"]["id"], registered.id.as_str());
    assert!(json["accessToken"].is_string());
}

#[tokio::test]
async fn otp_accepts_numeric_code() {
    let app = TestApp::spawn().await;
    app.register_user("numeric@test.com", "Numeric", "Password123!")
        .await;

    app.client
        .post(app.url("/api/auth/emaillogin"))
        .json(&serde_json::json!({ "email": "numeric@test.com" }))
        .send()
        .await
        .unwrap();
    let code: u32 = app
        .mailer
        .last_otp("numeric@test.com")
        .unwrap()
        .parse()
        .unwrap();

    let resp = app
        .client
        .post(app.url("/api/auth/emailverify"))
        .json(&serde_json::json!({ "email": "numeric@test.com", "otp": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn otp_wrong_code_can_be_retried() {
    let app = TestApp::spawn().await;
    app.register_user("retry@test.com", "Retry", "Password123!")
        .await;

    app.client
        .post(app.url("/api/auth/emaillogin"))
        .json(&serde_json::json!({ "email": "retry@test.com" }))
        .send()
        .await
        .unwrap();
    let code = app.mailer.last_otp("retry@test.com").unwrap();
    let wrong = if code == "0000" { "1111" } else { "0000" };

    for _ in 0..5 {
        let resp = app
            .client
            .post(app.url("/api/auth/emailverify"))
            .json(&serde_json::json!({ "email": "retry@test.com", "otp": wrong }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 401);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["msg"], "Invalid OTP. Please try again.");
    }

    let resp = app
        .client
        .post(app.url("/api/auth/emailverify"))
        .json(&serde_json::json!({ "email": "retry@test.com", "otp": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn otp_request_for_unregistered_email_is_not_found() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/auth/emaillogin"))
        .json(&serde_json::json!({ "email": "nobody@test.com" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 404);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["msg"], "User not registered. Please register first.");
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn failed_otp_delivery_stores_no_code() {
    let app = TestApp::spawn().await;
    app.register_user("offline@test.com", "Offline", "Password123!")
        .await;
    app.mailer.set_failing(true);

    let resp = app
        .client
        .post(app.url("/api/auth/emaillogin"))
        .json(&serde_json::json!({ "email": "offline@test.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);

    let user = app.state.users.find_by_email("offline@test.com").await.unwrap();
    assert!(user.otp.is_none());
}

#[tokio::test]
async fn user_signup_reports_registration() {
    let app = TestApp::spawn().await;
    app.register_user("known@test.com", "Known", "Password123!")
        .await;

    let resp = app
        .client
        .post(app.url("/api/auth/usersignup"))
        .json(&serde_json::json!({ "email": "known@test.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app
        .client
        .post(app.url("/api/auth/usersignup"))
        .json(&serde_json::json!({ "email": "unknown@test.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn me_requires_token() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(app.url("/api/auth/me")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app
        .auth_get("/api/auth/me", "not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn update_profile_persists_preferences() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("prefs@test.com", "Prefs", "Password123!")
        .await;

    let resp = app
        .auth_put("/api/auth/me", &user.access_token)
        .json(&serde_json::json!({
            "name": "Preferred",
            "timezone": "Europe/Berlin",
            "defaultCalendarView": "week",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app
        .auth_get("/api/auth/me", &user.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["user"]["name"], "Preferred");
    assert_eq!(json["user"]["timezone"], "Europe/Berlin");
    assert_eq!(json["user"]["defaultCalendarView"], "week");
}
