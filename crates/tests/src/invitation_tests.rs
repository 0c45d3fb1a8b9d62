use crate::fixtures::test_app::TestApp;
use bson::doc;
use serde_json::Value;
use unical_db::models::Invitation;

async fn invite(app: &TestApp, token: &str, team_id: &str, email: &str) -> reqwest::Response {
    app.auth_post("/api/teams/invite", token)
        .json(&serde_json::json!({
            "teamId": team_id,
            "email": email,
            "message": "Join us",
        }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn invite_creates_pending_invitation_and_mails_link() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("invites").await;

    let resp = invite(&app, &seeded.admin.access_token, &seeded.id, "New@Test.com").await;
    assert_eq!(resp.status().as_u16(), 201);

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["emailSent"], true);
    assert_eq!(json["invitation"]["email"], "new@test.com");
    assert_eq!(json["invitation"]["status"], "pending");
    assert_eq!(json["invitation"]["team"], seeded.id.as_str());

    let token = app.mailer.last_invitation_token("new@test.com").unwrap();
    assert_eq!(json["invitation"]["token"], token.as_str());
}

#[tokio::test]
async fn invite_requires_admin() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("noinvite").await;

    let resp = invite(&app, &seeded.editor.access_token, &seeded.id, "x@test.com").await;
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn invite_existing_member_conflicts() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("already").await;

    let resp = invite(&app, &seeded.admin.access_token, &seeded.id, &seeded.viewer.email).await;
    assert_eq!(resp.status().as_u16(), 409);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["msg"], "User is already a member of this team");
}

#[tokio::test]
async fn invite_survives_mail_failure() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("nomail").await;
    app.mailer.set_failing(true);

    let resp = invite(&app, &seeded.admin.access_token, &seeded.id, "quiet@test.com").await;
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["emailSent"], false);
    assert!(json["invitation"]["token"].is_string());
}

#[tokio::test]
async fn accept_adds_invitee_and_is_idempotent() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("accepting").await;
    invite(&app, &seeded.admin.access_token, &seeded.id, "joiner@test.com").await;
    let token = app.mailer.last_invitation_token("joiner@test.com").unwrap();

    let joiner = app
        .register_user("joiner@test.com", "Joiner", "Password123!")
        .await;
    let path = format!("/api/teams/invitation/{token}");

    let resp = app.auth_get(&path, &joiner.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["msg"], "Invitation accepted successfully");
    let members = json["team"]["members"].as_array().unwrap();
    let me = members.iter().find(|m| m["user"] == joiner.id.as_str()).unwrap();
    assert_eq!(me["status"], "active");
    assert_eq!(me["permissions"], "view");

    let resp = app.auth_get(&path, &joiner.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["msg"], "You are already a member of this team");
    let count = json["team"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["user"] == joiner.id.as_str())
        .count();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn accept_by_other_user_is_forbidden() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("mismatch").await;
    invite(&app, &seeded.admin.access_token, &seeded.id, "meant@test.com").await;
    let token = app.mailer.last_invitation_token("meant@test.com").unwrap();

    let intruder = app
        .register_user("intruder@test.com", "Intruder", "Password123!")
        .await;
    let resp = app
        .auth_get(&format!("/api/teams/invitation/{token}"), &intruder.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn accept_expired_invitation_marks_it_expired() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("expired").await;
    invite(&app, &seeded.admin.access_token, &seeded.id, "late@test.com").await;
    let token = app.mailer.last_invitation_token("late@test.com").unwrap();

    let past = bson::DateTime::from_millis(bson::DateTime::now().timestamp_millis() - 60_000);
    app.db
        .collection::<Invitation>(Invitation::COLLECTION)
        .update_one(doc! { "token": token.as_str() }, doc! { "$set": { "expires_at": past } })
        .await
        .unwrap();

    let late = app
        .register_user("late@test.com", "Late", "Password123!")
        .await;
    let path = format!("/api/teams/invitation/{token}");

    let resp = app.auth_get(&path, &late.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["msg"], "Invitation has expired");

    let resp = app.auth_get(&path, &late.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn decline_closes_invitation() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("declining").await;
    invite(&app, &seeded.admin.access_token, &seeded.id, "nope@test.com").await;
    let token = app.mailer.last_invitation_token("nope@test.com").unwrap();

    let nope = app
        .register_user("nope@test.com", "Nope", "Password123!")
        .await;
    let resp = app
        .auth_post(&format!("/api/teams/invitation/{token}/decline"), &nope.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app
        .auth_get(&format!("/api/teams/invitation/{token}"), &nope.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["msg"], "Invitation not found or already processed");
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("lost@test.com", "Lost", "Password123!")
        .await;

    let resp = app
        .auth_get("/api/teams/invitation/does-not-exist", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn second_pending_invitation_conflicts() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("twice").await;

    let resp = invite(&app, &seeded.admin.access_token, &seeded.id, "twice@test.com").await;
    assert_eq!(resp.status().as_u16(), 201);

    let resp = invite(&app, &seeded.admin.access_token, &seeded.id, "TWICE@test.com").await;
    assert_eq!(resp.status().as_u16(), 409);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["msg"], "An invitation has already been sent to this email");
}

#[tokio::test]
async fn concurrent_invitations_leave_one_pending() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("racing").await;
    let token = seeded.admin.access_token.as_str();

    let (first, second) = tokio::join!(
        invite(&app, token, &seeded.id, "race@test.com"),
        invite(&app, token, &seeded.id, "race@test.com"),
    );
    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![201, 409]);

    let pending = app
        .db
        .collection::<Invitation>(Invitation::COLLECTION)
        .count_documents(doc! { "invitee.email": "race@test.com", "status": "pending" })
        .await
        .unwrap();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn overdue_invitation_does_not_block_a_new_one() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("reinvite").await;
    invite(&app, &seeded.admin.access_token, &seeded.id, "again@test.com").await;
    let old_token = app.mailer.last_invitation_token("again@test.com").unwrap();

    let past = bson::DateTime::from_millis(bson::DateTime::now().timestamp_millis() - 60_000);
    app.db
        .collection::<Invitation>(Invitation::COLLECTION)
        .update_one(
            doc! { "token": old_token.as_str() },
            doc! { "$set": { "expires_at": past } },
        )
        .await
        .unwrap();

    let resp = invite(&app, &seeded.admin.access_token, &seeded.id, "again@test.com").await;
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_ne!(json["invitation"]["token"], old_token.as_str());
}
