use crate::fixtures::test_app::TestApp;
use bson::oid::ObjectId;
use serde_json::Value;

async fn create_team_event(
    app: &TestApp,
    token: &str,
    team_id: &str,
    body: Value,
) -> reqwest::Response {
    let mut body = body;
    body["teamId"] = Value::String(team_id.to_string());
    app.auth_post("/api/teams/event", token)
        .json(&body)
        .send()
        .await
        .unwrap()
}

fn titles(json: &Value) -> Vec<String> {
    json["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn create_personal_event_defaults() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("cal@test.com", "Cal", "Password123!")
        .await;

    let event = app
        .create_personal_event(&user.access_token, "Dentist", "2024-02-01", "2024-02-01")
        .await;
    assert_eq!(event["calendarType"], "personal");
    assert_eq!(event["user"], user.id.as_str());
    assert_eq!(event["startDate"], "2024-02-01");
    assert!(event["teamId"].is_null());
}

#[tokio::test]
async fn create_event_rejects_bad_input() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("bad@test.com", "Bad", "Password123!")
        .await;

    let resp = app
        .auth_post("/api/events/create", &user.access_token)
        .json(&serde_json::json!({
            "title": "Backwards",
            "startDate": "2024-02-05",
            "endDate": "2024-02-01",
            "type": "meeting",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = app
        .auth_post("/api/events/create", &user.access_token)
        .json(&serde_json::json!({
            "title": "Untyped",
            "startDate": "2024-02-01",
            "endDate": "2024-02-01",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = app
        .auth_post("/api/events/create", &user.access_token)
        .json(&serde_json::json!({
            "title": "Personal with team",
            "startDate": "2024-02-01",
            "endDate": "2024-02-01",
            "type": "meeting",
            "calendarType": "personal",
            "teamId": ObjectId::new().to_hex(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["msg"], "Personal events cannot have a teamId");
}

#[tokio::test]
async fn list_returns_events_overlapping_range() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("range@test.com", "Range", "Password123!")
        .await;
    let token = &user.access_token;

    app.create_personal_event(token, "Before", "2024-01-01", "2024-01-05").await;
    app.create_personal_event(token, "Spanning", "2024-01-08", "2024-01-15").await;
    app.create_personal_event(token, "Inside", "2024-01-11", "2024-01-11").await;
    app.create_personal_event(token, "Touching end", "2024-01-12", "2024-01-20").await;
    app.create_personal_event(token, "After", "2024-01-13", "2024-01-14").await;

    let resp = app
        .auth_get("/api/events?startDate=2024-01-10&endDate=2024-01-12", token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(titles(&json), vec!["Spanning", "Inside", "Touching end"]);
}

#[tokio::test]
async fn personal_events_stay_private() {
    let app = TestApp::spawn().await;
    let owner = app
        .register_user("private@test.com", "Private", "Password123!")
        .await;
    let other = app
        .register_user("other@test.com", "Other", "Password123!")
        .await;

    let event = app
        .create_personal_event(&owner.access_token, "Secret", "2024-04-01", "2024-04-01")
        .await;
    let path = format!("/api/events/{}", event["id"].as_str().unwrap());

    let resp = app.auth_get(&path, &other.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app.auth_get("/api/events", &other.access_token).send().await.unwrap();
    let json: Value = resp.json().await.unwrap();
    assert!(titles(&json).is_empty());

    let resp = app
        .auth_delete(&path, &other.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn team_event_permissions_follow_membership() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("events").await;

    let resp = create_team_event(
        &app,
        &seeded.viewer.access_token,
        &seeded.id,
        serde_json::json!({ "title": "Nope", "date": "2024-05-01" }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 403);

    let resp = create_team_event(
        &app,
        &seeded.editor.access_token,
        &seeded.id,
        serde_json::json!({ "title": "Retro", "date": "2024-05-01", "startTime": "10:00" }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["event"]["calendarType"], "team");
    assert_eq!(json["event"]["endDate"], "2024-05-01");
    let path = format!("/api/events/{}", json["event"]["id"].as_str().unwrap());

    // Viewers see team events but cannot change them.
    let resp = app.auth_get(&path, &seeded.viewer.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let resp = app
        .auth_put(&path, &seeded.viewer.access_token)
        .json(&serde_json::json!({ "title": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // The team admin may edit events created by others.
    let resp = app
        .auth_put(&path, &seeded.admin.access_token)
        .json(&serde_json::json!({ "title": "Sprint retro", "location": "Room 2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["event"]["title"], "Sprint retro");
    assert_eq!(json["event"]["location"], "Room 2");
    assert_eq!(json["event"]["startTime"], "10:00");

    let resp = app
        .auth_get(
            &format!("/api/teams/{}/events", seeded.id),
            &seeded.viewer.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(titles(&json), vec!["Sprint retro"]);

    let resp = app
        .auth_delete(&path, &seeded.viewer.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
    let resp = app
        .auth_delete(&path, &seeded.editor.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let resp = app.auth_get(&path, &seeded.admin.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn team_events_hidden_from_outsiders() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("outside").await;
    let outsider = app
        .register_user("stranger@test.com", "Stranger", "Password123!")
        .await;

    let resp = app
        .auth_get(&format!("/api/teams/{}/events", seeded.id), &outsider.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["msg"], "Team not found or you are not an active member");
}

#[tokio::test]
async fn attendance_updates_only_the_caller() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("attend").await;

    let resp = create_team_event(
        &app,
        &seeded.admin.access_token,
        &seeded.id,
        serde_json::json!({
            "title": "All hands",
            "date": "2024-06-03",
            "attendees": [seeded.editor.id, seeded.viewer.id],
        }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    let event_id = json["event"]["id"].as_str().unwrap().to_string();
    let path = format!("/api/teams/event/{event_id}/attendance");

    let admin_id = ObjectId::parse_str(&seeded.admin.id).unwrap();
    let mut feed = app.state.feed.subscribe(admin_id);

    let resp = app
        .auth_put(&path, &seeded.viewer.access_token)
        .json(&serde_json::json!({ "status": "maybe" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    let attendees = json["event"]["attendees"].as_array().unwrap();
    assert_eq!(attendees[0]["user"], seeded.editor.id.as_str());
    assert_eq!(attendees[0]["status"], "not-responded");
    assert_eq!(attendees[1]["user"], seeded.viewer.id.as_str());
    assert_eq!(attendees[1]["status"], "maybe");
    assert!(attendees[1]["responseDate"].is_string());

    let change = feed.try_recv().expect("owner notified");
    assert_eq!(change["type"], "event_updated");
    assert_eq!(change["event_id"], event_id.as_str());

    let resp = app
        .auth_put(&path, &seeded.viewer.access_token)
        .json(&serde_json::json!({ "status": "not-responded" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    // The admin owns the event but is not on the attendee list.
    let resp = app
        .auth_put(&path, &seeded.admin.access_token)
        .json(&serde_json::json!({ "status": "attending" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn personal_event_from_web_form_is_accepted() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("form@test.com", "Form", "Password123!")
        .await;

    let resp = app
        .auth_post("/api/events/create", &user.access_token)
        .json(&serde_json::json!({
            "title": "Standup",
            "startDate": "2024-01-10T09:00",
            "endDate": "2024-01-10T09:30",
            "type": "meeting",
            "calendarType": "personal",
            "teamId": "",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["event"]["calendarType"], "personal");
    assert_eq!(json["event"]["startDate"], "2024-01-10");
    assert_eq!(json["event"]["endDate"], "2024-01-10");
    assert!(json["event"]["teamId"].is_null());
}
