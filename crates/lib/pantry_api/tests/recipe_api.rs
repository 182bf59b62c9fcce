//! Recipe endpoints, including nested tags/ingredients and image upload.

mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, ids, multipart_request, names, png_bytes};
use serde_json::json;

#[tokio::test]
async fn recipes_require_authentication() {
    let app = TestApp::new();
    let (status, _) = app.request(Method::GET, "/api/recipes", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .request(Method::POST, "/api/recipes", None, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn end_to_end_create_with_nested_tag() {
    let app = TestApp::new();
    let token = app.token_for("cook@example.com").await;
    let (status, body) = app
        .post(
            "/api/recipes",
            &token,
            json!({
                "title": "Thai Curry",
                "time_minutes": 30,
                "price": "7.50",
                "link": "https://example.com/curry",
                "description": "Spicy.",
                "tags": [{"name": "Thai"}],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].as_i64().is_some());
    assert_eq!(body["title"], "Thai Curry");
    assert_eq!(body["price"], "7.50");
    assert_eq!(body["description"], "Spicy.");
    assert_eq!(body["image"], json!(null));
    assert_eq!(body["tags"][0]["name"], "Thai");
    assert!(body["tags"][0]["id"].as_i64().is_some());
    assert_eq!(body["ingredients"], json!([]));
}

#[tokio::test]
async fn create_reports_every_invalid_field() {
    let app = TestApp::new();
    let token = app.token_for("cook@example.com").await;
    let (status, body) = app
        .post(
            "/api/recipes",
            &token,
            json!({"time_minutes": -5, "price": "abc", "tags": [{"name": ""}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields = &body["fields"];
    assert!(fields["title"].is_array());
    assert!(fields["time_minutes"].is_array());
    assert!(fields["price"].is_array());
    assert!(fields["tags[0].name"].is_array());

    let (_, tags) = app.get("/api/tags", &token).await;
    assert_eq!(tags, json!([]));
}

#[tokio::test]
async fn list_is_newest_first_and_uses_list_representation() {
    let app = TestApp::new();
    let token = app.token_for("cook@example.com").await;
    let first = app.recipe(&token, "First", &[], &[]).await;
    let second = app.recipe(&token, "Second", &[], &[]).await;

    let (status, body) = app.get("/api/recipes", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        ids(&body),
        vec![second["id"].as_i64().unwrap(), first["id"].as_i64().unwrap()]
    );
    assert!(body[0].get("description").is_none());
    assert!(body[0].get("image").is_none());
}

#[tokio::test]
async fn recipes_are_scoped_to_owner() {
    let app = TestApp::new();
    let alice = app.token_for("alice@example.com").await;
    let bob = app.token_for("bob@example.com").await;
    let recipe = app.recipe(&alice, "Alice's Soup", &["Vegan"], &[]).await;
    app.recipe(&bob, "Bob's Stew", &[], &[]).await;
    let uri = format!("/api/recipes/{}", recipe["id"]);

    let (_, bob_list) = app.get("/api/recipes", &bob).await;
    assert_eq!(bob_list.as_array().unwrap().len(), 1);
    assert_eq!(bob_list[0]["title"], "Bob's Stew");

    let (status, body) = app.get(&uri, &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    let (status, _) = app.patch(&uri, &bob, json!({"title": "Stolen"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get(&uri, &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Alice's Soup");
}

#[tokio::test]
async fn non_numeric_id_is_not_found() {
    let app = TestApp::new();
    let token = app.token_for("cook@example.com").await;
    let (status, _) = app.get("/api/recipes/abc", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn same_tag_name_is_shared_between_recipes() {
    let app = TestApp::new();
    let token = app.token_for("cook@example.com").await;
    let first = app.recipe(&token, "Salad", &["Vegan"], &[]).await;
    let second = app.recipe(&token, "Soup", &["Vegan"], &[]).await;
    assert_eq!(first["tags"][0]["id"], second["tags"][0]["id"]);

    let (_, tags) = app.get("/api/tags", &token).await;
    assert_eq!(names(&tags), vec!["Vegan"]);
}

#[tokio::test]
async fn tags_are_not_shared_between_users() {
    let app = TestApp::new();
    let alice = app.token_for("alice@example.com").await;
    let bob = app.token_for("bob@example.com").await;
    let a = app.recipe(&alice, "Salad", &["Vegan"], &[]).await;
    let b = app.recipe(&bob, "Salad", &["Vegan"], &[]).await;
    assert_ne!(a["tags"][0]["id"], b["tags"][0]["id"]);
}

#[tokio::test]
async fn update_without_tags_keeps_them_and_empty_list_clears() {
    let app = TestApp::new();
    let token = app.token_for("cook@example.com").await;
    let recipe = app.recipe(&token, "Soup", &["Hot"], &["Leek"]).await;
    let uri = format!("/api/recipes/{}", recipe["id"]);

    let (status, body) = app.patch(&uri, &token, json!({"title": "Stew"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Stew");
    assert_eq!(names(&body["tags"]), vec!["Hot"]);
    assert_eq!(names(&body["ingredients"]), vec!["Leek"]);

    let (status, body) = app.patch(&uri, &token, json!({"tags": []})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"], json!([]));
    assert_eq!(names(&body["ingredients"]), vec!["Leek"]);
}

#[tokio::test]
async fn update_replaces_tags_with_get_or_created_set() {
    let app = TestApp::new();
    let token = app.token_for("cook@example.com").await;
    let recipe = app.recipe(&token, "Soup", &["Hot"], &[]).await;
    let uri = format!("/api/recipes/{}", recipe["id"]);

    let (status, body) = app
        .patch(&uri, &token, json!({"tags": [{"name": "Lunch"}, {"name": "Hot"}]}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let mut tag_names = names(&body["tags"]);
    tag_names.sort();
    assert_eq!(tag_names, vec!["Hot", "Lunch"]);
    assert!(ids(&body["tags"]).contains(&recipe["tags"][0]["id"].as_i64().unwrap()));
}

#[tokio::test]
async fn put_requires_core_fields_and_keeps_unsent_optional_ones() {
    let app = TestApp::new();
    let token = app.token_for("cook@example.com").await;
    let recipe = app.recipe(&token, "Soup", &["Hot"], &[]).await;
    let uri = format!("/api/recipes/{}", recipe["id"]);

    let (status, body) = app.put(&uri, &token, json!({"title": "Only title"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["time_minutes"].is_array());
    assert!(body["fields"]["price"].is_array());

    let (status, body) = app
        .put(
            &uri,
            &token,
            json!({"title": "Stew", "time_minutes": 45, "price": 12}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["time_minutes"], 45);
    assert_eq!(body["price"], "12.00");
    assert_eq!(names(&body["tags"]), vec!["Hot"]);
}

#[tokio::test]
async fn filter_by_tags_and_ingredients() {
    let app = TestApp::new();
    let token = app.token_for("cook@example.com").await;
    let curry = app.recipe(&token, "Curry", &["Vegan"], &["Rice"]).await;
    let soup = app.recipe(&token, "Soup", &["Vegan", "Hot"], &["Leek"]).await;
    app.recipe(&token, "Steak", &["Meat"], &["Beef"]).await;

    let vegan = curry["tags"][0]["id"].as_i64().unwrap();
    let hot = soup["tags"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "Hot")
        .unwrap()["id"]
        .as_i64()
        .unwrap();

    let (status, body) = app
        .get(&format!("/api/recipes?tags={vegan},{hot}"), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Soup", "Curry"]);

    let rice = curry["ingredients"][0]["id"].as_i64().unwrap();
    let (_, body) = app
        .get(&format!("/api/recipes?tags={vegan}&ingredients={rice}"), &token)
        .await;
    assert_eq!(ids(&body), vec![curry["id"].as_i64().unwrap()]);
}

#[tokio::test]
async fn malformed_filter_ids_are_rejected() {
    let app = TestApp::new();
    let token = app.token_for("cook@example.com").await;
    let (status, body) = app.get("/api/recipes?tags=1,abc", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["tags"].is_array());
}

#[tokio::test]
async fn delete_removes_recipe_only() {
    let app = TestApp::new();
    let token = app.token_for("cook@example.com").await;
    let recipe = app.recipe(&token, "Soup", &["Hot"], &[]).await;
    let uri = format!("/api/recipes/{}", recipe["id"]);

    let (status, _) = app.delete(&uri, &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, tags) = app.get("/api/tags", &token).await;
    assert_eq!(names(&tags), vec!["Hot"]);
}

#[tokio::test]
async fn upload_image_stores_file_and_returns_url() {
    let app = TestApp::new();
    let token = app.token_for("cook@example.com").await;
    let recipe = app.recipe(&token, "Soup", &[], &[]).await;
    let uri = format!("/api/recipes/{}/upload-image", recipe["id"]);

    let (status, body) = app
        .send(multipart_request(&uri, &token, "image", &png_bytes()))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["id"], recipe["id"]);
    let url = body["image"].as_str().unwrap().to_string();
    assert!(url.starts_with("/media/uploads/recipe/"));
    assert!(url.ends_with(".png"));

    let relative = url.trim_start_matches("/media/");
    assert!(app.media.path().join(relative).exists());

    let (_, detail) = app
        .get(&format!("/api/recipes/{}", recipe["id"]), &token)
        .await;
    assert_eq!(detail["image"], url.as_str());

    let (status, _) = app
        .send(multipart_request(&uri, &token, "image", &png_bytes()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.media.path().join(relative).exists());
}

#[tokio::test]
async fn upload_rejects_non_image_payload() {
    let app = TestApp::new();
    let token = app.token_for("cook@example.com").await;
    let recipe = app.recipe(&token, "Soup", &[], &[]).await;
    let uri = format!("/api/recipes/{}/upload-image", recipe["id"]);

    let (status, body) = app
        .send(multipart_request(&uri, &token, "image", b"notanimage"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["image"].is_array());

    let (status, body) = app
        .send(multipart_request(&uri, &token, "photo", &png_bytes()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["image"].is_array());
}

#[tokio::test]
async fn upload_to_foreign_recipe_is_not_found() {
    let app = TestApp::new();
    let alice = app.token_for("alice@example.com").await;
    let bob = app.token_for("bob@example.com").await;
    let recipe = app.recipe(&alice, "Soup", &[], &[]).await;
    let uri = format!("/api/recipes/{}/upload-image", recipe["id"]);

    let (status, _) = app
        .send(multipart_request(&uri, &bob, "image", &png_bytes()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
