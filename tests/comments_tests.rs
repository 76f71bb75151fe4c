mod common;

use axum::http::StatusCode;
use common::test_app;
use serde_json::json;

#[tokio::test]
async fn test_create_comment() {
    let app = test_app().await;
    let (_, alice) = app.user("alice").await;
    let (bob_id, bob) = app.user("bob").await;
    let article = app.article(&alice, "Post", true).await;

    let (status, json) = app
        .post(
            "/api/comments",
            Some(&bob),
            json!({"content": "First!", "article_id": article}),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["content"], "First!");
    assert_eq!(json["article_id"], article);
    assert_eq!(json["article_title"], "Post");
    assert_eq!(json["author_id"], bob_id);
    assert_eq!(json["author_username"], "bob");
    assert!(json["parent_id"].is_null());

    let (_, json) = app.get(&format!("/api/articles/{article}"), None).await;
    assert_eq!(json["comments_count"], 1);
}

#[tokio::test]
async fn test_create_comment_requires_auth_and_content() {
    let app = test_app().await;
    let (_, alice) = app.user("alice").await;
    let article = app.article(&alice, "Post", true).await;

    let (status, _) = app
        .post(
            "/api/comments",
            None,
            json!({"content": "Hi", "article_id": article}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = app
        .post(
            "/api/comments",
            Some(&alice),
            json!({"content": "  ", "article_id": article}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["validation_errors"]["content"].is_string());

    let (status, _) = app
        .post(
            "/api/comments",
            Some(&alice),
            json!({"content": "x".repeat(1001), "article_id": article}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cannot_comment_on_draft() {
    let app = test_app().await;
    let (_, alice) = app.user("alice").await;
    let (_, admin) = app.admin("root").await;
    let draft = app.article(&alice, "Draft", false).await;

    for token in [&alice, &admin] {
        let (status, _) = app
            .post(
                "/api/comments",
                Some(token),
                json!({"content": "Hi", "article_id": draft}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let (status, _) = app
        .post(
            "/api/comments",
            Some(&alice),
            json!({"content": "Hi", "article_id": 999}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_replies() {
    let app = test_app().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let article = app.article(&alice, "Post", true).await;
    let other = app.article(&alice, "Other", true).await;
    let parent = app.comment(&alice, article, None).await;

    let (status, json) = app
        .post(
            "/api/comments",
            Some(&bob),
            json!({"content": "Reply", "article_id": article, "parent_id": parent}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["parent_id"], parent);
    assert_eq!(json["parent_author_username"], "alice");

    // The parent has to live under the same article.
    let (status, _) = app
        .post(
            "/api/comments",
            Some(&bob),
            json!({"content": "Reply", "article_id": other, "parent_id": parent}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(
            "/api/comments",
            Some(&bob),
            json!({"content": "Reply", "article_id": article, "parent_id": 999}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_for_article_oldest_first() {
    let app = test_app().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let article = app.article(&alice, "Post", true).await;
    let first = app.comment(&alice, article, None).await;
    let second = app.comment(&bob, article, None).await;
    let third = app.comment(&alice, article, Some(first)).await;

    let (status, json) = app
        .get(&format!("/api/comments/article/{article}"), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_elements"], 3);
    let ids: Vec<i64> = json["content"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![first, second, third]);

    let (_, json) = app
        .get(&format!("/api/comments/article/{article}?size=2&page=1"), None)
        .await;
    assert_eq!(json["content"].as_array().unwrap().len(), 1);
    assert_eq!(json["content"][0]["id"], third);
}

#[tokio::test]
async fn test_comments_of_hidden_article() {
    let app = test_app().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let article = app.article(&alice, "Post", true).await;
    let comment = app.comment(&bob, article, None).await;

    let (status, _) = app
        .request(
            "PATCH",
            &format!("/api/articles/{article}/publish"),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let list = format!("/api/comments/article/{article}");
    let single = format!("/api/comments/{comment}");

    let (status, _) = app.get(&list, Some(&bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(&single, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = app.get(&list, Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_elements"], 1);
    let (status, _) = app.get(&single, Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_my_comments_newest_first() {
    let app = test_app().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let article = app.article(&alice, "Post", true).await;
    let older = app.comment(&bob, article, None).await;
    app.comment(&alice, article, None).await;
    let newer = app.comment(&bob, article, None).await;

    let (status, json) = app.get("/api/comments/mine", Some(&bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_elements"], 2);
    assert_eq!(json["content"][0]["id"], newer);
    assert_eq!(json["content"][1]["id"], older);

    let (status, _) = app.get("/api/comments/mine", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_comment() {
    let app = test_app().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let (_, admin) = app.admin("root").await;
    let article = app.article(&alice, "Post", true).await;
    let comment = app.comment(&bob, article, None).await;
    let uri = format!("/api/comments/{comment}");

    // The article author does not own the comment.
    let (status, _) = app
        .put(&uri, Some(&alice), json!({"content": "Edited"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.put(&uri, None, json!({"content": "Edited"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = app
        .put(&uri, Some(&bob), json!({"content": "Edited by bob"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["content"], "Edited by bob");

    let (status, json) = app
        .put(&uri, Some(&admin), json!({"content": "Moderated"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["content"], "Moderated");

    let (status, _) = app
        .put("/api/comments/999", Some(&bob), json!({"content": "x"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_comment() {
    let app = test_app().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let (_, admin) = app.admin("root").await;
    let article = app.article(&alice, "Post", true).await;
    let first = app.comment(&bob, article, None).await;
    let second = app.comment(&bob, article, None).await;

    let (status, _) = app
        .delete(&format!("/api/comments/{first}"), Some(&alice))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = app
        .delete(&format!("/api/comments/{first}"), Some(&bob))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Comment deleted");

    let (status, _) = app
        .delete(&format!("/api/comments/{second}"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/comments/{first}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_article_removes_comments() {
    let app = test_app().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let article = app.article(&alice, "Post", true).await;
    let comment = app.comment(&bob, article, None).await;

    let (status, _) = app
        .delete(&format!("/api/articles/{article}"), Some(&alice))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/comments/{comment}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = app.get("/api/comments/mine", Some(&bob)).await;
    assert_eq!(json["total_elements"], 0);
}
