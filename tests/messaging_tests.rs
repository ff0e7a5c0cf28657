mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use common::{create_user, send, test_app, test_db, FakeGateway};
use crowdfund::entities::UserRole;
use crowdfund::error::AppError;
use crowdfund::messaging::{self, SendMessage};

fn message(receiver_id: uuid::Uuid, content: &str) -> SendMessage {
    SendMessage {
        receiver_id,
        content: content.to_string(),
    }
}

#[tokio::test]
async fn test_inbox_and_outbox_are_newest_first() {
    let db = test_db().await;
    let ada = create_user(&db, "ada", UserRole::Creator).await;
    let bob = create_user(&db, "bob", UserRole::Backer).await;

    messaging::send_message(&db, &ada, message(bob.id, "first")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    messaging::send_message(&db, &ada, message(bob.id, "second")).await.unwrap();

    let inbox = messaging::inbox(&db, bob.id).await.unwrap();
    let contents: Vec<&str> = inbox.iter().map(|m| m.message.content.as_str()).collect();
    assert_eq!(contents, vec!["second", "first"]);
    assert_eq!(inbox[0].sender_name, "ada");
    assert_eq!(inbox[0].receiver_name, "bob");

    assert_eq!(messaging::outbox(&db, ada.id).await.unwrap().len(), 2);
    assert!(messaging::outbox(&db, bob.id).await.unwrap().is_empty());
    assert!(messaging::inbox(&db, ada.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_receiver_read_marks_message_once() {
    let db = test_db().await;
    let ada = create_user(&db, "ada", UserRole::Creator).await;
    let bob = create_user(&db, "bob", UserRole::Backer).await;
    let sent = messaging::send_message(&db, &ada, message(bob.id, "hello"))
        .await
        .unwrap();
    assert!(!sent.message.is_read);

    // the sender opening it leaves it unread
    let by_sender = messaging::read_message(&db, &ada, sent.message.id).await.unwrap();
    assert!(!by_sender.message.is_read);

    let first = messaging::read_message(&db, &bob, sent.message.id).await.unwrap();
    assert!(first.message.is_read);
    let again = messaging::read_message(&db, &bob, sent.message.id).await.unwrap();
    assert!(again.message.is_read);
    assert_eq!(again.message.content, "hello");
}

#[tokio::test]
async fn test_third_parties_cannot_read() {
    let db = test_db().await;
    let ada = create_user(&db, "ada", UserRole::Creator).await;
    let bob = create_user(&db, "bob", UserRole::Backer).await;
    let eve = create_user(&db, "eve", UserRole::Backer).await;
    let sent = messaging::send_message(&db, &ada, message(bob.id, "private"))
        .await
        .unwrap();

    let result = messaging::read_message(&db, &eve, sent.message.id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let missing = messaging::read_message(&db, &bob, uuid::Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_invalid_messages_are_rejected() {
    let db = test_db().await;
    let ada = create_user(&db, "ada", UserRole::Creator).await;
    let bob = create_user(&db, "bob", UserRole::Backer).await;

    let to_self = messaging::send_message(&db, &ada, message(ada.id, "hi me")).await;
    assert!(matches!(to_self, Err(AppError::InvalidRequest(_))));

    let blank = messaging::send_message(&db, &ada, message(bob.id, "   ")).await;
    assert!(matches!(blank, Err(AppError::InvalidRequest(_))));

    let long = messaging::send_message(&db, &ada, message(bob.id, &"x".repeat(5_001))).await;
    assert!(matches!(long, Err(AppError::InvalidRequest(_))));

    let nobody = messaging::send_message(&db, &ada, message(uuid::Uuid::new_v4(), "hello?")).await;
    assert!(matches!(nobody, Err(AppError::NotFound(_))));

    assert!(messaging::outbox(&db, ada.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recipients_exclude_the_caller() {
    let db = test_db().await;
    let ada = create_user(&db, "ada", UserRole::Creator).await;
    create_user(&db, "carol", UserRole::Backer).await;
    create_user(&db, "bob", UserRole::Backer).await;

    let names: Vec<String> = messaging::recipients(&db, ada.id)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.user_name)
        .collect();
    assert_eq!(names, vec!["bob", "carol"]);
}

#[tokio::test]
async fn test_messages_over_http() {
    let db = test_db().await;
    let ada = create_user(&db, "ada", UserRole::Creator).await;
    let bob = create_user(&db, "bob", UserRole::Backer).await;
    let app = test_app(db, FakeGateway::new());

    let (status, sent) = send(
        &app,
        "POST",
        "/messages",
        Some(ada.id),
        Some(json!({ "receiver_id": bob.id, "content": "Thanks for backing!" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["is_read"], false);
    let id = sent["id"].as_str().unwrap().to_string();

    let (status, inbox) = send(&app, "GET", "/messages/inbox", Some(bob.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox[0]["sender_name"], "ada");

    let (status, read) = send(&app, "GET", &format!("/messages/{}", id), Some(bob.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["is_read"], true);

    let (status, _) = send(&app, "GET", "/messages/inbox", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
