//! The HTTP and websocket surface served from a real listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use dayplan::db::Repository;
use dayplan::notify::Notifier;
use dayplan::schedule::{ChainSettings, ScheduleService};
use dayplan::server::{self, AppState};
use dayplan::travel::UnconfiguredEstimator;

async fn start() -> (TempDir, Arc<Notifier>, SocketAddr) {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::new(dir.path().join("plan.db").to_str().unwrap())
        .await
        .unwrap();
    let notifier = Arc::new(Notifier::new());
    let service = Arc::new(ScheduleService::new(
        repo,
        Arc::new(UnconfiguredEstimator),
        notifier.clone(),
        ChainSettings::default(),
    ));

    let app = server::router(AppState {
        service,
        notifier: notifier.clone(),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    (dir, notifier, addr)
}

async fn wait_for_connections(notifier: &Notifier, user: &str, expected: usize) {
    for _ in 0..200 {
        if notifier.connection_count(user).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{user} never reached {expected} connections");
}

#[tokio::test]
async fn first_valid_message_registers_and_close_unregisters() {
    let (_dir, notifier, addr) = start().await;
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    socket.send(Message::Text("hello".into())).await.unwrap();
    socket.send(Message::Text(r#"{"userId": ""}"#.into())).await.unwrap();
    socket.send(Message::Text(r#"{"userId": "u1"}"#.into())).await.unwrap();
    wait_for_connections(&notifier, "u1", 1).await;
    assert_eq!(notifier.connection_count("").await, 0);

    assert_eq!(notifier.publish_text("u1", r#"{"id":7}"#.to_string()).await, 1);
    let received = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(received.to_text().unwrap(), r#"{"id":7}"#);

    socket.close(None).await.unwrap();
    wait_for_connections(&notifier, "u1", 0).await;
    assert_eq!(notifier.publish_text("u1", "late".to_string()).await, 0);
}

#[tokio::test]
async fn each_socket_of_a_user_gets_its_own_registration() {
    let (_dir, notifier, addr) = start().await;
    let (mut phone, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let (mut laptop, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    for socket in [&mut phone, &mut laptop] {
        socket.send(Message::Text(r#"{"userId": "u1"}"#.into())).await.unwrap();
    }
    wait_for_connections(&notifier, "u1", 2).await;

    drop(laptop);
    wait_for_connections(&notifier, "u1", 1).await;
    assert_eq!(notifier.publish_text("u1", "still here".to_string()).await, 1);

    let received = tokio::time::timeout(Duration::from_secs(5), phone.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(received.to_text().unwrap(), "still here");
}

#[tokio::test]
async fn routine_and_tag_maintenance_over_http() {
    let (_dir, _notifier, addr) = start().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let too_long = client
        .post(format!("{base}/routines"))
        .json(&json!({"owner": "u1", "name": "Hibernate", "durationMinutes": 1_000_000_000_000i64}))
        .send()
        .await
        .unwrap();
    assert_eq!(too_long.status(), 400);

    let mut ids = Vec::new();
    for (name, minutes) in [("Shower", 15), ("Breakfast", 20)] {
        let routine: Value = client
            .post(format!("{base}/routines"))
            .json(&json!({"owner": "u1", "name": name, "durationMinutes": minutes}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        ids.push(routine["id"].as_i64().unwrap());
    }

    let tag: Value = client
        .post(format!("{base}/tags"))
        .json(&json!({"owner": "u1", "name": "Workday", "routineIds": ids}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tag_id = tag["id"].as_i64().unwrap();

    let edited = client
        .patch(format!("{base}/routines/edit/{}", ids[0]))
        .json(&json!({"name": "Shower", "durationMinutes": 2000}))
        .send()
        .await
        .unwrap();
    assert_eq!(edited.status(), 400);
    let edited: Value = client
        .patch(format!("{base}/routines/edit/{}", ids[0]))
        .json(&json!({"name": "Cold shower", "durationMinutes": 5}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(edited["durationMinutes"], 5);

    let reordered = client
        .patch(format!("{base}/tags/{tag_id}"))
        .json(&json!({"name": "Workday", "routineIds": [ids[1], ids[0]]}))
        .send()
        .await
        .unwrap();
    assert_eq!(reordered.status(), 200);

    let routines: Vec<Value> = client
        .get(format!("{base}/tags/{tag_id}/routines"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<_> = routines.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["Breakfast", "Cold shower"]);

    let deleted = client
        .delete(format!("{base}/routines/{}", ids[1]))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);
    let routines: Vec<Value> = client
        .get(format!("{base}/tags/{tag_id}/routines"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(routines.len(), 1);

    let listed: Vec<Value> = client
        .get(format!("{base}/routines/u1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    let gone = client.delete(format!("{base}/tags/{tag_id}")).send().await.unwrap();
    assert_eq!(gone.status(), 200);
    let again = client.delete(format!("{base}/tags/{tag_id}")).send().await.unwrap();
    assert_eq!(again.status(), 404);
}
