use rocket::http::Status;

use crate::common::test_client;

#[test]
fn test_health() {
    let client = test_client();
    let res = client.get("/api/v1/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "kindred-server");
}

#[test]
fn test_stats_shape() {
    let client = test_client();
    let res = client.get("/api/v1/stats").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["profiles"], 0);
    assert_eq!(body["chats"], 0);
    assert_eq!(body["messages"], 0);
    assert_eq!(body["matchmaking_tickets"], 0);
    assert!(body["workers"].is_array());
}

#[test]
fn test_unknown_route_is_json_404() {
    let client = test_client();
    let res = client.get("/api/v1/nope").dispatch();
    assert_eq!(res.status(), Status::NotFound);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["error"], "Not found");
}
