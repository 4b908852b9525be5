use actix_web::{test, web, App};

use iscrizioni_server::handlers;

#[actix_rt::test]
async fn top_level_health_reports_ok() {
    let app = test::init_service(
        App::new().route("/health", web::get().to(handlers::health_check)),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[actix_rt::test]
async fn unknown_route_is_404() {
    let app = test::init_service(
        App::new().route("/health", web::get().to(handlers::health_check)),
    )
    .await;

    let req = test::TestRequest::get().uri("/nope").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}
