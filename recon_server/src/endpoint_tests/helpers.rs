use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App, ResponseError};
use log::debug;

use crate::server::{json_config, query_config};

pub const ADMIN: &[(&str, &str)] = &[("X-Actor-Id", "ops_1"), ("X-Actor-Role", "admin")];
pub const BRAND_A: &[(&str, &str)] = &[("X-Actor-Id", "seller_1"), ("X-Actor-Role", "brand"), ("X-Actor-Brand", "brand_a")];
pub const BRAND_Z: &[(&str, &str)] = &[("X-Actor-Id", "seller_9"), ("X-Actor-Role", "brand"), ("X-Actor-Brand", "brand_z")];
pub const ANONYMOUS: &[(&str, &str)] = &[];

pub async fn get_request<F>(headers: &[(&str, &str)], path: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let req = with_headers(TestRequest::get().uri(path), headers);
    send_request(req, configure).await
}

pub async fn post_request<F>(headers: &[(&str, &str)], path: &str, body: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let req = with_headers(TestRequest::post().uri(path), headers)
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    send_request(req, configure).await
}

pub async fn patch_request<F>(headers: &[(&str, &str)], path: &str, body: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let req = with_headers(TestRequest::patch().uri(path), headers)
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    send_request(req, configure).await
}

/// Runs the request and returns the status and body. Errors raised by middleware are rendered the way the server
/// would render them.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().app_data(json_config()).app_data(query_config()).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let (_, res) = res.into_parts();
            let status = res.status();
            let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
            (status, body)
        },
        Err(e) => {
            let status = ResponseError::status_code(e.as_response_error());
            (status, e.to_string())
        },
    }
}

fn with_headers(mut req: TestRequest, headers: &[(&str, &str)]) -> TestRequest {
    for (name, value) in headers {
        req = req.insert_header((*name, *value));
    }
    req
}
