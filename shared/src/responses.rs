use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

/// JSON response with the CORS header every endpoint carries.
pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(body)?.into())
        .map_err(Box::new)?)
}

pub fn error(status: StatusCode, message: &str) -> Result<Response<Body>, Error> {
    json(status, &serde_json::json!({ "error": message }))
}

pub fn not_found() -> Result<Response<Body>, Error> {
    error(StatusCode::NOT_FOUND, "Not found")
}

pub fn method_not_allowed() -> Result<Response<Body>, Error> {
    error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

pub fn preflight() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Methods",
            "GET,POST,PUT,PATCH,OPTIONS",
        )
        .header(
            "Access-Control-Allow-Headers",
            "Content-Type,Authorization",
        )
        .body(Body::Empty)
        .map_err(Box::new)?)
}
