use rocket::serde::json::Json;
use rocket::{routes, Build, Rocket};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[get("/health")]
fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[get("/ready")]
fn ready() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ready" })
}

pub fn mount(rocket_build: Rocket<Build>) -> Rocket<Build> {
    rocket_build.mount("/", routes![health, ready])
}
