use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{routes, Build, Rocket, State};

use crate::domain::ScoreSubmission;
use crate::engine::RankingEngine;
use crate::util::error::ApiErrorResponder;
use crate::util::responder::JsonResponder;

#[post("/", format = "json", data = "<submission>")]
async fn submit_score(
    engine: &State<Arc<RankingEngine>>,
    submission: Json<ScoreSubmission>,
) -> Result<JsonResponder<i64>, ApiErrorResponder> {
    let outcome = engine.submit(submission.0).await?;
    Ok(JsonResponder::from(outcome.score, Status::Ok))
}

#[post("/batch", format = "json", data = "<submissions>")]
async fn submit_batch(
    engine: &State<Arc<RankingEngine>>,
    submissions: Json<Vec<ScoreSubmission>>,
) -> JsonResponder<Vec<Result<i64, String>>> {
    let results = engine.submit_batch(submissions.0).await;
    let results = results.into_iter().map(|r| r.map(|o| o.score).map_err(|e| e.to_string())).collect();
    JsonResponder::ok(results)
}

pub fn mount(rocket_build: Rocket<Build>) -> Rocket<Build> {
    rocket_build.mount("/scores", routes![submit_score, submit_batch])
}
