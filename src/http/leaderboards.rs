use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{routes, Build, Rocket, State};

use crate::domain::{CreateLeaderboardRequest, LeaderboardConfig, LeaderboardStats, RankEntry};
use crate::engine::RankingEngine;
use crate::util::error::ApiErrorResponder;
use crate::util::responder::JsonResponder;

#[post("/", format = "json", data = "<request>")]
async fn create_leaderboard(
    engine: &State<Arc<RankingEngine>>,
    request: Json<CreateLeaderboardRequest>,
) -> Result<JsonResponder<LeaderboardConfig>, ApiErrorResponder> {
    let config = engine.create_leaderboard(request.0).await?;
    Ok(JsonResponder::from(config, Status::Created))
}

#[get("/")]
async fn list_leaderboards(engine: &State<Arc<RankingEngine>>) -> Result<Json<Vec<LeaderboardConfig>>, ApiErrorResponder> {
    Ok(Json(engine.list_leaderboards().await?))
}

#[get("/<leaderboard_id>")]
async fn get_leaderboard(
    engine: &State<Arc<RankingEngine>>,
    leaderboard_id: &str,
) -> Result<JsonResponder<LeaderboardConfig>, ApiErrorResponder> {
    Ok(JsonResponder::ok(engine.get_leaderboard(leaderboard_id).await?))
}

#[delete("/<leaderboard_id>")]
async fn delete_leaderboard(engine: &State<Arc<RankingEngine>>, leaderboard_id: &str) -> Result<(), ApiErrorResponder> {
    engine.delete_leaderboard(leaderboard_id).await?;
    Ok(())
}

#[post("/<leaderboard_id>/reset")]
async fn reset_leaderboard(engine: &State<Arc<RankingEngine>>, leaderboard_id: &str) -> Result<(), ApiErrorResponder> {
    engine.reset_leaderboard(leaderboard_id).await?;
    Ok(())
}

#[get("/<leaderboard_id>/stats")]
async fn leaderboard_stats(
    engine: &State<Arc<RankingEngine>>,
    leaderboard_id: &str,
) -> Result<JsonResponder<LeaderboardStats>, ApiErrorResponder> {
    Ok(JsonResponder::ok(engine.stats(leaderboard_id).await?))
}

#[get("/<leaderboard_id>/top?<limit>")]
async fn top(
    engine: &State<Arc<RankingEngine>>,
    leaderboard_id: &str,
    limit: Option<u64>,
) -> Result<Json<Vec<RankEntry>>, ApiErrorResponder> {
    Ok(Json(engine.top(leaderboard_id, limit).await?))
}

#[get("/<leaderboard_id>/range?<start>&<end>")]
async fn range(
    engine: &State<Arc<RankingEngine>>,
    leaderboard_id: &str,
    start: u64,
    end: u64,
) -> Result<Json<Vec<RankEntry>>, ApiErrorResponder> {
    Ok(Json(engine.range(leaderboard_id, start, end).await?))
}

#[get("/<leaderboard_id>/players/<player_id>/around?<radius>")]
async fn around(
    engine: &State<Arc<RankingEngine>>,
    leaderboard_id: &str,
    player_id: &str,
    radius: Option<u64>,
) -> Result<Json<Vec<RankEntry>>, ApiErrorResponder> {
    Ok(Json(engine.around(leaderboard_id, player_id, radius.unwrap_or(5)).await?))
}

#[get("/<leaderboard_id>/players/<player_id>")]
async fn player_rank(
    engine: &State<Arc<RankingEngine>>,
    leaderboard_id: &str,
    player_id: &str,
) -> Result<JsonResponder<RankEntry>, ApiErrorResponder> {
    Ok(JsonResponder::ok(engine.player_rank(leaderboard_id, player_id).await?))
}

#[delete("/<leaderboard_id>/players/<player_id>")]
async fn remove_player(
    engine: &State<Arc<RankingEngine>>,
    leaderboard_id: &str,
    player_id: &str,
) -> Result<(), ApiErrorResponder> {
    engine.remove_player(leaderboard_id, player_id).await?;
    Ok(())
}

pub fn mount(rocket_build: Rocket<Build>) -> Rocket<Build> {
    rocket_build.mount(
        "/leaderboards",
        routes![
            create_leaderboard,
            list_leaderboards,
            get_leaderboard,
            delete_leaderboard,
            reset_leaderboard,
            leaderboard_stats,
            top,
            range,
            around,
            player_rank,
            remove_player,
        ],
    )
}
