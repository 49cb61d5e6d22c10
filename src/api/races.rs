use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    candidate::{Candidate, CandidateSpec},
    mongodb::Id,
    race::{Race, RaceSpec, RaceUpdate},
};
use crate::services::{ElectionEngine, RaceDetail};
use crate::store::ActorContext;

pub fn routes() -> Vec<Route> {
    routes![
        create_race,
        get_race,
        races_for_election,
        update_race,
        delete_race,
        add_candidate,
        update_candidate,
        set_candidate_approval,
        remove_candidate,
    ]
}

/// Body of a candidate approval change.
#[derive(Debug, Serialize, Deserialize)]
struct ApprovalSpec {
    approved: bool,
}

#[post("/races", data = "<spec>", format = "json")]
async fn create_race(
    ctx: ActorContext,
    spec: Json<RaceSpec>,
    engine: &State<ElectionEngine>,
) -> Result<Json<Race>> {
    engine.create_race(&ctx, spec.0).await.map(Json)
}

#[get("/races/<race_id>")]
async fn get_race(
    ctx: ActorContext,
    race_id: Id,
    engine: &State<ElectionEngine>,
) -> Result<Json<RaceDetail>> {
    engine.race_detail(&ctx, race_id).await.map(Json)
}

#[get("/races/election/<election_id>")]
async fn races_for_election(
    ctx: ActorContext,
    election_id: Id,
    engine: &State<ElectionEngine>,
) -> Result<Json<Vec<RaceDetail>>> {
    engine.races_for_election(&ctx, election_id).await.map(Json)
}

#[put("/races/<race_id>", data = "<update>", format = "json")]
async fn update_race(
    ctx: ActorContext,
    race_id: Id,
    update: Json<RaceUpdate>,
    engine: &State<ElectionEngine>,
) -> Result<Json<Race>> {
    engine.update_race(&ctx, race_id, update.0).await.map(Json)
}

#[delete("/races/<race_id>")]
async fn delete_race(ctx: ActorContext, race_id: Id, engine: &State<ElectionEngine>) -> Result<()> {
    engine.delete_race(&ctx, race_id).await
}

#[post("/races/<race_id>/candidates", data = "<spec>", format = "json")]
async fn add_candidate(
    ctx: ActorContext,
    race_id: Id,
    spec: Json<CandidateSpec>,
    engine: &State<ElectionEngine>,
) -> Result<Json<Candidate>> {
    engine.add_candidate(&ctx, race_id, spec.0).await.map(Json)
}

#[put(
    "/races/<_race_id>/candidates/<candidate_id>",
    data = "<spec>",
    format = "json"
)]
async fn update_candidate(
    ctx: ActorContext,
    _race_id: Id,
    candidate_id: Id,
    spec: Json<CandidateSpec>,
    engine: &State<ElectionEngine>,
) -> Result<Json<Candidate>> {
    engine
        .update_candidate(&ctx, candidate_id, spec.0)
        .await
        .map(Json)
}

#[put(
    "/races/<_race_id>/candidates/<candidate_id>/approval",
    data = "<spec>",
    format = "json"
)]
async fn set_candidate_approval(
    ctx: ActorContext,
    _race_id: Id,
    candidate_id: Id,
    spec: Json<ApprovalSpec>,
    engine: &State<ElectionEngine>,
) -> Result<Json<Candidate>> {
    engine
        .set_candidate_approval(&ctx, candidate_id, spec.approved)
        .await
        .map(Json)
}

#[delete("/races/<_race_id>/candidates/<candidate_id>")]
async fn remove_candidate(
    ctx: ActorContext,
    _race_id: Id,
    candidate_id: Id,
    engine: &State<ElectionEngine>,
) -> Result<()> {
    engine.remove_candidate(&ctx, candidate_id).await
}
