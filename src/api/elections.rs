use std::sync::Arc;

use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    auth::AuthToken,
    election::{Election, ElectionSpec, ElectionUpdate, ScheduleSpec},
    mongodb::Id,
};
use crate::scheduler::ElectionScheduler;
use crate::services::{ElectionDetail, ElectionEngine};
use crate::store::{ActorContext, ElectionTransition};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        list_elections,
        get_election,
        update_election,
        schedule_election,
        open_election,
        close_election,
        delete_election,
        run_scheduler,
    ]
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    ctx: ActorContext,
    spec: Json<ElectionSpec>,
    engine: &State<ElectionEngine>,
) -> Result<Json<Election>> {
    engine.create(&ctx, spec.0).await.map(Json)
}

#[get("/elections?<organization_id>")]
async fn list_elections(
    ctx: ActorContext,
    organization_id: Id,
    engine: &State<ElectionEngine>,
) -> Result<Json<Vec<Election>>> {
    engine.list(&ctx, organization_id).await.map(Json)
}

#[get("/elections/<election_id>")]
async fn get_election(
    ctx: ActorContext,
    election_id: Id,
    engine: &State<ElectionEngine>,
) -> Result<Json<ElectionDetail>> {
    engine.detail(&ctx, election_id).await.map(Json)
}

#[put("/elections/<election_id>", data = "<update>", format = "json")]
async fn update_election(
    ctx: ActorContext,
    election_id: Id,
    update: Json<ElectionUpdate>,
    engine: &State<ElectionEngine>,
) -> Result<Json<Election>> {
    engine.update(&ctx, election_id, update.0).await.map(Json)
}

#[post("/elections/<election_id>/schedule", data = "<spec>", format = "json")]
async fn schedule_election(
    ctx: ActorContext,
    election_id: Id,
    spec: Json<ScheduleSpec>,
    engine: &State<ElectionEngine>,
) -> Result<Json<Election>> {
    engine.schedule(&ctx, election_id, spec.0).await.map(Json)
}

#[post("/elections/<election_id>/open")]
async fn open_election(
    ctx: ActorContext,
    election_id: Id,
    engine: &State<ElectionEngine>,
) -> Result<Json<Election>> {
    engine.open(&ctx, election_id).await.map(Json)
}

#[post("/elections/<election_id>/close")]
async fn close_election(
    ctx: ActorContext,
    election_id: Id,
    engine: &State<ElectionEngine>,
) -> Result<Json<Election>> {
    engine.close(&ctx, election_id).await.map(Json)
}

#[delete("/elections/<election_id>")]
async fn delete_election(
    ctx: ActorContext,
    election_id: Id,
    engine: &State<ElectionEngine>,
) -> Result<()> {
    engine.delete(&ctx, election_id).await
}

/// Operational entry point: run one scheduler pass right now instead of
/// waiting for the next tick. Idempotent, so any authenticated user is
/// harmless; the pass is logged like a timed one.
#[post("/scheduler/run")]
async fn run_scheduler(
    _token: AuthToken,
    scheduler: &State<Arc<ElectionScheduler>>,
) -> Result<Json<Vec<ElectionTransition>>> {
    scheduler.trigger_now().await.map(Json)
}
