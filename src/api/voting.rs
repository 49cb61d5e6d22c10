use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    mongodb::Id,
    results::{ElectionResults, RaceResults},
    vote::CastVoteSpec,
    voter::Voter,
};
use crate::services::VoteService;
use crate::store::ActorContext;

pub fn routes() -> Vec<Route> {
    routes![
        register_voter,
        approve_voter,
        voter_status,
        pending_voters,
        cast_vote,
        race_results,
        election_results,
    ]
}

/// Body of a self-registration request.
#[derive(Debug, Serialize, Deserialize)]
struct RegisterSpec {
    organization_id: Id,
}

/// Body of an approval request.
#[derive(Debug, Serialize, Deserialize)]
struct ApproveSpec {
    organization_id: Id,
    user_id: Id,
}

/// The actor's registration state in one organization.
#[derive(Debug, Serialize, Deserialize)]
struct VoterStatus {
    registered: bool,
    voter: Option<Voter>,
}

/// Receipt for a successfully recorded vote.
#[derive(Debug, Serialize, Deserialize)]
struct VoteReceipt {
    vote_id: Id,
}

#[post("/voting/register", data = "<spec>", format = "json")]
async fn register_voter(
    ctx: ActorContext,
    spec: Json<RegisterSpec>,
    votes: &State<VoteService>,
) -> Result<Json<Voter>> {
    votes.register(&ctx, spec.organization_id).await.map(Json)
}

#[post("/voting/approve", data = "<spec>", format = "json")]
async fn approve_voter(
    ctx: ActorContext,
    spec: Json<ApproveSpec>,
    votes: &State<VoteService>,
) -> Result<Json<Voter>> {
    votes
        .approve(&ctx, spec.organization_id, spec.user_id)
        .await
        .map(Json)
}

#[get("/voting/status?<organization_id>")]
async fn voter_status(
    ctx: ActorContext,
    organization_id: Id,
    votes: &State<VoteService>,
) -> Result<Json<VoterStatus>> {
    let voter = votes.status(&ctx, organization_id).await?;
    Ok(Json(VoterStatus {
        registered: voter.is_some(),
        voter,
    }))
}

#[get("/voting/pending?<organization_id>")]
async fn pending_voters(
    ctx: ActorContext,
    organization_id: Id,
    votes: &State<VoteService>,
) -> Result<Json<Vec<Voter>>> {
    votes.pending(&ctx, organization_id).await.map(Json)
}

#[post("/voting/cast", data = "<spec>", format = "json")]
async fn cast_vote(
    ctx: ActorContext,
    spec: Json<CastVoteSpec>,
    votes: &State<VoteService>,
) -> Result<Json<VoteReceipt>> {
    let vote_id = votes.cast_vote(&ctx, spec.0).await?;
    Ok(Json(VoteReceipt { vote_id }))
}

#[get("/voting/results?<election_id>&<race_id>")]
async fn race_results(
    ctx: ActorContext,
    election_id: Id,
    race_id: Id,
    votes: &State<VoteService>,
) -> Result<Json<RaceResults>> {
    votes
        .race_results(&ctx, election_id, race_id)
        .await
        .map(Json)
}

#[get("/voting/election-results/<election_id>")]
async fn election_results(
    ctx: ActorContext,
    election_id: Id,
    votes: &State<VoteService>,
) -> Result<Json<ElectionResults>> {
    votes.election_results(&ctx, election_id).await.map(Json)
}
