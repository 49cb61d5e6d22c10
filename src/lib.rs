#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod scheduler;
pub mod services;
pub mod store;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;
use rocket::{Build, Rocket};
use scheduler::SchedulerFairing;
use store::mongo::StoreFairing;

/// Assemble the server. Fairing order matters: config first, then the
/// database connection, then the store and services built on it, then the
/// scheduler that watches the store.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(StoreFairing)
        .attach(SchedulerFairing)
}

/// Assemble a server around an arbitrary store, skipping the database and
/// scheduler fairings. Used by the route-level tests to run against the
/// in-memory store.
#[cfg(test)]
pub(crate) fn rocket_for_store(store: std::sync::Arc<dyn store::BallotStore>) -> Rocket<Build> {
    use services::{ElectionEngine, VoteService};

    let scheduler = std::sync::Arc::new(scheduler::ElectionScheduler::new(
        store.clone(),
        std::time::Duration::from_secs(60),
    ));
    rocket::build()
        .mount("/", api::routes())
        .manage(Config::for_tests())
        .manage(ElectionEngine::new(store.clone()))
        .manage(VoteService::new(store.clone()))
        .manage(scheduler)
        .manage(store)
}
