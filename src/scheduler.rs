//! The background election scheduler.
//!
//! One repeating task per process asks the store to transition any elections
//! whose scheduled start or end time has passed. Transitions are
//! status-guarded and idempotent at the store level, so a failed or repeated
//! pass can never corrupt a lifecycle; failed passes are simply logged and
//! the next tick retries.

use std::sync::{Arc, Mutex as SyncMutex};

use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::{
        self,
        sync::Mutex,
        task::JoinHandle,
        time::{interval, Duration, MissedTickBehavior},
    },
    Build, Orbit, Rocket,
};

use crate::config::Config;
use crate::error::Result;
use crate::store::{BallotStore, ElectionTransition};

pub struct ElectionScheduler {
    store: Arc<dyn BallotStore>,
    tick_interval: Duration,
    /// Held for the duration of a pass: a pass that overruns its interval
    /// delays the next one, it never overlaps it.
    pass_lock: Arc<Mutex<()>>,
    handle: SyncMutex<Option<JoinHandle<()>>>,
}

impl ElectionScheduler {
    pub fn new(store: Arc<dyn BallotStore>, tick_interval: Duration) -> Self {
        Self {
            store,
            tick_interval,
            pass_lock: Arc::new(Mutex::new(())),
            handle: SyncMutex::new(None),
        }
    }

    /// Start the repeating task. The first pass runs immediately, picking up
    /// anything that became due while the server was down. Calling `start`
    /// on a running scheduler is a no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock().unwrap();
        if handle.is_some() {
            warn!("Election scheduler already running");
            return;
        }
        let store = Arc::clone(&self.store);
        let pass_lock = Arc::clone(&self.pass_lock);
        let tick_interval = self.tick_interval;
        *handle = Some(tokio::spawn(async move {
            let mut ticker = interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // A failed pass is logged and dropped; the next tick retries
                // independently, so a store outage never kills the loop.
                if let Err(e) = Self::run_pass(&*store, &pass_lock).await {
                    error!("Election scheduler pass failed: {e}");
                }
            }
        }));
        info!(
            "Election scheduler started (tick interval {}s)",
            self.tick_interval.as_secs()
        );
    }

    /// Stop the repeating task. Safe to call on a stopped scheduler.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
            info!("Election scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().unwrap().is_some()
    }

    /// Run one pass out of band, e.g. from the operational trigger endpoint.
    /// Shares the single-flight lock with the repeating task.
    pub async fn trigger_now(&self) -> Result<Vec<ElectionTransition>> {
        debug!("Manually triggering election scheduler");
        Self::run_pass(&*self.store, &self.pass_lock).await
    }

    async fn run_pass(
        store: &dyn BallotStore,
        pass_lock: &Mutex<()>,
    ) -> Result<Vec<ElectionTransition>> {
        let _guard = pass_lock.lock().await;
        let transitions = store.process_due_elections().await?;
        for transition in &transitions {
            info!(
                "Election {}: \"{}\" ({})",
                transition.action, transition.name, transition.election_id
            );
        }
        Ok(transitions)
    }
}

/// A fairing that builds the scheduler at ignite (it needs the managed store
/// and config), starts it at liftoff, and stops it on shutdown. Must be
/// attached after the store fairing.
pub struct SchedulerFairing;

#[rocket::async_trait]
impl Fairing for SchedulerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election Scheduler",
            kind: Kind::Ignite | Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (store, config) = match (
            rocket.state::<Arc<dyn BallotStore>>(),
            rocket.state::<Config>(),
        ) {
            (Some(store), Some(config)) => (store.clone(), config),
            _ => {
                error!("Store or config was not available when building the scheduler");
                return Err(rocket);
            }
        };
        let scheduler = Arc::new(ElectionScheduler::new(store, config.scheduler_interval()));
        Ok(rocket.manage(scheduler))
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        // Unwrap is safe: on_ignite always manages the scheduler.
        rocket.state::<Arc<ElectionScheduler>>().unwrap().start();
    }

    async fn on_shutdown(&self, rocket: &Rocket<Orbit>) {
        rocket.state::<Arc<ElectionScheduler>>().unwrap().stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration as ChronoDuration, Utc};

    use crate::model::election::{ElectionCore, ElectionState};
    use crate::model::mongodb::Id;
    use crate::store::memory::MemoryBallotStore;
    use crate::store::{ActorContext, TransitionAction};

    fn ctx() -> ActorContext {
        ActorContext {
            user_id: Id::new(),
            request_id: "req0".to_string(),
        }
    }

    /// A draft election scheduled for the given window, created directly
    /// through the store.
    async fn scheduled_election(
        store: &MemoryBallotStore,
        start_offset_ms: i64,
        end_offset_ms: i64,
    ) -> Id {
        let ctx = ctx();
        let election = store
            .create_election(
                &ctx,
                ElectionCore::new(Id::new(), "Committee 2026".to_string(), None, ctx.user_id),
            )
            .await
            .unwrap();
        store
            .schedule_election(
                &ctx,
                election.id,
                Utc::now() + ChronoDuration::milliseconds(start_offset_ms),
                Utc::now() + ChronoDuration::milliseconds(end_offset_ms),
            )
            .await
            .unwrap();
        election.id
    }

    #[rocket::async_test]
    async fn opens_then_closes_due_election() {
        let store = Arc::new(MemoryBallotStore::new());
        let scheduler = ElectionScheduler::new(store.clone(), Duration::from_secs(60));
        let id = scheduled_election(&store, -1000, 50).await;

        // First pass: start time has passed, end time has not.
        let transitions = scheduler.trigger_now().await.unwrap();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].election_id, id);
        assert_eq!(transitions[0].action, TransitionAction::Opened);
        let election = store.election(id).await.unwrap().unwrap();
        assert_eq!(election.state, ElectionState::Open);
        assert!(election.opened_at.is_some());

        // Second pass after the end time: the election closes, having passed
        // through Open.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let transitions = scheduler.trigger_now().await.unwrap();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].action, TransitionAction::Closed);
        let election = store.election(id).await.unwrap().unwrap();
        assert_eq!(election.state, ElectionState::Closed);
        assert!(election.closed_at.is_some());
    }

    #[rocket::async_test]
    async fn repeated_pass_is_idempotent() {
        let store = Arc::new(MemoryBallotStore::new());
        let scheduler = ElectionScheduler::new(store.clone(), Duration::from_secs(60));
        scheduled_election(&store, -1000, 60_000).await;

        let transitions = scheduler.trigger_now().await.unwrap();
        assert_eq!(transitions.len(), 1);

        // Nothing newly due: the second pass reports no transitions.
        let transitions = scheduler.trigger_now().await.unwrap();
        assert!(transitions.is_empty());
    }

    #[rocket::async_test]
    async fn pass_ignores_elections_without_end_time() {
        let store = Arc::new(MemoryBallotStore::new());
        let scheduler = ElectionScheduler::new(store.clone(), Duration::from_secs(60));

        // Manually opened election with no end time: never auto-closed.
        let ctx = ctx();
        let election = store
            .create_election(
                &ctx,
                ElectionCore::new(Id::new(), "Open-ended".to_string(), None, ctx.user_id),
            )
            .await
            .unwrap();
        store.open_election(&ctx, election.id).await.unwrap();

        let transitions = scheduler.trigger_now().await.unwrap();
        assert!(transitions.is_empty());
        let election = store.election(election.id).await.unwrap().unwrap();
        assert_eq!(election.state, ElectionState::Open);
    }

    #[rocket::async_test]
    async fn store_failure_does_not_kill_the_loop() {
        let store = Arc::new(MemoryBallotStore::new());
        let id = scheduled_election(&store, -1000, 60_000).await;
        store.fail_next_process();

        let scheduler = ElectionScheduler::new(store.clone(), Duration::from_millis(20));
        scheduler.start();

        // First pass fails with the injected error; a later tick retries and
        // opens the election anyway.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let election = store.election(id).await.unwrap().unwrap();
        assert_eq!(election.state, ElectionState::Open);
        assert!(scheduler.is_running());

        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[rocket::async_test]
    async fn start_is_idempotent_and_stop_is_safe_twice() {
        let store = Arc::new(MemoryBallotStore::new());
        let scheduler = ElectionScheduler::new(store, Duration::from_secs(60));

        scheduler.start();
        scheduler.start();
        assert!(scheduler.is_running());

        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());
    }
}
