mod aggregator;
mod window;

use std::sync::Arc;

use actlet::prelude::*;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::error::Error;
use crate::models::ChannelProgramAggregate;
use crate::models::RefreshState;
use crate::models::Session;
use crate::models::TimeWindow;
use crate::source::FetchChannels;
use crate::source::FetchPrograms;
use crate::source::JellyfinSource;

pub use aggregator::Aggregation;
pub use aggregator::aggregate;
pub use window::compute_window;
pub use window::compute_window_with;

/// Spawns a [`JellyfinSource`] and a [`Guide`] fed by it.
pub async fn start<C: Spawn>(
    ctx: &C,
    config: Arc<Config>,
) -> Result<Address<Guide<Address<JellyfinSource>>>, Error> {
    let source = ctx
        .spawn_actor(JellyfinSource::new(config.clone())?)
        .await;
    let session = Session::new(config.server.user_id.clone());
    Ok(ctx.spawn_actor(Guide::new(config, session, source)).await)
}

/// What the guide shows.
///
/// A new snapshot replaces the previous one as a whole.  Readers never observe
/// a partially updated snapshot.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideSnapshot {
    /// The refresh attempt which produced this snapshot.  `0` before the first
    /// attempt.
    pub attempt: u64,
    #[serde(flatten)]
    pub state: RefreshState,
    /// The last successfully fetched aggregates.
    pub channel_programs: Arc<Vec<ChannelProgramAggregate>>,
    /// The window used for `channel_programs`.
    pub window: Option<TimeWindow>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl GuideSnapshot {
    fn initial() -> Self {
        GuideSnapshot {
            attempt: 0,
            state: RefreshState::Initial,
            channel_programs: Default::default(),
            window: None,
            updated_at: None,
        }
    }

    // Keeps the last known good content.
    fn transit(&self, attempt: u64, state: RefreshState) -> Self {
        GuideSnapshot {
            attempt,
            state,
            channel_programs: self.channel_programs.clone(),
            window: self.window,
            updated_at: self.updated_at,
        }
    }
}

pub struct Guide<S> {
    config: Arc<Config>,
    session: Session,
    source: S,
    snapshot: Arc<GuideSnapshot>,
    last_attempt: u64,
    in_flight: Option<u64>,
    emitters: EmitterRegistry<GuideUpdated>,
}

impl<S> Guide<S> {
    pub fn new(config: Arc<Config>, session: Session, source: S) -> Self {
        Guide {
            config,
            session,
            source,
            snapshot: Arc::new(GuideSnapshot::initial()),
            last_attempt: 0,
            in_flight: None,
            emitters: Default::default(),
        }
    }
}

impl<S> Guide<S>
where
    S: Clone + Send + Sync + 'static,
    S: Call<FetchChannels>,
    S: Call<FetchPrograms>,
{
    fn compute_window(&self, now: DateTime<Utc>) -> Result<TimeWindow, Error> {
        let past = chrono::Duration::from_std(self.config.guide.past)
            .map_err(|_| Error::WindowOutOfRange)?;
        let future = chrono::Duration::from_std(self.config.guide.future)
            .map_err(|_| Error::WindowOutOfRange)?;
        compute_window_with(now, past, future).ok_or(Error::WindowOutOfRange)
    }

    async fn publish(&mut self, snapshot: GuideSnapshot) {
        self.snapshot = Arc::new(snapshot);
        self.emitters
            .emit(GuideUpdated(self.snapshot.clone()))
            .await;
    }

    async fn fetch(
        source: S,
        session: Session,
        window: TimeWindow,
    ) -> Result<Aggregation, Error> {
        let channels = source
            .call(FetchChannels {
                session: session.clone(),
            })
            .await??;
        if channels.is_empty() {
            tracing::debug!("No channel, skip fetching programs");
            return Ok(Aggregation {
                channel_programs: vec![],
                orphans: 0,
            });
        }
        let channel_ids = channels.iter().map(|channel| channel.id.clone()).collect();
        let programs = source
            .call(FetchPrograms {
                session,
                channel_ids,
                window,
            })
            .await??;
        aggregate(channels, programs)
    }
}

// actor

#[async_trait]
impl<S> Actor for Guide<S>
where
    S: Clone + Send + Sync + 'static,
    S: Call<FetchChannels>,
    S: Call<FetchPrograms>,
{
    async fn started(&mut self, ctx: &mut Context<Self>) {
        let period = self.config.guide.refresh_interval;
        let emitter: Emitter<Refresh> = ctx.emitter();
        ctx.spawn_task(async move {
            let mut timer = tokio::time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                tracing::debug!("Refresh timer fired");
                emitter.emit(Refresh).await;
            }
        });
        tracing::debug!(
            refresh_interval = %humantime::format_duration(period),
            "Started",
        );
    }

    async fn stopped(&mut self, _ctx: &mut Context<Self>) {
        tracing::debug!("Stopped");
    }
}

// refresh

/// Starts a refresh attempt unless one is already in flight.
///
/// A trigger arriving while an attempt is in flight joins that attempt.
#[derive(Clone, Message)]
pub struct Refresh;

#[async_trait]
impl<S> Handler<Refresh> for Guide<S>
where
    S: Clone + Send + Sync + 'static,
    S: Call<FetchChannels>,
    S: Call<FetchPrograms>,
{
    async fn handle(&mut self, _msg: Refresh, ctx: &mut Context<Self>) {
        tracing::debug!(msg.name = "Refresh");
        if let Some(attempt) = self.in_flight {
            tracing::debug!(attempt, "Already refreshing, joined");
            return;
        }

        self.last_attempt += 1;
        let attempt = self.last_attempt;
        self.in_flight = Some(attempt);

        let snapshot = self.snapshot.transit(attempt, RefreshState::Refreshing);
        self.publish(snapshot).await;

        let window = match self.compute_window(Utc::now()) {
            Ok(window) => window,
            Err(err) => {
                tracing::error!(%err, attempt, "Failed to refresh");
                self.in_flight = None;
                let snapshot = self
                    .snapshot
                    .transit(attempt, RefreshState::Error(err.to_string()));
                self.publish(snapshot).await;
                return;
            }
        };
        tracing::debug!(attempt, %window, "Refreshing");

        let source = self.source.clone();
        let session = self.session.clone();
        let emitter: Emitter<RefreshDone> = ctx.emitter();
        ctx.spawn_task(async move {
            let result = Self::fetch(source, session, window).await;
            emitter
                .emit(RefreshDone {
                    attempt,
                    window,
                    result,
                })
                .await;
        });
    }
}

// refresh done

#[derive(Message)]
struct RefreshDone {
    attempt: u64,
    window: TimeWindow,
    result: Result<Aggregation, Error>,
}

#[async_trait]
impl<S> Handler<RefreshDone> for Guide<S>
where
    S: Clone + Send + Sync + 'static,
    S: Call<FetchChannels>,
    S: Call<FetchPrograms>,
{
    async fn handle(&mut self, msg: RefreshDone, _ctx: &mut Context<Self>) {
        tracing::debug!(msg.name = "RefreshDone", msg.attempt);
        if self.in_flight != Some(msg.attempt) {
            tracing::warn!(msg.attempt, in_flight = ?self.in_flight, "Stale result, discarded");
            return;
        }
        self.in_flight = None;

        let snapshot = match msg.result {
            Ok(aggregation) => {
                if aggregation.orphans > 0 {
                    tracing::warn!(
                        msg.attempt,
                        aggregation.orphans,
                        "Dropped programs on unknown channels"
                    );
                }
                tracing::info!(
                    msg.attempt,
                    %msg.window,
                    channels = aggregation.channel_programs.len(),
                    programs = aggregation.num_programs(),
                    "Refreshed",
                );
                GuideSnapshot {
                    attempt: msg.attempt,
                    state: RefreshState::Content,
                    channel_programs: Arc::new(aggregation.channel_programs),
                    window: Some(msg.window),
                    updated_at: Some(Utc::now()),
                }
            }
            Err(err) => {
                tracing::error!(%err, msg.attempt, "Failed to refresh");
                self.snapshot
                    .transit(msg.attempt, RefreshState::Error(err.to_string()))
            }
        };
        self.publish(snapshot).await;
    }
}

// query guide

#[derive(Message)]
#[reply("Arc<GuideSnapshot>")]
pub struct QueryGuide;

#[async_trait]
impl<S> Handler<QueryGuide> for Guide<S>
where
    S: Clone + Send + Sync + 'static,
    S: Call<FetchChannels>,
    S: Call<FetchPrograms>,
{
    async fn handle(
        &mut self,
        _msg: QueryGuide,
        _ctx: &mut Context<Self>,
    ) -> <QueryGuide as Message>::Reply {
        tracing::debug!(msg.name = "QueryGuide");
        self.snapshot.clone()
    }
}

// register emitter

/// Registers an emitter and returns its ID.
///
/// The current snapshot is sent to the emitter soon after the registration.
#[derive(Message)]
#[reply("usize")]
pub struct RegisterEmitter(pub Emitter<GuideUpdated>);

#[async_trait]
impl<S> Handler<RegisterEmitter> for Guide<S>
where
    S: Clone + Send + Sync + 'static,
    S: Call<FetchChannels>,
    S: Call<FetchPrograms>,
{
    async fn handle(
        &mut self,
        msg: RegisterEmitter,
        _ctx: &mut Context<Self>,
    ) -> <RegisterEmitter as Message>::Reply {
        let id = self.emitters.register(msg.0.clone());
        tracing::debug!(msg.name = "RegisterEmitter", id);
        msg.0.emit(GuideUpdated(self.snapshot.clone())).await;
        id
    }
}

// unregister emitter

#[derive(Message)]
pub struct UnregisterEmitter(pub usize);

#[async_trait]
impl<S> Handler<UnregisterEmitter> for Guide<S>
where
    S: Clone + Send + Sync + 'static,
    S: Call<FetchChannels>,
    S: Call<FetchPrograms>,
{
    async fn handle(&mut self, msg: UnregisterEmitter, _ctx: &mut Context<Self>) {
        tracing::debug!(msg.name = "UnregisterEmitter", id = msg.0);
        if !self.emitters.unregister(msg.0) {
            tracing::warn!(id = msg.0, "No such emitter");
        }
    }
}

// notifications

#[derive(Clone, Message)]
pub struct GuideUpdated(pub Arc<GuideSnapshot>);

// </coverage:exclude>
