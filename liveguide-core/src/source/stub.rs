// <coverage:exclude>
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use tokio::sync::Semaphore;

use super::*;

#[derive(Clone, Default)]
pub(crate) struct SourceStub(Arc<Inner>);

#[derive(Default)]
struct Inner {
    // `None` makes the fetch fail.
    channels: Mutex<Option<Vec<Channel>>>,
    programs: Mutex<Option<Vec<Program>>>,
    // FetchChannels waits for a permit if this is set.
    gate: Option<Semaphore>,
    fetch_channels_count: AtomicUsize,
    fetch_programs_count: AtomicUsize,
    last_fetch_programs: Mutex<Option<FetchPrograms>>,
}

impl SourceStub {
    pub(crate) fn new(channels: Option<Vec<Channel>>, programs: Option<Vec<Program>>) -> Self {
        SourceStub(Arc::new(Inner {
            channels: Mutex::new(channels),
            programs: Mutex::new(programs),
            ..Default::default()
        }))
    }

    pub(crate) fn gated(channels: Option<Vec<Channel>>, programs: Option<Vec<Program>>) -> Self {
        SourceStub(Arc::new(Inner {
            channels: Mutex::new(channels),
            programs: Mutex::new(programs),
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        }))
    }

    pub(crate) fn open_gate(&self) {
        if let Some(ref gate) = self.0.gate {
            gate.add_permits(1);
        }
    }

    pub(crate) fn set_channels(&self, channels: Option<Vec<Channel>>) {
        *self.0.channels.lock().unwrap() = channels;
    }

    pub(crate) fn fetch_channels_count(&self) -> usize {
        self.0.fetch_channels_count.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_programs_count(&self) -> usize {
        self.0.fetch_programs_count.load(Ordering::SeqCst)
    }

    pub(crate) fn last_fetch_programs(&self) -> Option<FetchPrograms> {
        self.0.last_fetch_programs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Call<FetchChannels> for SourceStub {
    async fn call(&self, _msg: FetchChannels) -> actlet::Result<<FetchChannels as Message>::Reply> {
        self.0.fetch_channels_count.fetch_add(1, Ordering::SeqCst);
        if let Some(ref gate) = self.0.gate {
            gate.acquire().await.unwrap().forget();
        }
        match self.0.channels.lock().unwrap().clone() {
            Some(channels) => Ok(Ok(channels)),
            None => Ok(Err(Error::UnexpectedStatus(
                reqwest::StatusCode::SERVICE_UNAVAILABLE,
            ))),
        }
    }
}

#[async_trait]
impl Call<FetchPrograms> for SourceStub {
    async fn call(&self, msg: FetchPrograms) -> actlet::Result<<FetchPrograms as Message>::Reply> {
        self.0.fetch_programs_count.fetch_add(1, Ordering::SeqCst);
        *self.0.last_fetch_programs.lock().unwrap() = Some(msg);
        match self.0.programs.lock().unwrap().clone() {
            Some(programs) => Ok(Ok(programs)),
            None => Ok(Err(Error::UnexpectedStatus(
                reqwest::StatusCode::SERVICE_UNAVAILABLE,
            ))),
        }
    }
}
// </coverage:exclude>
