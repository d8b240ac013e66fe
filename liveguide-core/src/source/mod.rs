mod jellyfin;

use actlet::prelude::*;

use crate::error::Error;
use crate::models::Channel;
use crate::models::ChannelId;
use crate::models::Program;
use crate::models::Session;
use crate::models::TimeWindow;

pub use jellyfin::JellyfinSource;

#[cfg(test)]
pub(crate) mod stub;

// fetch channels

/// Fetches all channels sorted by name.
#[derive(Clone, Message)]
#[reply("Result<Vec<Channel>, Error>")]
pub struct FetchChannels {
    pub session: Session,
}

// fetch programs

/// Fetches programs overlapping `window` on `channel_ids`, sorted by start.
///
/// A program overlaps the window if it ends after `window.start` and starts
/// before `window.end`.
#[derive(Clone, Message)]
#[reply("Result<Vec<Program>, Error>")]
pub struct FetchPrograms {
    pub session: Session,
    pub channel_ids: Vec<ChannelId>,
    pub window: TimeWindow,
}
