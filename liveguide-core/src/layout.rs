use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Serialize;

use crate::config::LayoutConfig;
use crate::models::Channel;
use crate::models::ChannelProgramAggregate;
use crate::models::Program;
use crate::models::TimeWindow;

/// Maps programs in a time window onto the x-axis of the guide grid.
///
/// Offsets are relative to the start of the timeline, which begins right after
/// the channel column, except for [`GridLayout::now_indicator()`] which returns
/// a position in the viewport.
#[derive(Clone, Debug, PartialEq)]
pub struct GridLayout {
    pub pixels_per_minute: f64,
    pub min_cell_width: f64,
    pub channel_column_width: f64,
    pub time_slot_interval: Duration,
}

impl GridLayout {
    /// Geometry of a program.
    ///
    /// Short programs are widened up to `min_cell_width`.  Programs themselves
    /// are never modified.
    pub fn cell(&self, program: &Program, window: &TimeWindow) -> ProgramCell {
        ProgramCell {
            offset: self.pixels(program.start_at - window.start),
            width: self
                .pixels(program.duration())
                .max(self.min_cell_width),
        }
    }

    pub fn row<'a>(
        &self,
        aggregate: &'a ChannelProgramAggregate,
        window: &TimeWindow,
        now: DateTime<Utc>,
    ) -> Row<'a> {
        let cells: Vec<_> = aggregate
            .programs
            .iter()
            .map(|program| RowCell {
                program,
                cell: self.cell(program, window),
                airing: program.is_airing(now),
                progress: program.progress(now),
            })
            .collect();
        let current = cells.iter().position(|cell| cell.airing);
        Row {
            channel: &aggregate.channel,
            cells,
            current,
        }
    }

    /// Header markers every `time_slot_interval`.  Empty if the interval is
    /// not positive.
    pub fn time_slots(&self, window: &TimeWindow) -> Vec<TimeSlot> {
        if self.time_slot_interval <= Duration::zero() {
            return vec![];
        }
        let width = self.pixels(self.time_slot_interval);
        let mut slots = vec![];
        let mut start_at = window.start;
        while start_at <= window.end {
            slots.push(TimeSlot {
                start_at,
                offset: self.pixels(start_at - window.start),
                width,
            });
            start_at = match start_at.checked_add_signed(self.time_slot_interval) {
                Some(next) => next,
                None => break,
            };
        }
        slots
    }

    /// Returns the x position of the current time in the viewport if visible.
    pub fn now_indicator(
        &self,
        window: &TimeWindow,
        now: DateTime<Utc>,
        viewport_width: f64,
    ) -> Option<f64> {
        if now < window.start {
            return None;
        }
        let x = self.channel_column_width + self.pixels(now - window.start);
        if x < self.channel_column_width || x > viewport_width {
            return None;
        }
        Some(x)
    }

    pub fn timeline_width(&self, window: &TimeWindow) -> f64 {
        self.pixels(window.duration())
    }

    fn pixels(&self, duration: Duration) -> f64 {
        minutes(duration) * self.pixels_per_minute
    }
}

impl From<&LayoutConfig> for GridLayout {
    fn from(config: &LayoutConfig) -> Self {
        GridLayout {
            pixels_per_minute: config.pixels_per_minute,
            min_cell_width: config.min_cell_width,
            channel_column_width: config.channel_column_width,
            // Falls back to the maximum for an interval too long to be
            // represented.
            time_slot_interval: Duration::from_std(config.time_slot_interval)
                .unwrap_or(Duration::MAX),
        }
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        GridLayout::from(&LayoutConfig::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramCell {
    pub offset: f64,
    pub width: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowCell<'a> {
    pub program: &'a Program,
    #[serde(flatten)]
    pub cell: ProgramCell,
    pub airing: bool,
    pub progress: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row<'a> {
    pub channel: &'a Channel,
    pub cells: Vec<RowCell<'a>>,
    /// The index of the cell on air, used as the scroll anchor.
    pub current: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start_at: DateTime<Utc>,
    pub offset: f64,
    pub width: f64,
}

// Fractional minutes.
fn minutes(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 60_000.0
}

// </coverage:exclude>
