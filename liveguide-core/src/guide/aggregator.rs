use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::error::Error;
use crate::models::Channel;
use crate::models::ChannelId;
use crate::models::ChannelProgramAggregate;
use crate::models::Program;

#[derive(Debug)]
pub struct Aggregation {
    /// Sorted by channel name.
    pub channel_programs: Vec<ChannelProgramAggregate>,
    /// The number of programs dropped because their channels were not found.
    pub orphans: usize,
}

impl Aggregation {
    pub fn num_programs(&self) -> usize {
        self.channel_programs
            .iter()
            .map(|aggregate| aggregate.programs.len())
            .sum()
    }
}

/// Groups programs by channel.
///
/// Every channel yields an aggregate even if it has no program.  Sorting is
/// stable, so programs starting at the same time and channels having the same
/// name keep the fetched order.
pub fn aggregate(channels: Vec<Channel>, programs: Vec<Program>) -> Result<Aggregation, Error> {
    // Keeps the fetched order of channels.
    let mut table: IndexMap<ChannelId, ChannelProgramAggregate> =
        IndexMap::with_capacity(channels.len());
    for channel in channels.into_iter() {
        match table.entry(channel.id.clone()) {
            Entry::Occupied(entry) => return Err(Error::DuplicateChannel(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(ChannelProgramAggregate {
                    channel,
                    programs: vec![],
                });
            }
        }
    }

    let mut orphans = 0;
    for program in programs.into_iter() {
        match table.get_mut(&program.channel_id) {
            Some(aggregate) => aggregate.programs.push(program),
            None => {
                tracing::trace!(%program.id, %program.channel_id, "Orphan program, dropped");
                orphans += 1;
            }
        }
    }

    let mut channel_programs: Vec<_> = table.into_values().collect();
    for aggregate in channel_programs.iter_mut() {
        aggregate.programs.sort_by_key(|program| program.start_at);
    }
    channel_programs.sort_by(|a, b| a.channel.name.cmp(&b.channel.name));

    Ok(Aggregation {
        channel_programs,
        orphans,
    })
}

// </coverage:exclude>
