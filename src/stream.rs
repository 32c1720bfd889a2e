//! Stream-id multiplexing.
//!
//! Every in-flight request owns a stream id; responses are matched back by
//! it. Ids live in lazily created groups of 128 so that a mostly idle
//! connection touches a small dense range, and fully idle trailing groups
//! are given back by a delayed sweep instead of immediately, which keeps a
//! bursty workload from thrashing group allocation.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::frame::ProtocolVersion;

const GROUP_SIZE: i16 = 128;

/// Trailing groups freed per sweep pass.
const SWEEP_BATCH: usize = 2;

/// Ids of one group, kept as a stack so the lowest free id is reused first.
struct Group {
    free: Vec<i16>,
}

impl Group {
    fn new(index: usize) -> Self {
        // computed in i32: the last group's exclusive end (32768) does not
        // fit in i16
        let base = index as i32 * GROUP_SIZE as i32;
        // pushed high to low so pop() yields the lowest id
        let free = (base..base + GROUP_SIZE as i32)
            .rev()
            .map(|id| id as i16)
            .collect();
        Group { free }
    }

    fn is_idle(&self) -> bool {
        self.free.len() == GROUP_SIZE as usize
    }
}

struct MuxState {
    groups: Vec<Group>,
    in_use: usize,
    sweep_scheduled: bool,
}

impl MuxState {
    /// A trailing group can be dropped when it is fully idle and not the
    /// last one left.
    fn sweepable(&self) -> bool {
        self.groups.len() > 1 && self.groups.last().is_some_and(Group::is_idle)
    }
}

/// Hands out stream ids for one connection.
///
/// Cloneable handle over shared state; the sweep task holds its own
/// reference, so dropping the multiplexer never races the sweep.
#[derive(Clone)]
pub struct StreamIdMultiplexer {
    state: Arc<Mutex<MuxState>>,
    max_groups: usize,
    release_delay: Duration,
}

impl StreamIdMultiplexer {
    /// Default delay before idle trailing groups are swept.
    pub const DEFAULT_RELEASE_DELAY: Duration = Duration::from_millis(100);

    /// Create a multiplexer for the given protocol version.
    ///
    /// Below v3 stream ids are 8-bit, which caps the pool at a single group;
    /// from v3 the 16-bit id space allows 256 groups (ids 0..=32767).
    pub fn new(version: ProtocolVersion) -> Self {
        Self::with_release_delay(version, Self::DEFAULT_RELEASE_DELAY)
    }

    /// Create a multiplexer with a custom sweep delay.
    pub fn with_release_delay(version: ProtocolVersion, release_delay: Duration) -> Self {
        let max_groups = if version >= ProtocolVersion::V3 { 256 } else { 1 };
        StreamIdMultiplexer {
            state: Arc::new(Mutex::new(MuxState {
                groups: vec![Group::new(0)],
                in_use: 0,
                sweep_scheduled: false,
            })),
            max_groups,
            release_delay,
        }
    }

    /// Take the lowest free stream id, or `None` when the version's id space
    /// is exhausted.
    pub fn acquire(&self) -> Option<i16> {
        let mut state = self.state.lock();
        loop {
            if let Some(id) = state.groups.iter_mut().find_map(|g| g.free.pop()) {
                state.in_use += 1;
                return Some(id);
            }
            if state.groups.len() >= self.max_groups {
                return None;
            }
            let index = state.groups.len();
            debug!(group = index, "allocating stream id group");
            state.groups.push(Group::new(index));
        }
    }

    /// Return a stream id to the pool.
    pub fn release(&self, id: i16) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let index = match usize::try_from(id / GROUP_SIZE) {
            Ok(index) if id >= 0 => index,
            _ => {
                warn!(id, "released a negative stream id");
                return;
            }
        };
        match state.groups.get_mut(index) {
            Some(group) => {
                if group.free.contains(&id) {
                    warn!(id, "stream id released twice");
                    return;
                }
                group.free.push(id);
                state.in_use = state.in_use.saturating_sub(1);
            }
            None => {
                warn!(id, "released stream id outside any live group");
                return;
            }
        }
        let schedule = state.sweepable() && !state.sweep_scheduled;
        if schedule {
            state.sweep_scheduled = true;
        }
        drop(guard);
        if schedule {
            self.schedule_sweep();
        }
    }

    /// Stream ids currently handed out.
    pub fn in_use(&self) -> usize {
        self.state.lock().in_use
    }

    /// Live id groups, including partially used ones.
    pub fn group_count(&self) -> usize {
        self.state.lock().groups.len()
    }

    fn schedule_sweep(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let this = self.clone();
                let delay = self.release_delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    this.sweep();
                });
            }
            // no runtime to delay on: reclaim synchronously
            Err(_) => loop {
                let again = {
                    let mut state = self.state.lock();
                    state.sweep_scheduled = false;
                    sweep_trailing(&mut state);
                    if state.sweepable() {
                        state.sweep_scheduled = true;
                        true
                    } else {
                        false
                    }
                };
                if !again {
                    break;
                }
            },
        }
    }

    fn sweep(&self) {
        let reschedule = {
            let mut state = self.state.lock();
            state.sweep_scheduled = false;
            let freed = sweep_trailing(&mut state);
            debug!(freed, groups = state.groups.len(), "stream id sweep");
            if state.sweepable() {
                state.sweep_scheduled = true;
                true
            } else {
                false
            }
        };
        if reschedule {
            self.schedule_sweep();
        }
    }
}

/// Drop up to [`SWEEP_BATCH`] idle trailing groups, always keeping one group.
fn sweep_trailing(state: &mut MuxState) -> usize {
    let mut freed = 0;
    while freed < SWEEP_BATCH && state.sweepable() {
        state.groups.pop();
        freed += 1;
    }
    freed
}
