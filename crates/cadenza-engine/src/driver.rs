//! Blocking wall-clock loop feeding the scheduler.
//!
//! Commands arrive on a channel and are drained between ticks, so pedal
//! events and transport changes never interleave with a tick body.

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::output::OutputGraph;
use crate::sample_index::SampleIndex;
use crate::scheduler::{TransportError, TransportScheduler};

/// Control messages applied strictly between ticks
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Start,
    Stop,
    StopAll,
    PedalDown,
    PedalUp,
    SostenutoDown,
    SostenutoUp,
    SetBpm(f64),
    SetSwing(f32),
    Shutdown,
}

/// Run the transport loop until `Shutdown` or the command channel closes.
///
/// While running, the loop sleeps on the command channel with a timeout equal
/// to the time left until the next tick deadline; while stopped it blocks on
/// the channel outright.
pub fn run(
    scheduler: &mut TransportScheduler,
    index: &dyn SampleIndex,
    graph: &mut dyn OutputGraph,
    commands: &Receiver<Command>,
) -> Result<(), TransportError> {
    loop {
        let Some(wait) = scheduler.time_until_next_tick() else {
            // stopped: nothing to schedule, wait for the next command
            match commands.recv() {
                Ok(cmd) => {
                    if apply(scheduler, graph, cmd)? {
                        return Ok(());
                    }
                    continue;
                }
                Err(_) => return Ok(()),
            }
        };
        match commands.recv_timeout(wait) {
            Ok(cmd) => {
                if apply(scheduler, graph, cmd)? {
                    return Ok(());
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                scheduler.tick(index, graph)?;
            }
            Err(RecvTimeoutError::Disconnected) => {
                if scheduler.is_running() {
                    scheduler.stop(graph)?;
                }
                return Ok(());
            }
        }
    }
}

/// Apply one command; returns true when the loop should exit
fn apply(
    scheduler: &mut TransportScheduler,
    graph: &mut dyn OutputGraph,
    cmd: Command,
) -> Result<bool, TransportError> {
    match cmd {
        Command::Start => {
            if !scheduler.is_running() {
                scheduler.start()?;
            }
        }
        Command::Stop => {
            if scheduler.is_running() {
                scheduler.stop(graph)?;
            }
        }
        Command::StopAll => scheduler.stop_all(graph),
        Command::PedalDown => scheduler.pedal_down(),
        Command::PedalUp => scheduler.pedal_up(graph),
        Command::SostenutoDown => scheduler.sostenuto_down(),
        Command::SostenutoUp => scheduler.sostenuto_up(graph),
        Command::SetBpm(bpm) => scheduler.song_mut().bpm = bpm.max(1.0),
        Command::SetSwing(swing) => scheduler.song_mut().set_swing(swing),
        Command::Shutdown => {
            if scheduler.is_running() {
                scheduler.stop(graph)?;
            }
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::NullGraph;
    use crate::sample_index::MemorySampleIndex;
    use cadenza_core::Song;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_shutdown_exits_cleanly() {
        let mut scheduler = TransportScheduler::new(Song::new(8)).unwrap();
        let index = MemorySampleIndex::new();
        let mut graph = NullGraph::new();
        let (tx, rx) = unbounded();
        tx.send(Command::SetBpm(90.0)).unwrap();
        tx.send(Command::Shutdown).unwrap();
        run(&mut scheduler, &index, &mut graph, &rx).unwrap();
        assert_eq!(scheduler.song().bpm, 90.0);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_disconnect_stops_transport() {
        let mut scheduler = TransportScheduler::new(Song::new(8)).unwrap();
        let index = MemorySampleIndex::new();
        let mut graph = NullGraph::new();
        let (tx, rx) = unbounded();
        tx.send(Command::Start).unwrap();
        drop(tx);
        run(&mut scheduler, &index, &mut graph, &rx).unwrap();
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_ticks_advance_while_running() {
        let mut scheduler = TransportScheduler::new(Song::new(8)).unwrap();
        scheduler.song_mut().bpm = 960.0; // 15ms steps at 1/16
        let index = MemorySampleIndex::new();
        let mut graph = NullGraph::new();
        let (tx, rx) = unbounded();
        tx.send(Command::Start).unwrap();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(80));
            let _ = tx.send(Command::Shutdown);
        });
        run(&mut scheduler, &index, &mut graph, &rx).unwrap();
        stopper.join().unwrap();
        assert!(!scheduler.is_running());
    }
}
