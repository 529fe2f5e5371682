// Periodic events independent of the frame tick.
//
// A timer thread posts an event on a fixed period. Events may arrive between
// frames (or several per frame after a stall); the frame loop drains them at
// the start of the next update phase, never mid-draw.

use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use std::time::Duration;

pub struct IntervalTimer {
    handle: JoinHandle<()>,
}

impl IntervalTimer {
    /// Post `event` every `period` until the receiving side is dropped.
    pub fn spawn<E>(name: &str, period: Duration, tx: Sender<E>, event: E) -> std::io::Result<Self>
    where
        E: Clone + Send + 'static,
    {
        let handle = std::thread::Builder::new()
            .name(format!("timer-{name}"))
            .spawn(move || {
                loop {
                    std::thread::sleep(period);
                    if tx.send(event.clone()).is_err() {
                        break;
                    }
                }
            })?;
        log::debug!("timer {name} started, period {period:?}");
        Ok(Self { handle })
    }

    /// True once the receiver has been dropped and the thread exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
