//! Presence poll.
//!
//! A thread that posts [`ModeEvent::PresenceTick`] at a fixed interval until
//! cancelled. Dropping the poll cancels it and joins the thread.

use super::ModeEvent;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct PresencePoll {
    cancel: Option<Sender<()>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PresencePoll {
    pub fn start(interval: Duration, events: Sender<ModeEvent>) -> Self {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let spawned = thread::Builder::new()
            .name("mu-link-presence".to_string())
            .spawn(move || loop {
                match cancelled.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if events.send(ModeEvent::PresenceTick).is_err() {
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });

        let worker = match spawned {
            Ok(worker) => Some(worker),
            Err(e) => {
                warn!("Presence poll not started: {}", e);
                None
            }
        };
        debug!("Presence poll every {:?}", interval);
        Self {
            cancel: Some(cancel),
            worker,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn stop(&mut self) {
        self.cancel.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            debug!("Presence poll stopped");
        }
    }
}

impl Drop for PresencePoll {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_until_stopped() {
        let (tx, rx) = mpsc::channel();
        let mut poll = PresencePoll::start(Duration::from_millis(5), tx);

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            ModeEvent::PresenceTick
        );
        poll.stop();
        assert!(!poll.is_running());

        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(30)).is_err());
    }
}
