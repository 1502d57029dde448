//! Dedicated processor thread with start/stop control.
//!
//! The thread owns the [`Board`] and runs granules back to back while
//! started. There is no wall-clock pacing; hosts that want real time stop
//! the session between frames.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::board::Board;
use crate::CoreError;

#[derive(Debug, Default)]
struct Control {
    running: bool,
    quit: bool,
}

#[derive(Debug, Default)]
struct Shared {
    control: Mutex<Control>,
    changed: Condvar,
    granules: AtomicU64,
    cycles: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, apply: impl FnOnce(&mut Control)) {
        apply(&mut self.lock());
        self.changed.notify_all();
    }
}

/// Handle to a running processor thread.
#[derive(Debug)]
pub struct Session {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<Result<Board, CoreError>>>,
}

impl Session {
    /// Moves `board` onto a new thread, initially stopped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ThreadSpawn`] if the thread cannot be created.
    pub fn spawn(board: Board) -> Result<Self, CoreError> {
        let shared = Arc::new(Shared::default());
        let worker = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("sh3".into())
                .spawn(move || run(board, &shared))
                .map_err(|_| CoreError::ThreadSpawn("processor"))?
        };
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Lets the processor run.
    pub fn start(&self) {
        self.shared.update(|c| c.running = true);
    }

    /// Parks the processor after its current granule.
    pub fn stop(&self) {
        self.shared.update(|c| c.running = false);
    }

    /// Whether the session is currently started.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Granules completed so far.
    #[must_use]
    pub fn granules(&self) -> u64 {
        self.shared.granules.load(Ordering::Relaxed)
    }

    /// Processor cycles executed so far.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::Relaxed)
    }

    /// Ends the thread and hands the board back.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the processor, or
    /// [`CoreError::SessionPanicked`] if the thread panicked.
    pub fn join(mut self) -> Result<Board, CoreError> {
        self.finish().unwrap_or(Err(CoreError::SessionPanicked))
    }

    fn finish(&mut self) -> Option<Result<Board, CoreError>> {
        self.shared.update(|c| c.quit = true);
        let handle = self.worker.take()?;
        Some(handle.join().unwrap_or(Err(CoreError::SessionPanicked)))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(Err(err)) = self.finish() {
            log::warn!("processor session ended with {err}");
        }
    }
}

fn run(mut board: Board, shared: &Shared) -> Result<Board, CoreError> {
    loop {
        {
            let control = shared
                .changed
                .wait_while(shared.lock(), |c| !c.running && !c.quit)
                .unwrap_or_else(PoisonError::into_inner);
            if control.quit {
                break;
            }
        }
        let outcome = board.run_granule()?;
        shared.granules.fetch_add(1, Ordering::Relaxed);
        shared.cycles.fetch_add(outcome.cycles, Ordering::Relaxed);
    }
    log::debug!("processor session stopped");
    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::Session;
    use crate::board::Board;
    use crate::peripherals::{BlitEngine, BlitJob, FrameBuffer};
    use crate::CoreConfig;

    struct NullEngine;

    impl BlitEngine for NullEngine {
        fn blit(&mut self, _job: &BlitJob, _frame: &mut FrameBuffer) {}
    }

    fn board() -> Board {
        // bra . ; nop
        Board::new(CoreConfig::default(), &[0xAF, 0xFE, 0x00, 0x09], Box::new(NullEngine))
            .expect("board")
    }

    #[test]
    fn stopped_session_runs_nothing_and_joins() {
        let session = Session::spawn(board()).expect("spawn");
        assert!(!session.is_running());
        let board = session.join().expect("join");
        assert_eq!(board.cpu().diagnostics().granules, 0);
    }

    #[test]
    fn started_session_makes_progress() {
        let session = Session::spawn(board()).expect("spawn");
        session.start();
        while session.granules() < 3 {
            std::thread::yield_now();
        }
        session.stop();
        let board = session.join().expect("join");
        assert!(board.cpu().diagnostics().granules >= 3);
        assert_eq!(board.cpu().state().pc, 0xA000_0000);
    }
}
