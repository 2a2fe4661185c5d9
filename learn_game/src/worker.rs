//! Background training.
//!
//! The [`Game`] is moved into a worker thread for the whole run and comes
//! back through a one-shot channel, so nothing can read or touch the table
//! while it is being trained.

use crate::error::TrainingError;
use crate::{Game, TrainingSummary};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub type TrainingResult = Result<(Game, TrainingSummary), TrainingError>;

pub struct TrainingHandle {
    done: Receiver<TrainingResult>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

pub fn spawn_training(mut game: Game) -> TrainingHandle {
    let (tx, rx) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let worker = thread::spawn(move || {
        let result = match game.learn_q_table_until(&flag) {
            Ok(summary) => Ok((game, summary)),
            Err(e) => Err(TrainingError::from(e)),
        };
        if tx.send(result).is_err() {
            log::warn!("training finished but nobody is waiting for the game");
        }
    });
    TrainingHandle {
        done: rx,
        cancel,
        worker: Some(worker),
    }
}

impl TrainingHandle {
    /// Asks the worker to stop after the episode in progress.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Non-blocking poll for an event loop: `None` while training runs.
    /// Yields the result once; later polls report a disconnected worker.
    pub fn try_finish(&mut self) -> Option<TrainingResult> {
        match self.done.try_recv() {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.join();
                Some(Err(TrainingError::WorkerDisconnected))
            }
        }
    }

    pub fn wait(mut self) -> TrainingResult {
        let result = self
            .done
            .recv()
            .unwrap_or(Err(TrainingError::WorkerDisconnected));
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("training worker panicked");
            }
        }
    }
}
