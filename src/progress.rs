//! Progress reporting over a channel
//!
//! Each optimizer owns a [`ProgressReporter`]; evaluations are counted locally
//! and sent as [`ProgressEvent`]s to a single aggregator thread, which logs one
//! line per family each time another tenth of the budget completes.

use crate::error::Result;
use crate::family::FamilyKind;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::info;

/// One message from a worker to the aggregator
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A search is about to start evaluating `total` candidates
    Started {
        family: FamilyKind,
        strategy: &'static str,
        total: usize,
    },
    /// `completed` of `total` evaluations are done
    Evaluated {
        family: FamilyKind,
        completed: usize,
        total: usize,
    },
    /// The search returned, successfully or not
    Finished { family: FamilyKind, success: bool },
}

/// Worker-local evaluation counter
///
/// The counter is atomic only because grid evaluations of one family may run
/// on several rayon workers; it is never shared between families.
#[derive(Debug)]
pub struct ProgressReporter {
    family: FamilyKind,
    total: usize,
    completed: AtomicUsize,
    sender: Option<Sender<ProgressEvent>>,
}

impl ProgressReporter {
    pub fn new(family: FamilyKind, total: usize, sender: Option<Sender<ProgressEvent>>) -> Self {
        Self {
            family,
            total,
            completed: AtomicUsize::new(0),
            sender,
        }
    }

    pub fn started(&self, strategy: &'static str) {
        self.send(ProgressEvent::Started {
            family: self.family,
            strategy,
            total: self.total,
        });
    }

    /// Count one evaluation; returns the new count
    pub fn tick(&self) -> usize {
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        self.send(ProgressEvent::Evaluated {
            family: self.family,
            completed,
            total: self.total,
        });
        completed
    }

    pub fn finished(&self, success: bool) {
        self.send(ProgressEvent::Finished {
            family: self.family,
            success,
        });
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    // A dropped aggregator only silences progress; it never fails a search
    fn send(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}

/// Summary kept by the aggregator per family
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyProgress {
    pub completed: usize,
    pub total: usize,
    pub finished: bool,
    pub success: bool,
}

/// Drain events until every sender is dropped, logging each 10% step
pub fn aggregate(receiver: Receiver<ProgressEvent>) -> BTreeMap<FamilyKind, FamilyProgress> {
    let mut state: BTreeMap<FamilyKind, FamilyProgress> = BTreeMap::new();
    let mut last_decile: BTreeMap<FamilyKind, usize> = BTreeMap::new();

    for event in receiver {
        match event {
            ProgressEvent::Started { family, strategy, total } => {
                info!(%family, strategy, total, "search started");
                state.insert(
                    family,
                    FamilyProgress {
                        total,
                        ..FamilyProgress::default()
                    },
                );
                last_decile.insert(family, 0);
            }
            ProgressEvent::Evaluated { family, completed, total } => {
                let entry = state.entry(family).or_default();
                entry.completed = entry.completed.max(completed);
                entry.total = total;

                let decile = if total == 0 { 10 } else { entry.completed * 10 / total };
                let last = last_decile.entry(family).or_insert(0);
                if decile > *last {
                    *last = decile;
                    info!(%family, percent = decile * 10, completed = entry.completed, total, "optimizer progress");
                }
            }
            ProgressEvent::Finished { family, success } => {
                let entry = state.entry(family).or_default();
                entry.finished = true;
                entry.success = success;
            }
        }
    }

    state
}

/// Spawn the aggregator thread; it exits once all senders are dropped
pub fn spawn_progress_logger(
) -> Result<(Sender<ProgressEvent>, JoinHandle<BTreeMap<FamilyKind, FamilyProgress>>)> {
    let (sender, receiver) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("holdcv-progress".to_string())
        .spawn(move || aggregate(receiver))?;
    Ok((sender, handle))
}
