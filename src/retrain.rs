//! Full corpus rebuild from the message archive.
//!
//! The rebuild clears and repopulates the corpus inside a single transaction, so
//! concurrent readers observe either the previous corpus or the rebuilt one. Any
//! failure rolls the transaction back and leaves the previous corpus untouched.
//! [`spawn_retrain`] runs the rebuild on a dedicated thread with its own connection
//! and reports progress over a channel.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver};
use log::{debug, info, warn};
use rusqlite::Connection;
use rustc_hash::FxHashSet;

use crate::config::{RetrainConfig, StoreConfig};
use crate::error::{MarkovError, Result};
use crate::ingest::insert_message_entries;
use crate::metrics::RetrainReport;
use crate::store::{self, clear_entries, for_each_message};

/// Messages sent from the retraining worker to whoever started it.
#[derive(Debug)]
pub enum RetrainEvent {
    /// Number of messages trained so far.
    Progress(usize),
    /// The rebuild committed.
    Finished(RetrainReport),
    /// The rebuild rolled back.
    Failed(MarkovError),
}

/// Rebuilds the corpus on `conn`, skipping messages from `excluded` authors.
///
/// `on_progress` receives the running count of trained messages every
/// `cfg.progress_interval` messages.
pub fn retrain_in<F>(
    conn: &mut Connection,
    excluded: &FxHashSet<String>,
    cfg: &RetrainConfig,
    mut on_progress: F,
) -> Result<RetrainReport>
where
    F: FnMut(usize),
{
    cfg.validate()?;
    info!(
        "retraining corpus from archive ({} excluded authors)",
        excluded.len()
    );
    let start = Instant::now();
    let mut report = RetrainReport::default();

    let tx = conn.transaction()?;
    report.entries_cleared = clear_entries(&tx)?;
    for_each_message(&tx, |message| {
        report.messages_seen += 1;
        if excluded.contains(&message.author_id) {
            report.messages_excluded += 1;
            return Ok(());
        }
        report.entries_written += insert_message_entries(&tx, &message)?;
        report.messages_trained += 1;
        if report.messages_trained % cfg.progress_interval == 0 {
            debug!("retrain progress: {} messages", report.messages_trained);
            on_progress(report.messages_trained);
        }
        Ok(())
    })?;
    tx.commit()?;
    report.duration = start.elapsed();

    if cfg.vacuum {
        match store::vacuum(conn) {
            Ok(()) => report.vacuumed = true,
            Err(err) => warn!("vacuum after retrain failed: {err}"),
        }
    }

    info!(
        "retrained on {} of {} messages ({} excluded): {} entries in {:.2?}",
        report.messages_trained,
        report.messages_seen,
        report.messages_excluded,
        report.entries_written,
        report.duration
    );
    Ok(report)
}

/// Starts a rebuild of the corpus stored at `path` on a background thread.
pub fn spawn_retrain(
    path: impl Into<PathBuf>,
    store_cfg: StoreConfig,
    excluded: FxHashSet<String>,
    cfg: RetrainConfig,
) -> Result<RetrainHandle> {
    cfg.validate()?;
    let path = path.into();
    let (events_tx, events_rx) = unbounded();

    let worker = thread::Builder::new()
        .name("markov4-retrain".into())
        .spawn(move || {
            let progress = events_tx.clone();
            let result = store::open(&path, &store_cfg).and_then(|mut conn| {
                retrain_in(&mut conn, &excluded, &cfg, |count| {
                    let _ = progress.send(RetrainEvent::Progress(count));
                })
            });
            let event = match result {
                Ok(report) => RetrainEvent::Finished(report),
                Err(err) => RetrainEvent::Failed(err),
            };
            let _ = events_tx.send(event);
        })
        .map_err(|err| MarkovError::io(err, None))?;

    Ok(RetrainHandle {
        events: events_rx,
        worker: Some(worker),
    })
}

/// Handle to a rebuild running on a background thread.
///
/// Dropping the handle detaches the worker; the rebuild still runs to completion.
#[derive(Debug)]
pub struct RetrainHandle {
    events: Receiver<RetrainEvent>,
    worker: Option<JoinHandle<()>>,
}

impl RetrainHandle {
    /// Raw event stream, for callers that multiplex it with other channels.
    #[must_use]
    pub fn events(&self) -> &Receiver<RetrainEvent> {
        &self.events
    }

    /// Returns `true` once the worker thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Blocks until the rebuild completes, forwarding progress counts to `on_progress`.
    pub fn wait<F>(mut self, mut on_progress: F) -> Result<RetrainReport>
    where
        F: FnMut(usize),
    {
        let outcome = loop {
            match self.events.recv() {
                Ok(RetrainEvent::Progress(count)) => on_progress(count),
                Ok(RetrainEvent::Finished(report)) => break Ok(report),
                Ok(RetrainEvent::Failed(err)) => break Err(err),
                Err(_) => {
                    break Err(MarkovError::Retrain(
                        "worker exited without reporting a result".into(),
                    ))
                }
            }
        };
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                return Err(MarkovError::Retrain("worker panicked".into()));
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Successor;
    use crate::ingest::train_on_message;
    use crate::message::Message;
    use crate::store::{
        entries_for_message, entry_count, entry_count_for_author, insert_message, open_in_memory,
    };
    use crate::tokenizer::tokenize_owned;

    fn quiet(progress_interval: usize) -> RetrainConfig {
        RetrainConfig::builder()
            .progress_interval(progress_interval)
            .vacuum(false)
            .build()
            .unwrap()
    }

    fn archive(conn: &Connection, messages: &[Message]) {
        for message in messages {
            insert_message(conn, message).unwrap();
        }
    }

    #[test]
    fn rebuild_matches_incremental_training() {
        let mut trained = open_in_memory().unwrap();
        let messages = [
            Message::new("1", "u1", "first message"),
            Message::new("2", "u2", "second, longer message!"),
        ];
        for message in &messages {
            train_on_message(&mut trained, message).unwrap();
        }
        let expected = entry_count(&trained).unwrap();

        let mut rebuilt = open_in_memory().unwrap();
        archive(&rebuilt, &messages);
        let report = retrain_in(&mut rebuilt, &FxHashSet::default(), &quiet(100), |_| {}).unwrap();
        assert_eq!(report.messages_trained, 2);
        assert_eq!(report.entries_written as u64, expected);
        assert_eq!(entry_count(&rebuilt).unwrap(), expected);
    }

    #[test]
    fn excluded_authors_leave_no_entries() {
        let mut conn = open_in_memory().unwrap();
        archive(
            &conn,
            &[
                Message::new("1", "human", "hello bot"),
                Message::new("2", "bot", "hello human").sent_by_bot(),
                Message::new("3", "bot", "unflagged but excluded"),
            ],
        );
        let excluded: FxHashSet<String> = ["bot".to_string()].into_iter().collect();
        let report = retrain_in(&mut conn, &excluded, &quiet(100), |_| {}).unwrap();

        assert_eq!(report.messages_seen, 3);
        assert_eq!(report.messages_excluded, 2);
        assert_eq!(entry_count_for_author(&conn, "bot").unwrap(), 0);
        assert!(entry_count_for_author(&conn, "human").unwrap() > 0);
    }

    #[test]
    fn rerunning_is_idempotent() {
        let mut conn = open_in_memory().unwrap();
        archive(&conn, &[Message::new("1", "u1", "same every time")]);
        let first = retrain_in(&mut conn, &FxHashSet::default(), &quiet(100), |_| {}).unwrap();
        let second = retrain_in(&mut conn, &FxHashSet::default(), &quiet(100), |_| {}).unwrap();
        assert_eq!(first.entries_written, second.entries_written);
        assert_eq!(second.entries_cleared, first.entries_written);
        assert_eq!(
            entry_count(&conn).unwrap(),
            (tokenize_owned("same every time").len() + 1) as u64
        );
    }

    #[test]
    fn progress_is_reported_every_interval() {
        let mut conn = open_in_memory().unwrap();
        let messages: Vec<Message> = (0..7)
            .map(|idx| Message::new(idx.to_string(), "u1", format!("message {idx}")))
            .collect();
        archive(&conn, &messages);

        let mut seen = Vec::new();
        retrain_in(&mut conn, &FxHashSet::default(), &quiet(3), |count| {
            seen.push(count)
        })
        .unwrap();
        assert_eq!(seen, vec![3, 6]);
    }

    #[test]
    fn failure_mid_stream_rolls_back_to_previous_corpus() {
        let mut conn = open_in_memory().unwrap();
        train_on_message(&mut conn, &Message::new("1", "u1", "old corpus row")).unwrap();
        train_on_message(&mut conn, &Message::new("2", "u1", "another old row")).unwrap();
        let before = entries_for_message(&conn, "1").unwrap();
        let total_before = entry_count(&conn).unwrap();

        insert_message(&conn, &Message::new("poison", "u1", "breaks the rebuild")).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER poison BEFORE INSERT ON markov4
             WHEN NEW.message_id = 'poison'
             BEGIN SELECT RAISE(ABORT, 'poisoned message'); END;",
        )
        .unwrap();

        let mut progress = Vec::new();
        let err = retrain_in(&mut conn, &FxHashSet::default(), &quiet(1), |count| {
            progress.push(count)
        })
        .unwrap_err();
        assert!(matches!(err, MarkovError::Storage(_)));
        assert_eq!(progress, vec![1, 2], "failure happened after partial progress");

        assert_eq!(entry_count(&conn).unwrap(), total_before);
        assert_eq!(entries_for_message(&conn, "1").unwrap(), before);
        assert!(entries_for_message(&conn, "poison").unwrap().is_empty());
    }

    #[test]
    fn background_worker_reports_progress_and_completion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.sqlite3");
        {
            let conn = store::open(&path, &StoreConfig::default()).unwrap();
            let messages: Vec<Message> = (0..5)
                .map(|idx| Message::new(idx.to_string(), "u1", "a b c"))
                .collect();
            archive(&conn, &messages);
        }

        let handle = spawn_retrain(&path, StoreConfig::default(), FxHashSet::default(), quiet(2))
            .unwrap();
        let mut progress = Vec::new();
        let report = handle.wait(|count| progress.push(count)).unwrap();
        assert_eq!(progress, vec![2, 4]);
        assert_eq!(report.messages_trained, 5);

        let conn = store::open(&path, &StoreConfig::default()).unwrap();
        assert_eq!(entry_count(&conn).unwrap(), 5 * 6);
        let first = entries_for_message(&conn, "0").unwrap();
        assert_eq!(first.last().map(|e| &e.successor), Some(&Successor::End));
    }

    #[test]
    fn background_worker_surfaces_storage_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("corpus.sqlite3");
        let handle =
            spawn_retrain(&missing, StoreConfig::default(), FxHashSet::default(), quiet(1))
                .unwrap();
        let err = handle.wait(|_| {}).unwrap_err();
        assert!(matches!(err, MarkovError::Storage(_)));
    }

    #[test]
    fn vacuum_runs_after_commit_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.sqlite3");
        let mut conn = store::open(&path, &StoreConfig::default()).unwrap();
        archive(&conn, &[Message::new("1", "u1", "a b c")]);

        let report = retrain_in(
            &mut conn,
            &FxHashSet::default(),
            &RetrainConfig::default(),
            |_| {},
        )
        .unwrap();
        assert!(report.vacuumed);
        assert_eq!(entry_count(&conn).unwrap(), 6);
    }

    #[test]
    fn readers_see_previous_corpus_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.sqlite3");
        let mut writer = store::open(&path, &StoreConfig::default()).unwrap();
        let reader = store::open(&path, &StoreConfig::default()).unwrap();
        for idx in 0..6 {
            let author = if idx % 2 == 0 { "u1" } else { "spammer" };
            train_on_message(&mut writer, &Message::new(idx.to_string(), author, "a b c"))
                .unwrap();
        }
        let before = entry_count(&reader).unwrap();
        assert_eq!(before, 36);

        let excluded: FxHashSet<String> = std::iter::once("spammer".to_string()).collect();
        let cfg = RetrainConfig::builder()
            .progress_interval(1)
            .build()
            .unwrap();
        let mut seen_mid = Vec::new();
        let report = retrain_in(&mut writer, &excluded, &cfg, |_| {
            seen_mid.push(entry_count(&reader).unwrap());
        })
        .unwrap();

        assert_eq!(seen_mid, vec![before; 3]);
        assert_eq!(report.entries_written, 18);
        assert_eq!(entry_count(&reader).unwrap(), 18);
        assert_eq!(entry_count_for_author(&reader, "spammer").unwrap(), 0);
    }

    #[test]
    fn event_stream_can_be_drained_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.sqlite3");
        {
            let conn = store::open(&path, &StoreConfig::default()).unwrap();
            let messages: Vec<Message> = (0..3)
                .map(|idx| Message::new(idx.to_string(), "u1", "a b c"))
                .collect();
            archive(&conn, &messages);
        }

        let handle = spawn_retrain(&path, StoreConfig::default(), FxHashSet::default(), quiet(1))
            .unwrap();
        let mut progress = Vec::new();
        let report = loop {
            match handle.events().recv().unwrap() {
                RetrainEvent::Progress(count) => progress.push(count),
                RetrainEvent::Finished(report) => break report,
                RetrainEvent::Failed(err) => panic!("retrain failed: {err}"),
            }
        };
        assert_eq!(progress, vec![1, 2, 3]);
        assert_eq!(report.entries_written, 18);

        // The worker exits right after its final send.
        while !handle.is_finished() {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(handle.events().recv().is_err());
    }
}
