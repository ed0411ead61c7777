use crate::store::Store;
use crate::study::MasteryWrite;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Attempts per write before the update is dropped and logged.
const MAX_WRITE_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Write-behind persistence for mastery updates.
///
/// Judgments must never block navigation, so the UI thread enqueues
/// idempotent last-value-wins writes here and a background thread applies
/// them in order against its own connection. A single queue also keeps
/// writes landing in the order they were issued. Failures are retried with
/// backoff and then logged, never surfaced.
#[derive(Debug)]
pub struct Writeback {
    tx: Option<Sender<MasteryWrite>>,
    handle: Option<JoinHandle<()>>,
}

impl Writeback {
    /// Start the writer thread against the database at `db_path`. The
    /// thread opens its own connection; WAL mode makes the second writer
    /// safe.
    pub fn spawn(db_path: PathBuf) -> Self {
        let (tx, rx) = mpsc::channel::<MasteryWrite>();
        let handle = std::thread::spawn(move || {
            let mut store = match Store::open(&db_path) {
                Ok(store) => store,
                Err(e) => {
                    log::error!("writeback: could not open {}: {}", db_path.display(), e);
                    return;
                }
            };
            while let Ok(write) = rx.recv() {
                apply_with_retry(&mut store, &write);
            }
        });
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// Queue a write. Never blocks; if the writer thread has died the
    /// update is lost and logged, matching the non-fatal contract.
    pub fn enqueue(&self, write: MasteryWrite) {
        if let Some(tx) = &self.tx {
            if tx.send(write).is_err() {
                log::error!("writeback: writer thread is gone, dropping update");
            }
        }
    }
}

impl Drop for Writeback {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain the queue and exit.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Something mastery writes can be applied to. `Store` in production; tests
/// substitute failure-injecting sinks.
pub trait WriteSink {
    fn apply(&mut self, write: &MasteryWrite) -> Result<(), String>;
}

impl WriteSink for Store {
    fn apply(&mut self, write: &MasteryWrite) -> Result<(), String> {
        match write {
            MasteryWrite::SetMastered { card_id, mastered } => self
                .set_card_mastered(card_id, *mastered)
                .map_err(|e| e.to_string()),
            MasteryWrite::ResetSession { session_id } => {
                self.reset_cards(session_id).map_err(|e| e.to_string())
            }
        }
    }
}

fn apply_with_retry(sink: &mut dyn WriteSink, write: &MasteryWrite) {
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        match sink.apply(write) {
            Ok(()) => return,
            Err(e) if attempt < MAX_WRITE_ATTEMPTS => {
                log::warn!(
                    "writeback attempt {} failed for {:?}: {}",
                    attempt,
                    write,
                    e
                );
                std::thread::sleep(RETRY_BASE_DELAY * attempt);
            }
            Err(e) => {
                log::error!("writeback giving up on {:?}: {}", write, e);
            }
        }
    }
}
