//! Background imports
//!
//! Parsing runs on a worker thread so the caller stays responsive. The
//! worker reports through a crossbeam channel; a shared cancel flag is
//! checked between files, and a cancelled import never delivers items.

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use super::{parse, ImportSettings};
use crate::error::{GraphsError, Result};
use crate::item::Item;
use crate::style::StyleParams;

/// Handle to a running import
pub struct ImportTask {
    receiver: Receiver<Result<Vec<Item>>>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Parse `requests` on a worker thread
///
/// Items of all files are delivered together once every file parsed. The
/// first failing file aborts the import.
pub fn spawn_import(requests: Vec<ImportSettings>, style: StyleParams) -> ImportTask {
    let (sender, receiver) = bounded(1);
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();

    let handle = thread::spawn(move || {
        let mut items = Vec::new();
        for settings in &requests {
            if flag.load(Ordering::SeqCst) {
                debug!("Import cancelled before {}", settings.path.display());
                return;
            }
            match parse(settings, &style) {
                Ok(parsed) => items.extend(parsed),
                Err(e) => {
                    let _ = sender.send(Err(e));
                    return;
                }
            }
        }
        if flag.load(Ordering::SeqCst) {
            return;
        }
        // Receiver may already be gone
        let _ = sender.send(Ok(items));
    });

    ImportTask {
        receiver,
        cancelled,
        handle: Some(handle),
    }
}

impl ImportTask {
    /// Ask the worker to stop; pending results are dropped
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Non-blocking poll, `None` while still running or after cancellation
    pub fn try_result(&self) -> Option<Result<Vec<Item>>> {
        if self.is_cancelled() {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                warn!("Import worker exited without a result");
                Some(Err(GraphsError::Parse("Import failed".to_string())))
            }
        }
    }

    /// Block until the import finishes
    pub fn wait(mut self) -> Result<Vec<Item>> {
        let result = self
            .receiver
            .recv()
            .unwrap_or_else(|_| Err(GraphsError::Parse("Import cancelled".to_string())));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        if self.is_cancelled() {
            return Err(GraphsError::Parse("Import cancelled".to_string()));
        }
        result
    }
}

impl Drop for ImportTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::io::Write;

    fn columns_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_import_in_background() {
        let a = columns_file("1 2\n3 4\n");
        let b = columns_file("5 6\n");
        let requests = vec![
            ImportSettings::with_parser(a.path(), "columns", Map::new()).unwrap(),
            ImportSettings::with_parser(b.path(), "columns", Map::new()).unwrap(),
        ];
        let items = spawn_import(requests, StyleParams::default()).wait().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].xdata().unwrap(), &[5.0]);
    }

    #[test]
    fn test_failure_is_reported() {
        let bad = columns_file("a b\n1 2\nnot numbers\n");
        let requests = vec![ImportSettings::with_parser(bad.path(), "columns", Map::new()).unwrap()];
        let err = spawn_import(requests, StyleParams::default()).wait().unwrap_err();
        assert!(matches!(err, GraphsError::Parse(_)));
    }

    #[test]
    fn test_cancelled_import_yields_nothing() {
        let a = columns_file("1 2\n");
        let requests = vec![ImportSettings::with_parser(a.path(), "columns", Map::new()).unwrap()];
        let task = spawn_import(requests, StyleParams::default());
        task.cancel();
        assert!(task.try_result().is_none());
        assert!(task.wait().is_err());
    }
}
