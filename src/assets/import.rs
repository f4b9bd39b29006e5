//! Background imports
//!
//! Each import reads, parses and normalizes on its own worker thread and
//! reports through a private channel. The event thread polls the queue once
//! per tick; a finished import is handed over exactly once.
//!
//! Cancellation is best effort: [`ImportQueue::cancel_all`] bumps the queue's
//! epoch, and results started under an older epoch are dropped on arrival
//! instead of being delivered.

use super::{load, AssetError, SourceFormat, SourceHandle};
use crate::scene::{normalize, NewPlacement, NormalizeSettings};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::thread;

pub type ImportResult = Result<NewPlacement, AssetError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImportTicket(u64);

struct PendingImport {
    ticket: ImportTicket,
    epoch: u64,
    path: PathBuf,
    format: SourceFormat,
    receiver: Receiver<ImportResult>,
}

/// A finished import, ready to be applied on the event thread.
pub struct CompletedImport {
    pub ticket: ImportTicket,
    pub path: PathBuf,
    pub result: ImportResult,
}

pub struct ImportQueue {
    settings: NormalizeSettings,
    pending: Vec<PendingImport>,
    next_ticket: u64,
    epoch: u64,
}

impl ImportQueue {
    pub fn new(settings: NormalizeSettings) -> Self {
        Self {
            settings,
            pending: Vec::new(),
            next_ticket: 1,
            epoch: 0,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Start importing `path`. Unsupported extensions are rejected here,
    /// before any bytes are read or a worker is spawned.
    pub fn submit(&mut self, path: &Path) -> Result<ImportTicket, AssetError> {
        let format = SourceFormat::for_path(path)?;
        let ticket = ImportTicket(self.next_ticket);
        self.next_ticket += 1;

        let (sender, receiver) = channel();
        let worker_path = path.to_path_buf();
        let settings = self.settings;
        thread::spawn(move || {
            let result = import_file(&worker_path, format, &settings);
            let _ = sender.send(result);
        });

        log::info!(
            "Importing {} ({}) as {:?}",
            path.display(),
            format.label(),
            ticket
        );
        self.pending.push(PendingImport {
            ticket,
            epoch: self.epoch,
            path: path.to_path_buf(),
            format,
            receiver,
        });
        Ok(ticket)
    }

    /// Forget every in-flight import. Their results are discarded when the
    /// workers finish.
    pub fn cancel_all(&mut self) {
        self.epoch += 1;
        for pending in &self.pending {
            log::debug!("Import {:?} ({}) superseded", pending.ticket, pending.path.display());
        }
    }

    /// Collect imports that finished since the last poll, in submission order.
    pub fn poll(&mut self) -> Vec<CompletedImport> {
        let mut completed = Vec::new();
        let current_epoch = self.epoch;
        self.pending.retain(|pending| {
            let result = match pending.receiver.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => Err(AssetError::ParseFailure {
                    file: pending.path.display().to_string(),
                    format: pending.format.label(),
                    message: "import worker terminated before reporting".to_string(),
                }),
            };
            if pending.epoch != current_epoch {
                log::debug!(
                    "Discarding result of superseded import {:?} ({})",
                    pending.ticket,
                    pending.path.display()
                );
            } else {
                completed.push(CompletedImport {
                    ticket: pending.ticket,
                    path: pending.path.clone(),
                    result,
                });
            }
            false
        });
        completed
    }
}

/// Read, parse and normalize one file. Runs on a worker thread.
pub fn import_file(
    path: &Path,
    format: SourceFormat,
    settings: &NormalizeSettings,
) -> ImportResult {
    let source = SourceHandle::read(path)?;
    let raw = load(&source, format)?;
    let (node, reference) = normalize(raw, settings)?;
    Ok(NewPlacement {
        name: source.name(),
        format,
        source,
        node,
        reference,
    })
}

#[cfg(test)]
mod tests {
    use super::ImportQueue;
    use crate::assets::fixtures::{glb, CUBE_CORNERS_CM};
    use crate::assets::{ErrorKind, SourceFormat};
    use crate::scene::NormalizeSettings;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    fn temp_dir(tag: &str) -> PathBuf {
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "placer_import_{}_{}_{}",
            tag,
            std::process::id(),
            nonce
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn drain(queue: &mut ImportQueue) -> Vec<super::CompletedImport> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut done = Vec::new();
        while !queue.is_idle() && Instant::now() < deadline {
            done.extend(queue.poll());
            std::thread::sleep(Duration::from_millis(5));
        }
        done
    }

    #[test]
    fn concurrent_imports_each_complete_once() {
        let dir = temp_dir("concurrent");
        let mut queue = ImportQueue::new(NormalizeSettings::default());
        let mut tickets = Vec::new();
        for index in 0..4 {
            let path = dir.join(format!("part_{}.glb", index));
            std::fs::write(&path, glb(&CUBE_CORNERS_CM)).unwrap();
            tickets.push(queue.submit(&path).unwrap());
        }
        assert_eq!(queue.pending_count(), 4);

        let done = drain(&mut queue);
        assert_eq!(done.len(), 4);
        let mut seen: Vec<_> = done.iter().map(|item| item.ticket).collect();
        seen.sort();
        assert_eq!(seen, tickets);
        for item in done {
            let placement = item.result.unwrap();
            assert_eq!(placement.format, SourceFormat::Glb);
            assert!((placement.node.bounds.max_dimension() - 2.0).abs() < 1e-5);
        }

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn rejected_extension_never_spawns() {
        let mut queue = ImportQueue::new(NormalizeSettings::default());
        let err = queue.submit(&PathBuf::from("model.obj")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert!(queue.is_idle());
    }

    #[test]
    fn missing_file_reports_unreadable() {
        let dir = temp_dir("missing");
        let mut queue = ImportQueue::new(NormalizeSettings::default());
        queue.submit(&dir.join("absent.gltf")).unwrap();
        let done = drain(&mut queue);
        assert_eq!(done.len(), 1);
        let err = done.into_iter().next().unwrap().result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unreadable);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn cancelled_imports_are_discarded() {
        let dir = temp_dir("cancel");
        let path = dir.join("late.glb");
        std::fs::write(&path, glb(&CUBE_CORNERS_CM)).unwrap();

        let mut queue = ImportQueue::new(NormalizeSettings::default());
        queue.submit(&path).unwrap();
        queue.cancel_all();
        assert!(drain(&mut queue).is_empty());
        assert!(queue.is_idle());

        queue.submit(&path).unwrap();
        assert_eq!(drain(&mut queue).len(), 1);

        let _ = std::fs::remove_dir_all(dir);
    }
}
