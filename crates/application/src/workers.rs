use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tagshelf_domain::{Icon, IndexPhase, Progress};
use tracing::{debug, warn};

use crate::{ApplicationError, CancellationToken, MetadataIndex, ScanOutcome, ThumbnailCache};

#[derive(Debug)]
pub enum IndexEvent {
    Phase(IndexPhase),
    Finished(Result<ScanOutcome, ApplicationError>),
}

struct IndexRequest {
    roots: Vec<PathBuf>,
    cancel: CancellationToken,
}

/// Background thread running one index scan at a time.
pub struct IndexWorker {
    request_tx: mpsc::Sender<IndexRequest>,
    event_rx: Mutex<mpsc::Receiver<IndexEvent>>,
    running: Arc<AtomicBool>,
    current: Mutex<Option<CancellationToken>>,
}

impl IndexWorker {
    pub fn new(index: Arc<MetadataIndex>) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<IndexRequest>();
        let (event_tx, event_rx) = mpsc::channel::<IndexEvent>();
        let running = Arc::new(AtomicBool::new(false));
        spawn_index_worker(index, request_rx, event_tx, Arc::clone(&running));
        Self {
            request_tx,
            event_rx: Mutex::new(event_rx),
            running,
            current: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Queues a scan; rejected with `ApplicationError::Busy` while one runs.
    pub fn start(&self, roots: Vec<PathBuf>) -> Result<CancellationToken, ApplicationError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ApplicationError::Busy)?;
        let cancel = CancellationToken::new();
        *self
            .current
            .lock()
            .map_err(|_| ApplicationError::Io("index cancel lock poisoned".to_string()))? =
            Some(cancel.clone());
        if self
            .request_tx
            .send(IndexRequest {
                roots,
                cancel: cancel.clone(),
            })
            .is_err()
        {
            self.running.store(false, Ordering::SeqCst);
            return Err(ApplicationError::WorkerGone("index"));
        }
        Ok(cancel)
    }

    pub fn cancel(&self) -> Result<(), ApplicationError> {
        let current = self
            .current
            .lock()
            .map_err(|_| ApplicationError::Io("index cancel lock poisoned".to_string()))?;
        if let Some(token) = current.as_ref() {
            token.cancel();
        }
        Ok(())
    }

    pub fn try_next_event(&self) -> Result<Option<IndexEvent>, ApplicationError> {
        let receiver = self
            .event_rx
            .lock()
            .map_err(|_| ApplicationError::Io("index event lock poisoned".to_string()))?;
        match receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => Err(ApplicationError::WorkerGone("index")),
        }
    }

    /// Blocks up to `timeout` for the next event.
    pub fn next_event(&self, timeout: Duration) -> Result<Option<IndexEvent>, ApplicationError> {
        let receiver = self
            .event_rx
            .lock()
            .map_err(|_| ApplicationError::Io("index event lock poisoned".to_string()))?;
        match receiver.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ApplicationError::WorkerGone("index")),
        }
    }
}

/// Clears the running flag even when a scan unwinds.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn spawn_index_worker(
    index: Arc<MetadataIndex>,
    request_rx: mpsc::Receiver<IndexRequest>,
    event_tx: mpsc::Sender<IndexEvent>,
    running: Arc<AtomicBool>,
) {
    thread::spawn(move || {
        while let Ok(request) = request_rx.recv() {
            let scanning = RunningGuard(&running);
            let result = index.scan(&request.roots, &request.cancel, &mut |phase| {
                let _ = event_tx.send(IndexEvent::Phase(phase));
            });
            drop(scanning);
            if event_tx.send(IndexEvent::Finished(result)).is_err() {
                debug!("index event receiver dropped, stopping worker");
                break;
            }
        }
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub index: usize,
    pub path: PathBuf,
    pub force_regenerate: bool,
}

#[derive(Debug, Clone)]
pub struct ThumbnailEvent {
    pub batch: u64,
    pub index: usize,
    pub path: PathBuf,
    pub icon: Icon,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<(u64, ThumbnailRequest)>,
    closed: bool,
}

#[derive(Default)]
struct RequestQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl RequestQueue {
    fn replace(&self, batch: u64, requests: Vec<ThumbnailRequest>) -> Result<(), ApplicationError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ApplicationError::Io("thumbnail queue lock poisoned".to_string()))?;
        state.pending.clear();
        state
            .pending
            .extend(requests.into_iter().map(|request| (batch, request)));
        self.ready.notify_all();
        Ok(())
    }

    /// Blocks for the next request; `None` once closed.
    fn pop(&self) -> Option<(u64, ThumbnailRequest)> {
        let mut state = self.state.lock().ok()?;
        loop {
            if state.closed {
                return None;
            }
            if let Some(next) = state.pending.pop_front() {
                return Some(next);
            }
            state = self.ready.wait(state).ok()?;
        }
    }

    fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
            state.pending.clear();
        }
        self.ready.notify_all();
    }
}

/// Pool of threads generating thumbnails for the latest submitted batch.
pub struct ThumbnailWorker {
    queue: Arc<RequestQueue>,
    next_batch: AtomicU64,
    latest_batch: Arc<AtomicU64>,
    event_rx: Mutex<mpsc::Receiver<ThumbnailEvent>>,
    handles: Vec<JoinHandle<()>>,
}

impl ThumbnailWorker {
    pub fn new(cache: Arc<ThumbnailCache>, jobs: usize) -> Self {
        let queue = Arc::new(RequestQueue::default());
        let latest_batch = Arc::new(AtomicU64::new(0));
        let (event_tx, event_rx) = mpsc::channel::<ThumbnailEvent>();
        let handles = (0..jobs.max(1))
            .map(|_| {
                spawn_thumbnail_worker(
                    Arc::clone(&cache),
                    Arc::clone(&queue),
                    Arc::clone(&latest_batch),
                    event_tx.clone(),
                )
            })
            .collect();
        Self {
            queue,
            next_batch: AtomicU64::new(0),
            latest_batch,
            event_rx: Mutex::new(event_rx),
            handles,
        }
    }

    /// Replaces whatever is still queued; events of older batches stop arriving.
    pub fn submit_batch(&self, requests: Vec<ThumbnailRequest>) -> Result<u64, ApplicationError> {
        let batch = self.next_batch.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest_batch.store(batch, Ordering::SeqCst);
        self.queue.replace(batch, requests)?;
        Ok(batch)
    }

    pub fn latest_batch(&self) -> u64 {
        self.latest_batch.load(Ordering::SeqCst)
    }

    pub fn try_next_event(&self) -> Result<Option<ThumbnailEvent>, ApplicationError> {
        let receiver = self
            .event_rx
            .lock()
            .map_err(|_| ApplicationError::Io("thumbnail event lock poisoned".to_string()))?;
        match receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => {
                Err(ApplicationError::WorkerGone("thumbnail"))
            }
        }
    }

    pub fn next_event(&self, timeout: Duration) -> Result<Option<ThumbnailEvent>, ApplicationError> {
        let receiver = self
            .event_rx
            .lock()
            .map_err(|_| ApplicationError::Io("thumbnail event lock poisoned".to_string()))?;
        match receiver.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(ApplicationError::WorkerGone("thumbnail"))
            }
        }
    }
}

impl Drop for ThumbnailWorker {
    fn drop(&mut self) {
        self.queue.close();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn spawn_thumbnail_worker(
    cache: Arc<ThumbnailCache>,
    queue: Arc<RequestQueue>,
    latest_batch: Arc<AtomicU64>,
    event_tx: mpsc::Sender<ThumbnailEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Some((batch, request)) = queue.pop() {
            if batch < latest_batch.load(Ordering::SeqCst) {
                continue;
            }
            let icon = match cache.icon_for(&request.path, request.force_regenerate) {
                Ok(icon) => icon,
                Err(error) => {
                    warn!(path = %request.path.display(), %error, "thumbnail lookup failed");
                    cache.failure_icon()
                }
            };
            let event = ThumbnailEvent {
                batch,
                index: request.index,
                path: request.path,
                icon,
            };
            if event_tx.send(event).is_err() {
                break;
            }
        }
    })
}

/// `Reloading thumbnails: v/t (p%)`.
pub fn thumbnail_progress_text(progress: Progress) -> String {
    let percent = (progress.ratio() * 100.0).round() as u64;
    format!(
        "Reloading thumbnails: {}/{} ({percent}%)",
        progress.current, progress.total
    )
}
