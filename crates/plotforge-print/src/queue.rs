// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The concurrent job queue and worker pool.
//
// Jobs enter a FIFO guarded by one mutex (which also guards the id→job map
// and id assignment); a condition variable wakes the bounded pool of worker
// threads.  Each worker drives a claimed job through its state machine:
//
//   Pending → Processing → Printing → Completed
//                  ├→ Failed  (validation, generation, or dispatch error)
//                  └→ Cancelled (cooperative flag, observed at tick
//                                boundaries)
//
// Failed and Cancelled are retryable back to Pending.  Callbacks are always
// invoked on a snapshot taken after the queue mutex is released; no two core
// mutexes are ever held at once.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use plotforge_core::config::EngineConfig;
use plotforge_core::error::{PlotforgeError, Result};
use plotforge_core::types::{
    ColorMode, JobId, JobStatus, MediaSize, PrintJob, PrintOptions,
};

use crate::directory::DeviceDirectory;
use crate::protocol;
use crate::spooler::SpoolerGateway;

/// Delay between synthetic progress ticks.
const TICK: Duration = Duration::from_millis(100);

/// Synthetic progress cadence, in percent.  Each tick observes the
/// cancellation flag, so cancellation becomes visible within one tick.
const PROGRESS_STEPS: [u32; 6] = [0, 20, 40, 60, 80, 100];

/// Rough per-job wait estimate used by [`JobQueue::estimated_wait`].
const SECONDS_PER_QUEUED_JOB: u64 = 30;

/// Rough bytes-per-page heuristic for the page estimate.
const BYTES_PER_PAGE: u64 = 50_000;

type StatusCallback = Arc<dyn Fn(&PrintJob) + Send + Sync>;
type ProgressCallback = Arc<dyn Fn(JobId, f32) + Send + Sync>;

#[derive(Default)]
struct CallbackSlots {
    status: Option<StatusCallback>,
    progress: Option<ProgressCallback>,
}

struct QueueState {
    next_id: u64,
    fifo: VecDeque<JobId>,
    jobs: HashMap<JobId, PrintJob>,
}

struct QueueCore {
    state: Mutex<QueueState>,
    available: Condvar,
    callbacks: Mutex<CallbackSlots>,
    active: AtomicUsize,
    stopping: AtomicBool,
    max_depth: Option<usize>,
    gateway: Arc<dyn SpoolerGateway>,
    directory: Arc<DeviceDirectory>,
}

/// FIFO print queue with a bounded worker pool.
pub struct JobQueue {
    core: Arc<QueueCore>,
    max_workers: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobQueue {
    /// Build a queue.  The directory is consulted per job for plotter
    /// classification and protocol knowledge; the queue does not own it.
    pub fn new(
        gateway: Arc<dyn SpoolerGateway>,
        directory: Arc<DeviceDirectory>,
        config: &EngineConfig,
    ) -> Self {
        info!(workers = config.queue.max_workers, "job queue initialised");
        Self {
            core: Arc::new(QueueCore {
                state: Mutex::new(QueueState {
                    next_id: 1,
                    fifo: VecDeque::new(),
                    jobs: HashMap::new(),
                }),
                available: Condvar::new(),
                callbacks: Mutex::new(CallbackSlots::default()),
                active: AtomicUsize::new(0),
                stopping: AtomicBool::new(false),
                max_depth: config.queue.max_depth,
                gateway,
                directory,
            }),
            max_workers: config.queue.max_workers,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker pool.  Idempotent while running.
    pub fn start(&self) {
        let mut workers = self.workers.lock().expect("worker list lock poisoned");
        if !workers.is_empty() {
            debug!("job queue already running");
            return;
        }
        self.core.stopping.store(false, Ordering::SeqCst);
        for i in 0..self.max_workers {
            let core = Arc::clone(&self.core);
            let handle = std::thread::Builder::new()
                .name(format!("print-worker-{i}"))
                .spawn(move || worker_loop(core))
                .expect("failed to spawn print worker");
            workers.push(handle);
        }
        info!(workers = self.max_workers, "job queue started");
    }

    /// Signal the workers to stop and join them.  In-flight jobs finish.
    pub fn stop(&self) {
        {
            // Taking the state lock before flipping the flag closes the
            // race with a worker that just checked it and is about to wait.
            let _state = self.core.state.lock().expect("queue state lock poisoned");
            self.core.stopping.store(true, Ordering::SeqCst);
            self.core.available.notify_all();
        }
        let mut workers = self.workers.lock().expect("worker list lock poisoned");
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
        info!("job queue stopped");
    }

    /// Enqueue a job.  Fires the status callback for the Pending state and
    /// wakes one worker.
    #[instrument(skip(self, file_path, options), fields(printer = %printer_uri))]
    pub fn add_job(
        &self,
        printer_uri: &str,
        file_path: impl Into<PathBuf>,
        options: PrintOptions,
    ) -> Result<JobId> {
        let mut job = PrintJob::new(printer_uri, file_path, options);
        job.file_size = std::fs::metadata(&job.file_path)
            .map(|m| m.len())
            .unwrap_or(0);
        job.page_estimate = estimate_pages(job.file_size);

        let snapshot = {
            let mut state = self.core.state.lock().expect("queue state lock poisoned");
            if let Some(cap) = self.core.max_depth {
                if state.fifo.len() >= cap {
                    warn!(cap, "queue depth cap reached, rejecting submission");
                    return Err(PlotforgeError::QueueFull(cap));
                }
            }
            job.id = JobId(state.next_id);
            state.next_id += 1;
            state.jobs.insert(job.id, job.clone());
            job
        };

        info!(job_id = %snapshot.id, file = %snapshot.file_name, "job added");
        fire_status(&self.core, &snapshot);

        // Enqueue after the Pending notification so a fast worker cannot
        // report Processing first.
        {
            let mut state = self.core.state.lock().expect("queue state lock poisoned");
            state.fifo.push_back(snapshot.id);
            self.core.available.notify_one();
        }
        Ok(snapshot.id)
    }

    /// Cooperatively cancel a job.  Workers observe the flag at the next
    /// tick boundary; an already-dispatched payload stays with the spooler
    /// (use the gateway's own cancel for that).
    pub fn cancel_job(&self, id: JobId) -> bool {
        let snapshot = {
            let mut state = self.core.state.lock().expect("queue state lock poisoned");
            match state.jobs.get_mut(&id) {
                Some(job)
                    if !matches!(
                        job.status,
                        JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
                    ) =>
                {
                    job.status = JobStatus::Cancelled;
                    Some(job.clone())
                }
                _ => None,
            }
        };
        match snapshot {
            Some(job) => {
                info!(job_id = %id, "job cancelled");
                fire_status(&self.core, &job);
                true
            }
            None => false,
        }
    }

    /// Hold a Pending job back from the workers.
    pub fn pause_job(&self, id: JobId) -> bool {
        let snapshot = {
            let mut state = self.core.state.lock().expect("queue state lock poisoned");
            match state.jobs.get_mut(&id) {
                Some(job) if job.status == JobStatus::Pending => {
                    job.status = JobStatus::Paused;
                    Some(job.clone())
                }
                _ => None,
            }
        };
        match snapshot {
            Some(job) => {
                info!(job_id = %id, "job paused");
                fire_status(&self.core, &job);
                true
            }
            None => false,
        }
    }

    /// Return a Paused job to Pending and re-enqueue it.
    pub fn resume_job(&self, id: JobId) -> bool {
        let snapshot = {
            let mut state = self.core.state.lock().expect("queue state lock poisoned");
            match state.jobs.get_mut(&id) {
                Some(job) if job.status == JobStatus::Paused => {
                    job.status = JobStatus::Pending;
                    Some(job.clone())
                }
                _ => None,
            }
        };
        match snapshot {
            Some(job) => {
                info!(job_id = %id, "job resumed");
                fire_status(&self.core, &job);
                let mut state = self.core.state.lock().expect("queue state lock poisoned");
                state.fifo.push_back(id);
                self.core.available.notify_one();
                true
            }
            None => false,
        }
    }

    /// Re-enqueue a Failed or Cancelled job with cleared transient state.
    pub fn retry_job(&self, id: JobId) -> bool {
        let snapshot = {
            let mut state = self.core.state.lock().expect("queue state lock poisoned");
            match state.jobs.get_mut(&id) {
                Some(job) if job.status.is_retryable() => {
                    job.status = JobStatus::Pending;
                    job.error_message = None;
                    job.progress = 0.0;
                    job.started_at = None;
                    job.completed_at = None;
                    job.spooler_id = 0;
                    Some(job.clone())
                }
                Some(job) => {
                    warn!(job_id = %id, status = ?job.status, "job cannot be retried");
                    None
                }
                None => None,
            }
        };
        match snapshot {
            Some(job) => {
                info!(job_id = %id, "job queued for retry");
                fire_status(&self.core, &job);
                let mut state = self.core.state.lock().expect("queue state lock poisoned");
                state.fifo.push_back(id);
                self.core.available.notify_one();
                true
            }
            None => false,
        }
    }

    /// Redirect a Pending job to a different printer.
    pub fn move_job(&self, id: JobId, new_printer_uri: &str) -> bool {
        let mut state = self.core.state.lock().expect("queue state lock poisoned");
        match state.jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.printer_uri = new_printer_uri.to_string();
                info!(job_id = %id, printer = new_printer_uri, "job moved");
                true
            }
            _ => false,
        }
    }

    /// Snapshot of a single job.
    pub fn get_job(&self, id: JobId) -> Option<PrintJob> {
        self.core
            .state
            .lock()
            .expect("queue state lock poisoned")
            .jobs
            .get(&id)
            .cloned()
    }

    /// All jobs targeting a printer.
    pub fn jobs_for_printer(&self, printer_uri: &str) -> Vec<PrintJob> {
        self.core
            .state
            .lock()
            .expect("queue state lock poisoned")
            .jobs
            .values()
            .filter(|j| j.printer_uri == printer_uri)
            .cloned()
            .collect()
    }

    /// Jobs currently Processing or Printing.
    pub fn active_jobs(&self) -> Vec<PrintJob> {
        self.core
            .state
            .lock()
            .expect("queue state lock poisoned")
            .jobs
            .values()
            .filter(|j| j.status.is_active())
            .cloned()
            .collect()
    }

    /// Up to `limit` finished jobs (Completed or Failed).
    pub fn completed_jobs(&self, limit: usize) -> Vec<PrintJob> {
        self.core
            .state
            .lock()
            .expect("queue state lock poisoned")
            .jobs
            .values()
            .filter(|j| matches!(j.status, JobStatus::Completed | JobStatus::Failed))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of jobs waiting in the FIFO.
    pub fn queue_len(&self) -> usize {
        self.core
            .state
            .lock()
            .expect("queue state lock poisoned")
            .fifo
            .len()
    }

    /// Number of jobs currently claimed by workers.  Never exceeds the
    /// configured worker count.
    pub fn active_job_count(&self) -> usize {
        self.core.active.load(Ordering::SeqCst)
    }

    /// Rough wait estimate for a printer, based on its unfinished jobs.
    pub fn estimated_wait(&self, printer_uri: &str) -> Duration {
        let outstanding = self
            .jobs_for_printer(printer_uri)
            .iter()
            .filter(|j| j.status == JobStatus::Pending || j.status.is_active())
            .count() as u64;
        Duration::from_secs(outstanding * SECONDS_PER_QUEUED_JOB)
    }

    /// Register the status callback.  At most one registrant; registering
    /// again replaces it.
    pub fn set_status_callback(&self, callback: impl Fn(&PrintJob) + Send + Sync + 'static) {
        self.core
            .callbacks
            .lock()
            .expect("callback lock poisoned")
            .status = Some(Arc::new(callback));
    }

    /// Register the progress callback.  At most one registrant; registering
    /// again replaces it.
    pub fn set_progress_callback(&self, callback: impl Fn(JobId, f32) + Send + Sync + 'static) {
        self.core
            .callbacks
            .lock()
            .expect("callback lock poisoned")
            .progress = Some(Arc::new(callback));
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Worker internals
// ---------------------------------------------------------------------------

fn worker_loop(core: Arc<QueueCore>) {
    loop {
        // Claim the next runnable job, blocking on the condition variable
        // while the FIFO is empty.
        let claimed = {
            let mut state = core.state.lock().expect("queue state lock poisoned");
            loop {
                if core.stopping.load(Ordering::SeqCst) {
                    return;
                }
                if let Some(id) = state.fifo.pop_front() {
                    let Some(job) = state.jobs.get_mut(&id) else {
                        continue;
                    };
                    // Cancelled heads are dropped; Paused heads are dropped
                    // too and re-enqueued by resume_job.
                    if matches!(job.status, JobStatus::Cancelled | JobStatus::Paused) {
                        debug!(job_id = %id, status = ?job.status, "skipping queued job");
                        continue;
                    }
                    job.status = JobStatus::Processing;
                    job.started_at = Some(Utc::now());
                    break job.clone();
                }
                state = core
                    .available
                    .wait(state)
                    .expect("queue state lock poisoned");
            }
        };

        core.active.fetch_add(1, Ordering::SeqCst);
        info!(job_id = %claimed.id, printer = %claimed.printer_uri, "processing job");
        fire_status(&core, &claimed);

        let result = execute_job(&core, &claimed);

        let snapshot = {
            let mut state = core.state.lock().expect("queue state lock poisoned");
            state.jobs.get_mut(&claimed.id).map(|job| {
                match &result {
                    Ok(()) => {
                        // A cancellation that raced a successful dispatch
                        // stays Cancelled; the payload is with the spooler.
                        if job.status != JobStatus::Cancelled {
                            job.status = JobStatus::Completed;
                            job.completed_at = Some(Utc::now());
                            job.progress = 1.0;
                        }
                    }
                    Err(PlotforgeError::Cancelled) => {
                        job.status = JobStatus::Cancelled;
                    }
                    Err(e) => {
                        job.status = JobStatus::Failed;
                        job.error_message = Some(e.to_string());
                    }
                }
                job.clone()
            })
        };

        if let Some(job) = snapshot {
            match job.status {
                JobStatus::Completed => info!(job_id = %job.id, "job completed"),
                JobStatus::Cancelled => info!(job_id = %job.id, "job cancelled"),
                JobStatus::Failed => {
                    error!(
                        job_id = %job.id,
                        error = job.error_message.as_deref().unwrap_or("unknown"),
                        "job failed"
                    );
                }
                _ => {}
            }
            fire_status(&core, &job);
        }
        core.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Execute a claimed job.  Every error is caught by the caller and mapped
/// into the job record.
fn execute_job(core: &QueueCore, job: &PrintJob) -> Result<()> {
    if !job.file_path.exists() {
        return Err(PlotforgeError::FileMissing(
            job.file_path.display().to_string(),
        ));
    }

    if core.directory.is_plotter(&job.printer_uri) {
        execute_plotter_job(core, job)
    } else {
        execute_plain_job(core, job)
    }
}

/// Plain path: synthetic progress, then hand the source file to the spooler.
fn execute_plain_job(core: &QueueCore, job: &PrintJob) -> Result<()> {
    for pct in PROGRESS_STEPS {
        check_cancelled(core, job.id)?;
        set_progress(core, job.id, pct as f32 / 100.0);
        std::thread::sleep(TICK);
    }

    transition(core, job.id, JobStatus::Printing)?;
    let spooler_id = submit_to_spooler(core, job, &job.file_path)?;
    record_spooler_id(core, job.id, spooler_id);
    Ok(())
}

/// Plotter path: validate, synthesize the vendor payload, dispatch the
/// converted artifact, and clean it up.
fn execute_plotter_job(core: &QueueCore, job: &PrintJob) -> Result<()> {
    core.directory.validate_document(&job.printer_uri, &job.options)?;

    let source = std::fs::read(&job.file_path)?;
    let info = core.directory.advanced_info(&job.printer_uri)?;
    let generator = protocol::create_generator(info.recommended, info.vendor)?;

    // Tags were validated above; the fallbacks are unreachable.
    let media = MediaSize::from_tag(&job.options.media_size).unwrap_or(MediaSize::A4);
    let color = ColorMode::from_tag(&job.options.color_mode).unwrap_or(ColorMode::Monochrome);
    let dpi = job.options.dpi();
    let (mm_width, mm_height) = media.dimensions_mm();
    let width_px = mm_width * dpi * 10 / 254;
    let height_px = mm_height * dpi * 10 / 254;

    let header = generator.generate_header(&info.capabilities, media, color, dpi)?;
    let page = generator.generate_page(&source, width_px, height_px, dpi)?;
    let footer = generator.generate_footer()?;

    let mut payload = Vec::with_capacity(header.len() + page.len() + footer.len());
    payload.extend_from_slice(&header);
    payload.extend_from_slice(&page);
    payload.extend_from_slice(&footer);
    let payload = generator.optimize_for_vendor(payload);

    let converted = converted_path(&job.file_path);
    std::fs::write(&converted, &payload)?;
    info!(
        job_id = %job.id,
        protocol = %generator.protocol(),
        bytes = payload.len(),
        path = %converted.display(),
        "payload synthesized"
    );

    let result = transition(core, job.id, JobStatus::Printing)
        .and_then(|()| submit_to_spooler(core, job, &converted))
        .and_then(|spooler_id| {
            record_spooler_id(core, job.id, spooler_id);
            for pct in PROGRESS_STEPS {
                check_cancelled(core, job.id)?;
                set_progress(core, job.id, pct as f32 / 100.0);
                std::thread::sleep(TICK);
            }
            Ok(())
        });

    if let Err(e) = std::fs::remove_file(&converted) {
        warn!(path = %converted.display(), error = %e, "failed to remove converted artifact");
    }
    result
}

/// Sibling artifact path for a converted plotter payload.
fn converted_path(source: &Path) -> PathBuf {
    let mut path = source.as_os_str().to_owned();
    path.push(".converted");
    PathBuf::from(path)
}

fn estimate_pages(file_size: u64) -> u32 {
    ((file_size / BYTES_PER_PAGE) as u32).max(1)
}

fn submit_to_spooler(core: &QueueCore, job: &PrintJob, path: &Path) -> Result<i64> {
    match core.gateway.submit(&job.printer_uri, path, &job.options) {
        Ok(id) if id > 0 => Ok(id),
        Ok(id) => Err(PlotforgeError::SpoolerRejected(format!(
            "spooler returned invalid id {id}"
        ))),
        Err(e) => Err(PlotforgeError::SpoolerRejected(e.to_string())),
    }
}

fn record_spooler_id(core: &QueueCore, id: JobId, spooler_id: i64) {
    let mut state = core.state.lock().expect("queue state lock poisoned");
    if let Some(job) = state.jobs.get_mut(&id) {
        job.spooler_id = spooler_id;
    }
}

/// Fail with [`PlotforgeError::Cancelled`] if the job's cooperative
/// cancellation flag is set.
fn check_cancelled(core: &QueueCore, id: JobId) -> Result<()> {
    let state = core.state.lock().expect("queue state lock poisoned");
    match state.jobs.get(&id) {
        Some(job) if job.status == JobStatus::Cancelled => Err(PlotforgeError::Cancelled),
        Some(_) => Ok(()),
        None => Err(PlotforgeError::Cancelled),
    }
}

/// Move a job to `status` unless it was cancelled meanwhile, then notify.
fn transition(core: &QueueCore, id: JobId, status: JobStatus) -> Result<()> {
    let snapshot = {
        let mut state = core.state.lock().expect("queue state lock poisoned");
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or(PlotforgeError::Cancelled)?;
        if job.status == JobStatus::Cancelled {
            return Err(PlotforgeError::Cancelled);
        }
        job.status = status;
        job.clone()
    };
    fire_status(core, &snapshot);
    Ok(())
}

fn set_progress(core: &QueueCore, id: JobId, progress: f32) {
    {
        let mut state = core.state.lock().expect("queue state lock poisoned");
        if let Some(job) = state.jobs.get_mut(&id) {
            job.progress = progress;
        }
    }
    let callback = core
        .callbacks
        .lock()
        .expect("callback lock poisoned")
        .progress
        .clone();
    if let Some(callback) = callback {
        callback(id, progress);
    }
}

/// Invoke the status callback on a snapshot, outside every lock.
fn fire_status(core: &QueueCore, job: &PrintJob) {
    let callback = core
        .callbacks
        .lock()
        .expect("callback lock poisoned")
        .status
        .clone();
    if let Some(callback) = callback {
        callback(job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    use plotforge_core::types::DeviceRecord;

    use crate::spooler::testing::MockGateway;

    struct Harness {
        gateway: Arc<MockGateway>,
        queue: JobQueue,
        dir: tempfile::TempDir,
    }

    fn device(uri: &str, name: &str, make_model: &str) -> DeviceRecord {
        let mut record = DeviceRecord::unknown(uri);
        record.name = name.into();
        record.make_model = make_model.into();
        record.state = 3;
        record
    }

    fn harness(devices: Vec<DeviceRecord>, workers: usize) -> Harness {
        let gateway = Arc::new(MockGateway::new(devices));
        let mut config = EngineConfig::default();
        config.queue.max_workers = workers;
        let directory = Arc::new(DeviceDirectory::new(gateway.clone(), &config));
        directory.discover().expect("initial discovery");
        let queue = JobQueue::new(gateway.clone(), directory, &config);
        Harness {
            gateway,
            queue,
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn source_file(harness: &Harness, name: &str, contents: &[u8]) -> PathBuf {
        let path = harness.dir.path().join(name);
        std::fs::write(&path, contents).expect("write source");
        path
    }

    fn wait_for_status(queue: &JobQueue, id: JobId, status: JobStatus) -> PrintJob {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let job = queue.get_job(id).expect("job exists");
            if job.status == status {
                return job;
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {status:?}; job is {:?}",
                job.status
            );
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn payload_contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn job_ids_are_strictly_increasing() {
        let harness = harness(vec![device("cups://office1", "office1", "Generic")], 1);
        let file = source_file(&harness, "a.pdf", b"pdf");
        let mut last = 0;
        for _ in 0..5 {
            let id = harness
                .queue
                .add_job("cups://office1", &file, PrintOptions::default())
                .expect("add");
            assert!(id.0 > last, "ids must increase");
            last = id.0;
        }
    }

    #[test]
    fn plain_submit_runs_to_completion() {
        let harness = harness(vec![device("cups://office1", "office1", "Generic")], 1);
        let file = source_file(&harness, "a.pdf", b"%PDF-1.4 test document");

        let statuses: Arc<Mutex<Vec<JobStatus>>> = Arc::new(Mutex::new(Vec::new()));
        let ticks: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let statuses = Arc::clone(&statuses);
            harness
                .queue
                .set_status_callback(move |job| statuses.lock().expect("cb").push(job.status));
        }
        {
            let ticks = Arc::clone(&ticks);
            harness
                .queue
                .set_progress_callback(move |_, p| ticks.lock().expect("cb").push(p));
        }

        harness.queue.start();
        let options = PrintOptions {
            media_size: "A4".into(),
            color_mode: "monochrome".into(),
            copies: 1,
            quality: 3,
            ..Default::default()
        };
        let id = harness
            .queue
            .add_job("cups://office1", &file, options)
            .expect("add");

        let job = wait_for_status(&harness.queue, id, JobStatus::Completed);
        assert!(job.spooler_id > 0);
        assert!((job.progress - 1.0).abs() < f32::EPSILON);

        // Timestamps are ordered creation ≤ start ≤ completion.
        let started = job.started_at.expect("started");
        let completed = job.completed_at.expect("completed");
        assert!(job.created_at <= started);
        assert!(started <= completed);

        // Callbacks observed the lifecycle in order.
        let seen = statuses.lock().expect("statuses").clone();
        assert_eq!(
            seen,
            vec![
                JobStatus::Pending,
                JobStatus::Processing,
                JobStatus::Printing,
                JobStatus::Completed
            ]
        );

        // Progress ticks are non-decreasing and end at 1.0.
        let seen_ticks = ticks.lock().expect("ticks").clone();
        assert!(seen_ticks.len() >= 5);
        assert!(seen_ticks.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen_ticks.last().expect("last tick"), 1.0);

        assert_eq!(harness.gateway.submission_count(), 1);
    }

    #[test]
    fn plotter_submit_synthesizes_hpgl2() {
        let uri = "usb://HP/DesignJet?serial=42";
        let harness = harness(vec![device(uri, "plot-room", "HP DesignJet T1200")], 1);
        let file = source_file(&harness, "site-plan.pdf", b"%PDF-1.4 vector site plan");

        harness.queue.start();
        let options = PrintOptions {
            media_size: "A1".into(),
            color_mode: "color".into(),
            quality: 5,
            ..Default::default()
        };
        let id = harness.queue.add_job(uri, &file, options).expect("add");
        let job = wait_for_status(&harness.queue, id, JobStatus::Completed);
        assert!(job.spooler_id > 0);

        let submissions = harness.gateway.submissions.lock().expect("subs").clone();
        assert_eq!(submissions.len(), 1);
        let submission = &submissions[0];

        // The spooler received the converted artifact, not the source.
        assert!(
            submission.path.to_string_lossy().ends_with(".converted"),
            "submitted {:?}",
            submission.path
        );

        // HP-GL/2 envelope: reset first, A1 media code, 1200 DPI, color
        // pens, reset last.
        let payload = &submission.payload;
        assert!(payload.starts_with(b"\x1B.@"));
        assert!(payload_contains(payload, b"\x1B%0B"));
        assert!(payload_contains(payload, b"PMA1P;"));
        assert!(payload_contains(payload, b"PS1200;"));
        assert!(payload_contains(payload, b"MC3;"));
        assert!(payload.ends_with(b"\x1B.@"));

        // The artifact is gone once the job completed.
        assert!(!submission.path.exists());
    }

    #[test]
    fn incompatible_media_fails_before_submission() {
        let uri = "usb://HP/DesignJet?serial=42";
        let harness = harness(vec![device(uri, "plot-room", "HP DesignJet T1200")], 1);
        let file = source_file(&harness, "plan.pdf", b"%PDF-1.4");

        harness.queue.start();
        let options = PrintOptions {
            media_size: "B2".into(),
            ..Default::default()
        };
        let id = harness.queue.add_job(uri, &file, options).expect("add");

        let job = wait_for_status(&harness.queue, id, JobStatus::Failed);
        let message = job.error_message.expect("error message");
        assert!(message.contains("B2"), "got: {message}");
        assert_eq!(harness.gateway.submission_count(), 0);
        assert_eq!(job.spooler_id, 0);
    }

    #[test]
    fn cancel_is_observed_within_ticks() {
        let harness = harness(vec![device("cups://office1", "office1", "Generic")], 1);
        let file = source_file(&harness, "a.pdf", b"pdf");

        let ticks: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let ticks = Arc::clone(&ticks);
            harness
                .queue
                .set_progress_callback(move |_, p| ticks.lock().expect("cb").push(p));
        }

        harness.queue.start();
        let id = harness
            .queue
            .add_job("cups://office1", &file, PrintOptions::default())
            .expect("add");

        // Wait until the worker has started ticking, then cancel.
        let deadline = Instant::now() + Duration::from_secs(5);
        while ticks.lock().expect("cb").is_empty() {
            assert!(Instant::now() < deadline, "no progress observed");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(harness.queue.cancel_job(id));

        let job = wait_for_status(&harness.queue, id, JobStatus::Cancelled);
        // Never dispatched: core-side cancellation keeps the spooler id
        // clear.
        assert_eq!(job.spooler_id, 0);
        assert_eq!(harness.gateway.submission_count(), 0);

        // No further progress once the cancellation settled.
        std::thread::sleep(TICK * 2);
        let count = ticks.lock().expect("cb").len();
        std::thread::sleep(TICK * 3);
        assert_eq!(count, ticks.lock().expect("cb").len());
    }

    #[test]
    fn missing_source_file_fails() {
        let harness = harness(vec![device("cups://office1", "office1", "Generic")], 1);
        harness.queue.start();
        let id = harness
            .queue
            .add_job(
                "cups://office1",
                "/nonexistent/nowhere.pdf",
                PrintOptions::default(),
            )
            .expect("add");
        let job = wait_for_status(&harness.queue, id, JobStatus::Failed);
        assert!(job.error_message.expect("error").contains("missing"));
    }

    #[test]
    fn spooler_rejection_fails_the_job() {
        let harness = harness(vec![device("cups://office1", "office1", "Generic")], 1);
        let file = source_file(&harness, "a.pdf", b"pdf");
        harness.gateway.fail_submissions();

        harness.queue.start();
        let id = harness
            .queue
            .add_job("cups://office1", &file, PrintOptions::default())
            .expect("add");
        let job = wait_for_status(&harness.queue, id, JobStatus::Failed);
        assert!(job.error_message.expect("error").contains("rejected"));
        assert_eq!(job.spooler_id, 0);
    }

    #[test]
    fn cancel_then_retry_returns_to_pending_with_cleared_state() {
        // No workers: the job stays queued so the round trip is
        // deterministic.
        let harness = harness(vec![device("cups://office1", "office1", "Generic")], 1);
        let file = source_file(&harness, "a.pdf", b"pdf");
        let id = harness
            .queue
            .add_job("cups://office1", &file, PrintOptions::default())
            .expect("add");

        assert!(harness.queue.cancel_job(id));
        assert_eq!(
            harness.queue.get_job(id).expect("job").status,
            JobStatus::Cancelled
        );

        assert!(harness.queue.retry_job(id));
        let job = harness.queue.get_job(id).expect("job");
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.error_message.is_none());
        assert_eq!(job.progress, 0.0);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert_eq!(job.spooler_id, 0);
    }

    #[test]
    fn pause_resume_round_trip() {
        let harness = harness(vec![device("cups://office1", "office1", "Generic")], 1);
        let file = source_file(&harness, "a.pdf", b"pdf");
        let id = harness
            .queue
            .add_job("cups://office1", &file, PrintOptions::default())
            .expect("add");

        assert!(harness.queue.pause_job(id));
        assert_eq!(
            harness.queue.get_job(id).expect("job").status,
            JobStatus::Paused
        );
        // Pausing twice is a no-op.
        assert!(!harness.queue.pause_job(id));

        assert!(harness.queue.resume_job(id));
        assert_eq!(
            harness.queue.get_job(id).expect("job").status,
            JobStatus::Pending
        );
    }

    #[test]
    fn retry_of_non_terminal_job_is_rejected() {
        let harness = harness(vec![device("cups://office1", "office1", "Generic")], 1);
        let file = source_file(&harness, "a.pdf", b"pdf");
        let id = harness
            .queue
            .add_job("cups://office1", &file, PrintOptions::default())
            .expect("add");

        // Pending is not retryable.
        assert!(!harness.queue.retry_job(id));
        assert_eq!(
            harness.queue.get_job(id).expect("job").status,
            JobStatus::Pending
        );
    }

    #[test]
    fn unknown_job_operations_return_false() {
        let harness = harness(Vec::new(), 1);
        assert!(!harness.queue.cancel_job(JobId(999)));
        assert!(!harness.queue.retry_job(JobId(999)));
        assert!(!harness.queue.pause_job(JobId(999)));
        assert!(!harness.queue.resume_job(JobId(999)));
        assert!(harness.queue.get_job(JobId(999)).is_none());
    }

    #[test]
    fn queue_depth_cap_rejects_submissions() {
        let gateway = Arc::new(MockGateway::new(vec![device(
            "cups://office1",
            "office1",
            "Generic",
        )]));
        let mut config = EngineConfig::default();
        config.queue.max_depth = Some(1);
        let directory = Arc::new(DeviceDirectory::new(gateway.clone(), &config));
        let queue = JobQueue::new(gateway, directory, &config);
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("a.pdf");
        std::fs::write(&file, b"pdf").expect("write");

        queue
            .add_job("cups://office1", &file, PrintOptions::default())
            .expect("first fits");
        let err = queue
            .add_job("cups://office1", &file, PrintOptions::default())
            .unwrap_err();
        assert!(matches!(err, PlotforgeError::QueueFull(1)));
    }

    #[test]
    fn workers_idle_on_empty_queue_and_stop_cleanly() {
        let harness = harness(Vec::new(), 2);
        harness.queue.start();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(harness.queue.active_job_count(), 0);
        assert_eq!(harness.queue.queue_len(), 0);
        harness.queue.stop();
    }

    #[test]
    fn listing_queries_reflect_job_states() {
        let harness = harness(vec![device("cups://office1", "office1", "Generic")], 1);
        let file = source_file(&harness, "a.pdf", b"pdf");

        let id1 = harness
            .queue
            .add_job("cups://office1", &file, PrintOptions::default())
            .expect("add");
        let id2 = harness
            .queue
            .add_job("cups://other", &file, PrintOptions::default())
            .expect("add");

        assert_eq!(harness.queue.jobs_for_printer("cups://office1").len(), 1);
        assert_eq!(harness.queue.jobs_for_printer("cups://other").len(), 1);
        assert_eq!(harness.queue.queue_len(), 2);
        assert_eq!(
            harness.queue.estimated_wait("cups://office1"),
            Duration::from_secs(30)
        );
        assert!(harness.queue.completed_jobs(10).is_empty());

        assert!(harness.queue.move_job(id2, "cups://office1"));
        assert_eq!(harness.queue.jobs_for_printer("cups://office1").len(), 2);

        // Run everything to completion and re-check.
        harness.queue.start();
        wait_for_status(&harness.queue, id1, JobStatus::Completed);
        wait_for_status(&harness.queue, id2, JobStatus::Completed);
        assert_eq!(harness.queue.completed_jobs(10).len(), 2);
        assert!(harness.queue.active_jobs().is_empty());
    }

    #[test]
    fn bounded_pool_never_exceeds_worker_count() {
        let harness = harness(vec![device("cups://office1", "office1", "Generic")], 2);
        let file = source_file(&harness, "a.pdf", b"pdf");
        harness.queue.start();

        let ids: Vec<JobId> = (0..6)
            .map(|_| {
                harness
                    .queue
                    .add_job("cups://office1", &file, PrintOptions::default())
                    .expect("add")
            })
            .collect();

        let deadline = Instant::now() + Duration::from_secs(15);
        loop {
            assert!(harness.queue.active_job_count() <= 2);
            let done = ids
                .iter()
                .all(|id| harness.queue.get_job(*id).expect("job").status == JobStatus::Completed);
            if done {
                break;
            }
            assert!(Instant::now() < deadline, "jobs did not finish");
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}
