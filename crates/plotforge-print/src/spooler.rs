// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The spooler gateway seam.
//
// The engine never talks wire protocols to devices directly for plain
// submissions; it hands finalized payloads to a spooler (CUPS, Windows
// print service, or a direct IPP bridge) behind this trait.  Every call may
// block and may fail — callers treat the gateway as a remote collaborator.

use std::path::Path;

use plotforge_core::error::Result;
use plotforge_core::types::{DeviceRecord, PrintOptions};

/// Abstract sink for finalized print payloads.
pub trait SpoolerGateway: Send + Sync {
    /// Enumerate the devices the spooler knows about.
    ///
    /// Records carry the spooler-side state integer and state-reason
    /// keywords; reachability (`is_online`) is resolved later by the device
    /// directory.
    fn enumerate(&self) -> Result<Vec<DeviceRecord>>;

    /// Submit a document to a device.  Returns the spooler-assigned job id
    /// (always positive) on success.
    fn submit(&self, printer_uri: &str, path: &Path, options: &PrintOptions) -> Result<i64>;

    /// Ask the spooler to cancel one of its jobs.
    ///
    /// This is distinct from core-side job cancellation: the queue cannot
    /// unsend a dispatched payload, only the spooler can.
    fn cancel(&self, spooler_id: i64) -> Result<()>;

    /// Fetch (partial) attributes for a single device by URI.
    fn printer_attributes(&self, uri: &str) -> Result<DeviceRecord>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory gateway double used by directory and queue tests.

    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::time::Duration;

    use plotforge_core::error::PlotforgeError;

    use super::*;

    /// A recorded submission: target URI, submitted path, and the payload
    /// bytes as they existed at submission time.
    #[derive(Debug, Clone)]
    pub struct RecordedSubmission {
        pub printer_uri: String,
        pub path: PathBuf,
        pub payload: Vec<u8>,
        pub options: PrintOptions,
    }

    /// Scriptable in-memory spooler gateway.
    #[derive(Default)]
    pub struct MockGateway {
        pub devices: Mutex<Vec<DeviceRecord>>,
        pub submissions: Mutex<Vec<RecordedSubmission>>,
        pub cancelled: Mutex<Vec<i64>>,
        next_id: AtomicI64,
        fail_submit: AtomicBool,
        submit_delay: Mutex<Duration>,
    }

    impl MockGateway {
        pub fn new(devices: Vec<DeviceRecord>) -> Self {
            Self {
                devices: Mutex::new(devices),
                next_id: AtomicI64::new(0),
                ..Default::default()
            }
        }

        /// Make every subsequent submit fail with `SpoolerRejected`.
        pub fn fail_submissions(&self) {
            self.fail_submit.store(true, Ordering::SeqCst);
        }

        /// Delay every submit, to widen cancellation windows in tests.
        pub fn set_submit_delay(&self, delay: Duration) {
            *self.submit_delay.lock().expect("delay lock poisoned") = delay;
        }

        pub fn submission_count(&self) -> usize {
            self.submissions.lock().expect("submissions lock poisoned").len()
        }
    }

    impl SpoolerGateway for MockGateway {
        fn enumerate(&self) -> Result<Vec<DeviceRecord>> {
            Ok(self.devices.lock().expect("devices lock poisoned").clone())
        }

        fn submit(&self, printer_uri: &str, path: &Path, options: &PrintOptions) -> Result<i64> {
            let delay = *self.submit_delay.lock().expect("delay lock poisoned");
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            if self.fail_submit.load(Ordering::SeqCst) {
                return Err(PlotforgeError::SpoolerRejected(
                    "mock gateway configured to fail".into(),
                ));
            }

            // Capture the payload now: callers may delete the file right
            // after submission (converted plotter artifacts do).
            let payload = std::fs::read(path)?;
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.submissions
                .lock()
                .expect("submissions lock poisoned")
                .push(RecordedSubmission {
                    printer_uri: printer_uri.to_string(),
                    path: path.to_path_buf(),
                    payload,
                    options: options.clone(),
                });
            Ok(id)
        }

        fn cancel(&self, spooler_id: i64) -> Result<()> {
            self.cancelled
                .lock()
                .expect("cancelled lock poisoned")
                .push(spooler_id);
            Ok(())
        }

        fn printer_attributes(&self, uri: &str) -> Result<DeviceRecord> {
            self.devices
                .lock()
                .expect("devices lock poisoned")
                .iter()
                .find(|d| d.uri == uri)
                .cloned()
                .ok_or_else(|| PlotforgeError::Discovery(format!("no such device: {uri}")))
        }
    }
}
