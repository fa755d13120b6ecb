use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct Statistics {
    pub num_fetches: Arc<AtomicUsize>,
    pub num_fetch_errors: Arc<AtomicUsize>,
    pub num_scans: Arc<AtomicUsize>,
    pub num_scan_errors: Arc<AtomicUsize>,
    pub num_extractions: Arc<AtomicUsize>,
    pub num_extract_faults: Arc<AtomicUsize>,
    pub num_images: Arc<AtomicUsize>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            num_fetches: Arc::new(AtomicUsize::new(0)),
            num_fetch_errors: Arc::new(AtomicUsize::new(0)),
            num_scans: Arc::new(AtomicUsize::new(0)),
            num_scan_errors: Arc::new(AtomicUsize::new(0)),
            num_extractions: Arc::new(AtomicUsize::new(0)),
            num_extract_faults: Arc::new(AtomicUsize::new(0)),
            num_images: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Statistics {
    pub fn write_to_log(&self, running_time: Duration) {
        tracing::info!(
            num_fetches = self.num_fetches.load(Ordering::Relaxed),
            num_fetch_errors = self.num_fetch_errors.load(Ordering::Relaxed),
            num_scans = self.num_scans.load(Ordering::Relaxed),
            num_scan_errors = self.num_scan_errors.load(Ordering::Relaxed),
            num_extractions = self.num_extractions.load(Ordering::Relaxed),
            num_extract_faults = self.num_extract_faults.load(Ordering::Relaxed),
            num_images = self.num_images.load(Ordering::Relaxed),
            running_time = ?running_time,
            "statistics"
        );
    }
}
