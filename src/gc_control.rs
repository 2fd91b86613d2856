//! The control plane instance and its builder.

use crate::heuristics::HeuristicsSet;
use crate::plan::{CollectorPolicy, GCCause, OldGeneration};
use crate::scheduler::{Controller, GCMode, Regulator};
use crate::util::alloc_request::AllocRequest;
use crate::util::error::{GCControlError, GCControlResult};
use crate::util::options::Options;
use crate::util::shared::SharedSemaphore;
use crate::vm::{Collection, Heap};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Build a [`GCControl`] instance.
///
/// Options are read from `GC_CONTROL_*` environment variables when the builder is created, and
/// can be overridden with [`set_option`](GCControlBuilder::set_option) before
/// [`build`](GCControlBuilder::build).
pub struct GCControlBuilder {
    pub options: Options,
}

impl GCControlBuilder {
    pub fn new() -> Self {
        GCControlBuilder {
            options: Options::default(),
        }
    }

    /// Set an option.  Returns `false` if the name is unknown or the value is invalid.
    pub fn set_option(&mut self, name: &str, val: &str) -> bool {
        self.options.set_from_str(name, val)
    }

    /// Set options from whitespace separated `name=value` pairs.  Returns `true` if every pair
    /// was set.
    pub fn set_options_bulk_by_str(&mut self, options: &str) -> bool {
        self.options.set_bulk_from_str(options)
    }

    /// Create the control plane on top of the runtime's `heap` and `collection`.  No thread
    /// runs until [`GCControl::initialize_collection`].
    pub fn build(&self, heap: Arc<dyn Heap>, collection: Arc<dyn Collection>) -> GCControl {
        GCControl::new(Arc::new(self.options.clone()), heap, collection)
    }
}

impl Default for GCControlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the control plane consists of: the heuristics of every generation, the controller
/// and the regulator.  One per heap.
///
/// Mutators reach the control plane through a shared reference to this object.
pub struct GCControl {
    pub(crate) options: Arc<Options>,
    heuristics: Arc<HeuristicsSet>,
    old_generation: Arc<OldGeneration>,
    controller: Arc<Controller>,
    regulator: Arc<Regulator>,
    /// One permit: the service threads start at most once, and never after `stop`.
    start_permits: SharedSemaphore,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl GCControl {
    pub fn new(options: Arc<Options>, heap: Arc<dyn Heap>, collection: Arc<dyn Collection>) -> Self {
        let old_generation = Arc::new(OldGeneration::new());
        let heuristics = Arc::new(HeuristicsSet::new(&heap, &options, &old_generation));
        let controller = Arc::new(Controller::new(
            options.clone(),
            heap,
            collection,
            heuristics.clone(),
            old_generation.clone(),
        ));
        let regulator = Arc::new(Regulator::new(
            controller.clone(),
            heuristics.clone(),
            options.clone(),
        ));
        GCControl {
            options,
            heuristics,
            old_generation,
            controller,
            regulator,
            start_permits: SharedSemaphore::new(1),
            threads: Mutex::new(vec![]),
        }
    }

    /// Start the control and regulator threads.  Only the first call starts them.
    pub fn initialize_collection(&self) -> GCControlResult<()> {
        if !self.start_permits.try_acquire() {
            return Err(GCControlError::AlreadyStarted);
        }
        let mut threads = self.threads.lock().unwrap();
        threads.push(self.controller.spawn()?);
        threads.push(self.regulator.spawn()?);
        info!(
            "Started control and regulator threads ({} regulation)",
            self.regulator.mode()
        );
        Ok(())
    }

    /// Stop and join the service threads, then release every thread still waiting on the
    /// controller.  Afterwards the services can never be started again.
    pub fn stop(&self) -> GCControlResult<()> {
        if self.start_permits.claim_all() {
            // Never started.  Claiming the permit makes sure it never will be.
            return Err(GCControlError::NotStarted);
        }
        let threads = std::mem::take(&mut *self.threads.lock().unwrap());
        if threads.is_empty() {
            debug!("Service threads already stopped");
            return Ok(());
        }

        self.controller.stop_service();
        self.regulator.wake_up();
        for handle in threads {
            let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
            if handle.join().is_err() {
                warn!("{} panicked", name);
            }
        }
        self.controller.wake_all_waiters();
        self.controller.policy().print_gc_stats();
        Ok(())
    }

    /// See [`Controller::handle_alloc_failure`].
    pub fn handle_alloc_failure(&self, req: &AllocRequest, block: bool) {
        self.controller.handle_alloc_failure(req, block)
    }

    /// See [`Controller::handle_alloc_failure_evac`].
    pub fn handle_alloc_failure_evac(&self, words: usize) {
        self.controller.handle_alloc_failure_evac(words)
    }

    /// See [`Controller::request_gc`].
    pub fn request_gc(&self, cause: GCCause) {
        self.controller.request_gc(cause)
    }

    pub fn pacing_notify_alloc(&self, words: usize) {
        self.controller.pacing_notify_alloc(words)
    }

    pub fn notify_heap_changed(&self) {
        self.regulator.notify_heap_changed()
    }

    /// Class metadata space is exhausted.  The regulator will ask for a global cycle that
    /// unloads classes.
    pub fn handle_metaspace_oom(&self) {
        self.heuristics.global().record_metaspace_oom();
        self.notify_heap_changed();
    }

    pub fn prepare_for_graceful_shutdown(&self) {
        self.controller.prepare_for_graceful_shutdown()
    }

    pub fn in_graceful_shutdown(&self) -> bool {
        self.controller.in_graceful_shutdown()
    }

    pub fn get_gc_id(&self) -> usize {
        self.controller.get_gc_id()
    }

    pub fn gc_mode(&self) -> GCMode {
        self.controller.gc_mode()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn heuristics(&self) -> &HeuristicsSet {
        &self.heuristics
    }

    pub fn old_generation(&self) -> &OldGeneration {
        &self.old_generation
    }

    pub fn policy(&self) -> &CollectorPolicy {
        self.controller.policy()
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    pub fn regulator(&self) -> &Arc<Regulator> {
        &self.regulator
    }
}
