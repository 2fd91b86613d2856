//! Runtime-to-control-plane interface: safe Rust APIs.
//!
//! This module provides a safe Rust API for gc-control.  We expect the runtime to call these
//! functions from its allocation slow paths, its explicit GC entry points and its boot and
//! shutdown sequences, and to expose them to native code itself if it needs to.

use crate::gc_control::{GCControl, GCControlBuilder};
use crate::plan::GCCause;
use crate::util::alloc_request::AllocRequest;
use crate::util::error::GCControlResult;
use crate::vm::{Collection, Heap};
use std::sync::Arc;

/// Initialize a control plane instance.
///
/// We expect a runtime to initialize the control plane in the following steps:
///
/// 1. Create a [`GCControlBuilder`] instance.
/// 2. Set options by [process()](./fn.process.html) or [process_bulk()](./fn.process_bulk.html).
/// 3. Call this function with the builder and the runtime's heap and collection.
/// 4. Once the runtime can run collector threads, call
///    [initialize_collection()](./fn.initialize_collection.html).  No cycle runs before that.
///
/// Note that this method will attempt to initialize a logger.  If the runtime would like to use
/// its own logger, it should initialize the logger before calling this method.
///
/// Arguments:
/// * `builder`: The reference to a builder.
/// * `heap`: Heap accounting of the runtime.
/// * `collection`: The collection phases of the runtime.
pub fn gc_control_init(
    builder: &GCControlBuilder,
    heap: Arc<dyn Heap>,
    collection: Arc<dyn Collection>,
) -> Box<GCControl> {
    match crate::util::logger::try_init() {
        Ok(_) => debug!("gc-control initialized the logger."),
        Err(_) => debug!(
            "gc-control failed to initialize the logger. Possibly a logger has been initialized by user."
        ),
    }
    debug!(
        "Built for {} ({} profile) with features: {}",
        crate::build_info::GC_CONTROL_TARGET,
        crate::build_info::GC_CONTROL_PROFILE,
        crate::build_info::GC_CONTROL_FEATURES
    );
    let gc = builder.build(heap, collection);
    info!(
        "Initialized gc-control {} with {} heuristics{}",
        crate::build_info::GC_CONTROL_PKG_VERSION,
        gc.heuristics().global().name(),
        if gc.heuristics().is_generational() {
            " (generational)"
        } else {
            ""
        }
    );
    Box::new(gc)
}

/// Start the control and regulator threads.  This is a mandatory call for a runtime during its
/// boot process once its thread system is ready.  It should only be called once.
///
/// Arguments:
/// * `gc`: A reference to a control plane instance.
pub fn initialize_collection(gc: &GCControl) -> GCControlResult<()> {
    gc.initialize_collection()
}

/// Stop the service threads.  The cycle in flight is cancelled, and every mutator still waiting
/// for a cycle is released.
///
/// Arguments:
/// * `gc`: A reference to a control plane instance.
pub fn stop(gc: &GCControl) -> GCControlResult<()> {
    gc.stop()
}

/// Process a run-time option.  Returns true if the option is processed successfully.
///
/// Arguments:
/// * `builder`: A reference to a builder.
/// * `name`: The name of the option.
/// * `value`: The value of the option (as a string).
pub fn process(builder: &mut GCControlBuilder, name: &str, value: &str) -> bool {
    builder.set_option(name, value)
}

/// Process multiple run-time options.  Returns true if all the options are processed
/// successfully.
///
/// Arguments:
/// * `builder`: A reference to a builder.
/// * `options`: a string that is key value pairs separated by white spaces, e.g.
///   "heuristics=static full_gc_threshold=5"
pub fn process_bulk(builder: &mut GCControlBuilder, options: &str) -> bool {
    builder.set_options_bulk_by_str(options)
}

/// A mutator failed to allocate.  With `block`, the call returns once a collection has run (or
/// the control plane has stopped); the caller then retries the allocation and reports
/// out-of-memory itself if it fails again.
///
/// Arguments:
/// * `gc`: A reference to a control plane instance.
/// * `req`: The allocation that failed.
/// * `block`: Wait for the collection.
pub fn handle_alloc_failure(gc: &GCControl, req: &AllocRequest, block: bool) {
    gc.handle_alloc_failure(req, block)
}

/// A collector thread failed to allocate while evacuating.  Never blocks.
///
/// Arguments:
/// * `gc`: A reference to a control plane instance.
/// * `words`: The size of the failed allocation, in words.
pub fn handle_alloc_failure_evac(gc: &GCControl, words: usize) {
    gc.handle_alloc_failure_evac(words)
}

/// Request a collection and wait until it has completed.  Explicit requests are dropped when
/// the `ignore_system_gc` option is set.
///
/// Arguments:
/// * `gc`: A reference to a control plane instance.
/// * `cause`: Why the collection is requested.
pub fn request_gc(gc: &GCControl, cause: GCCause) {
    gc.request_gc(cause)
}

/// The user requested a collection, e.g. by `System.gc()`.
///
/// Arguments:
/// * `gc`: A reference to a control plane instance.
pub fn handle_user_collection_request(gc: &GCControl) {
    gc.request_gc(GCCause::JavaLangSystemGc)
}

/// Class metadata space is exhausted.
///
/// Arguments:
/// * `gc`: A reference to a control plane instance.
pub fn handle_metaspace_oom(gc: &GCControl) {
    gc.handle_metaspace_oom()
}

/// Mutators allocated `words` words.  Cheap, and only approximately counted.
///
/// Arguments:
/// * `gc`: A reference to a control plane instance.
/// * `words`: The number of words allocated.
pub fn pacing_notify_alloc(gc: &GCControl, words: usize) {
    gc.pacing_notify_alloc(words)
}

/// The heap changed in a way the heuristics should look at soon.
///
/// Arguments:
/// * `gc`: A reference to a control plane instance.
pub fn notify_heap_changed(gc: &GCControl) {
    gc.notify_heap_changed()
}

/// Let the cycle in flight finish, but start no new one.
///
/// Arguments:
/// * `gc`: A reference to a control plane instance.
pub fn prepare_for_graceful_shutdown(gc: &GCControl) {
    gc.prepare_for_graceful_shutdown()
}

/// The id of the current (or last) cycle.  Increases by one every cycle.
///
/// Arguments:
/// * `gc`: A reference to a control plane instance.
pub fn get_gc_id(gc: &GCControl) -> usize {
    gc.get_gc_id()
}
