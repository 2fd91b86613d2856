use super::mock_test_prelude::*;

#[test]
pub fn stop_before_start_disables_start() {
    with_mockvm(MockVM::default(), QUIET, |gc, _| {
        assert!(matches!(gc.stop(), Err(GCControlError::NotStarted)));
        assert!(matches!(
            gc.initialize_collection(),
            Err(GCControlError::AlreadyStarted)
        ));
        assert_eq!(gc.gc_mode(), GCMode::None);
    })
}

#[test]
pub fn start_and_stop_once() {
    with_mockvm(MockVM::default(), QUIET, |gc, _| {
        gc.initialize_collection().unwrap();
        assert!(matches!(
            gc.initialize_collection(),
            Err(GCControlError::AlreadyStarted)
        ));
        gc.stop().unwrap();
        assert_eq!(gc.gc_mode(), GCMode::Stopped);
        assert!(gc.policy().is_at_shutdown());
        // A second stop finds nothing to do.
        gc.stop().unwrap();
        assert!(matches!(
            gc.initialize_collection(),
            Err(GCControlError::AlreadyStarted)
        ));
    })
}

#[test]
pub fn graceful_shutdown_stops_control_loop() {
    with_mockvm(MockVM::default(), QUIET, |gc, mock| {
        gc.initialize_collection().unwrap();
        gc.prepare_for_graceful_shutdown();
        assert!(gc.in_graceful_shutdown());
        assert!(wait_until(TIMEOUT_MILLIS, || gc.gc_mode() == GCMode::Stopped));

        // Requests are no longer serviced.
        gc.handle_alloc_failure(&AllocRequest::for_tlab(8), false);
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!mock.degenerated_cycle.is_called());
        assert!(!mock.full_cycle.is_called());
        gc.stop().unwrap();
    })
}

#[test]
pub fn stop_releases_blocked_mutators() {
    with_mockvm(MockVM::default(), QUIET, |gc, mock| {
        gc.initialize_collection().unwrap();
        gc.prepare_for_graceful_shutdown();
        assert!(wait_until(TIMEOUT_MILLIS, || gc.gc_mode() == GCMode::Stopped));

        let mutator = {
            let gc = gc.clone();
            std::thread::spawn(move || {
                gc.handle_alloc_failure(&AllocRequest::for_shared(8), true)
            })
        };
        let requester = {
            let gc = gc.clone();
            std::thread::spawn(move || gc.request_gc(GCCause::JavaLangSystemGc))
        };
        assert!(wait_until(TIMEOUT_MILLIS, || {
            gc.controller().alloc_failure_waiter_count() == 1
        }));

        let gc = gc.clone();
        let mock = mock.clone();
        panic_after(TIMEOUT_MILLIS, move || {
            gc.stop().unwrap();
            mutator.join().unwrap();
            requester.join().unwrap();
            assert!(!mock.degenerated_cycle.is_called());
            assert!(!mock.full_cycle.is_called());
            // Nothing blocks once stopped.
            gc.handle_alloc_failure(&AllocRequest::for_shared(8), true);
            gc.request_gc(GCCause::JavaLangSystemGc);
        });
    })
}

#[test]
pub fn stop_cancels_cycle_in_flight() {
    let mock = MockVM {
        concurrent_cycle: MockMethod::new_fixed(Box::new(
            |(_, cancel): (CycleRequest, &'static CancelledGC)| {
                assert!(wait_until(TIMEOUT_MILLIS, || cancel.is_cancelled()));
                ConcurrentOutcome::Cancelled(DegenerationPoint::Evac)
            },
        )),
        ..MockVM::default()
    };
    with_mockvm(mock, QUIET, |gc, mock| {
        gc.initialize_collection().unwrap();
        assert!(gc
            .controller()
            .request_concurrent_gc(gc.heuristics().global_generation()));
        assert!(wait_until(TIMEOUT_MILLIS, || mock.concurrent_cycle.is_called()));

        let stopper = gc.clone();
        panic_after(TIMEOUT_MILLIS, move || stopper.stop().unwrap());
        assert_eq!(gc.controller().cancelled_gc().cause(), GCCause::StopVm);
        assert_eq!(mock.cancel_gc.call_count(), 1);
        assert!(!mock.degenerated_cycle.is_called());
        assert_eq!(gc.policy().success_concurrent_gcs(), 0);
        assert_eq!(gc.gc_mode(), GCMode::Stopped);
    })
}
