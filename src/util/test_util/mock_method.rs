use std::sync::atomic::{AtomicUsize, Ordering};

/// A mocked hook that counts its calls.
///
/// Unlike a plain closure, a `MockMethod` can be shared by the control thread, the regulator and
/// any number of mutators at once: calls take `&self` and the count is atomic.
pub struct MockMethod<I, R> {
    imp: MockImpl<I, R>,
    call_count: AtomicUsize,
}

pub enum MockImpl<I, R> {
    /// Calls cycle through the closures in order.
    Sequence(Vec<MockClosureSignature<I, R>>),
    Fixed(MockClosureSignature<I, R>),
}

pub type MockClosureSignature<I, R> = Box<dyn Fn(I) -> R + Send + Sync>;

impl<I, R> std::default::Default for MockMethod<I, R> {
    fn default() -> Self {
        Self::new_unimplemented()
    }
}

impl<I, R> MockMethod<I, R> {
    fn with_imp(imp: MockImpl<I, R>) -> Self {
        Self {
            imp,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn new_unimplemented() -> Self {
        Self::with_imp(MockImpl::Fixed(Box::new(|_| unimplemented!())))
    }

    pub fn new_default() -> Self
    where
        R: Default,
    {
        Self::with_imp(MockImpl::Fixed(Box::new(|_| R::default())))
    }

    pub fn new_fixed(closure: MockClosureSignature<I, R>) -> Self {
        Self::with_imp(MockImpl::Fixed(closure))
    }

    pub fn new_sequence(closures: Vec<MockClosureSignature<I, R>>) -> Self {
        assert!(!closures.is_empty());
        Self::with_imp(MockImpl::Sequence(closures))
    }

    pub fn call(&self, args: I) -> R {
        let cur_call = self.call_count.fetch_add(1, Ordering::SeqCst);

        match &self.imp {
            MockImpl::Sequence(closures) => {
                let len = closures.len();
                closures[cur_call % len](args)
            }
            MockImpl::Fixed(closure) => closure(args),
        }
    }

    pub fn is_called(&self) -> bool {
        self.call_count() > 0
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}
