//! Execution-context hook for store work and client callbacks.

/// Runs a unit of work in a caller-chosen context.
///
/// Implementations must run `job` exactly once before returning. The hook only
/// decides *where* the work executes (inside a UI batch, under a span, ...);
/// ordering is unchanged.
pub trait Schedule: Send + Sync {
    fn run(&self, job: &mut dyn FnMut());
}

/// Runs work in place on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Schedule for Immediate {
    #[inline]
    fn run(&self, job: &mut dyn FnMut()) {
        job()
    }
}

impl<F> Schedule for F
where
    F: Fn(&mut dyn FnMut()) + Send + Sync,
{
    fn run(&self, job: &mut dyn FnMut()) {
        self(job)
    }
}
