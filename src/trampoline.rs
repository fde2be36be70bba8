//! Runs settlement and release work iteratively on the current thread
//!
//! Settling the head of a long chain settles every link after it, and dropping
//! a long pending chain drops every link after it. Done directly, both nest a
//! few stack frames per link. Instead the work is pushed here, and only the
//! outermost caller loops over it.

use std::cell::{Cell, RefCell};
use std::mem;

pub(crate) type Job = Box<dyn FnOnce()>;

struct Trampoline {
    // set while some frame is draining `jobs`, nested calls only push
    running: Cell<bool>,

    // a stack, so work queued by a job runs before that job's later siblings
    jobs: RefCell<Vec<Job>>,
}

thread_local! {
    static TRAMPOLINE: Trampoline = Trampoline {
        running: Cell::new(false),
        jobs: RefCell::new(Vec::new()),
    };
}

impl Trampoline {
    fn run(&self, batch: Vec<Job>) {
        self.jobs.borrow_mut().extend(batch.into_iter().rev());

        // An outer frame is already looping, it will pick these up
        if self.running.replace(true) {
            return;
        }

        let _running = Running(self);
        loop {
            let job = self.jobs.borrow_mut().pop();
            match job {
                Some(job) => job(),
                None => break,
            }
        }
    }
}

/// Clears the running flag, even when a job panics
struct Running<'a>(&'a Trampoline);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.running.set(false);
        if std::thread::panicking() {
            // work queued behind the panicking job is abandoned
            let abandoned = mem::take(&mut *self.0.jobs.borrow_mut());
            drop(abandoned);
        }
    }
}

/// Runs the jobs in order before returning, unless called from inside a job
///
/// Nested calls queue their jobs to run right after the current job returns,
/// ahead of anything that was queued before.
pub(crate) fn run(batch: Vec<Job>) {
    if batch.is_empty() {
        return;
    }
    let mut batch = Some(batch);
    let _ = TRAMPOLINE.try_with(|trampoline| {
        if let Some(batch) = batch.take() {
            trampoline.run(batch);
        }
    });
    // thread locals are being torn down, run in place
    if let Some(batch) = batch {
        for job in batch {
            job();
        }
    }
}

/// Drops the value through the trampoline
pub(crate) fn release<T: 'static>(value: T) {
    let job: Job = Box::new(move || drop(value));
    run(vec![job]);
}
