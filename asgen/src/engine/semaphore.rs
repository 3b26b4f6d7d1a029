//! A small counting semaphore.
//!
//! Caps how many workers may hold a package archive open at once, which
//! keeps disk pressure bounded while the rayon pool stays fully sized
//! for the CPU-bound parts of the pipeline.

use std::sync::{Condvar, Mutex};

pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

pub struct Permit<'a> {
    semaphore: &'a Semaphore,
}

impl Semaphore {
    pub fn new(permits: usize) -> Semaphore {
        Semaphore {
            permits: Mutex::new(permits.max(1)),
            available: Condvar::new(),
        }
    }

    pub fn acquire(&self) -> Permit<'_> {
        let mut permits = self.permits.lock().expect("semaphore poisoned");
        while *permits == 0 {
            permits = self.available.wait(permits).expect("semaphore poisoned");
        }
        *permits -= 1;
        Permit { semaphore: self }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut permits = self.semaphore.permits.lock().expect("semaphore poisoned");
        *permits += 1;
        self.semaphore.available.notify_one();
    }
}
