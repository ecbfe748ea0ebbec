//! Deferred reclamation for data shared with the audio thread
//!
//! A single `basedrop` collector lives on a background "audio-gc" thread.
//! Values handed to the audio thread are wrapped in `Shared<T>` (or published
//! through a `SharedCell<T>`); when the audio thread drops the last reference
//! the pointer is only enqueued, and the actual free happens here.
//!
//! Together with `SharedCell::replace`, which spins until no reader is between
//! loading the pointer and bumping its refcount, this gives the retirement
//! barrier a buffer swap needs: a retired buffer is freed only after every
//! realtime reader has let go of it.
//!
//! ```ignore
//! use basedrop::Shared;
//! use crate::engine::gc::gc_handle;
//!
//! let buffer = Shared::new(&gc_handle(), AudioBuffer::silence(44100, 2, 1024));
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Interval between collection passes
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    // Collector is !Sync, so it is created on the thread that runs it
    thread::Builder::new()
        .name("audio-gc".to_string())
        .spawn(move || {
            let mut collector = Collector::new();
            tx.send(collector.handle()).expect("Failed to send GC handle");

            log::info!("Audio GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn audio GC thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Handle for creating `Shared<T>` allocations
///
/// Starts the collector thread on first use. Cloning the handle is cheap.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::{Shared, SharedCell};

    #[test]
    fn test_handle_is_reusable() {
        let a = Shared::new(&gc_handle(), vec![1.0_f32; 16]);
        let b = Shared::new(&gc_handle(), vec![2.0_f32; 16]);
        assert_eq!(a[0], 1.0);
        assert_eq!(b[15], 2.0);
    }

    #[test]
    fn test_reader_keeps_retired_value_alive() {
        let cell = SharedCell::new(Shared::new(&gc_handle(), vec![1.0_f32; 4]));
        let reader_view = cell.get();

        cell.set(Shared::new(&gc_handle(), vec![2.0_f32; 8]));

        assert_eq!(reader_view.len(), 4);
        assert_eq!(reader_view[3], 1.0);
        assert_eq!(cell.get().len(), 8);
    }
}
