//! Lock-free note event queue into the synth
//!
//! Same pattern as the engine command queue: the control thread pushes,
//! the audio thread drains everything pending at the start of each block.

/// Capacity of the note queue. Pushes beyond it fail instead of blocking.
pub const NOTE_QUEUE_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteEvent {
    On { note: u8, velocity: f32 },
    Off { note: u8 },
    /// Release every sounding voice
    AllOff,
}

/// Control-thread end of the note queue
pub struct NoteSender {
    producer: rtrb::Producer<NoteEvent>,
}

impl NoteSender {
    /// Queue an event; returns `false` if the queue is full
    pub fn send(&mut self, event: NoteEvent) -> bool {
        self.producer.push(event).is_ok()
    }

    pub fn note_on(&mut self, note: u8, velocity: f32) -> bool {
        self.send(NoteEvent::On { note, velocity })
    }

    pub fn note_off(&mut self, note: u8) -> bool {
        self.send(NoteEvent::Off { note })
    }

    pub fn all_notes_off(&mut self) -> bool {
        self.send(NoteEvent::AllOff)
    }
}

/// Audio-thread end of the note queue
pub struct NoteReceiver {
    consumer: rtrb::Consumer<NoteEvent>,
}

impl NoteReceiver {
    #[inline]
    pub fn pop(&mut self) -> Option<NoteEvent> {
        self.consumer.pop().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

/// Create a connected sender/receiver pair
pub fn note_queue() -> (NoteSender, NoteReceiver) {
    let (producer, consumer) = rtrb::RingBuffer::new(NOTE_QUEUE_CAPACITY);
    (NoteSender { producer }, NoteReceiver { consumer })
}
