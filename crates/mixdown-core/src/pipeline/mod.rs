//! Hand-off primitives between pipeline stages
//!
//! - [`PacketQueue`]: bounded FIFO of compressed units (reader → decoder)
//! - [`ring_buffer`]: blocking byte ring of canonical PCM (decoder → mixer)
//!
//! Both are shared by exactly one producer thread and one consumer thread of
//! a single source. Every blocking wait also watches an abort flag, so a
//! source can always be stopped even while one of its threads is parked.

mod packet_queue;
pub mod ring_buffer;

pub use packet_queue::{PacketQueue, QueueError, DEFAULT_QUEUE_CAPACITY};
pub use ring_buffer::{
    sample_ring, RingBufferError, RingMode, SampleReader, SampleWriter, DEFAULT_RING_BUFFER_BYTES,
};
