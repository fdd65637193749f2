//! Producer side of the journal: multi-producer ring publish with
//! backpressure from disk to network.

use std::sync::Arc;

use disruptor::{
    build_multi_producer, BusySpin, EventPoller, MultiProducer, MultiProducerBarrier, Producer,
    RingBufferFull, SingleConsumerBarrier,
};

use crate::constants::DIGIT_COUNT;
use crate::ring_types::DigitsEvent;
use crate::shutdown::Shutdown;
use crate::wait::{WaitPolicy, Waiter};

pub type DigitsProducer = MultiProducer<DigitsEvent, SingleConsumerBarrier>;
pub type DigitsPoller = EventPoller<DigitsEvent, MultiProducerBarrier>;

/// Build the journal ring. The poller goes to the single journal-writer
/// thread; the producer handle is cloned into every connection worker.
pub fn build_ring(capacity: usize) -> (DigitsProducer, DigitsPoller) {
    let builder = build_multi_producer(capacity, DigitsEvent::factory, BusySpin);
    let (poller, builder) = builder.new_event_poller();
    (builder.build(), poller)
}

/// Per-worker handle for enqueueing digit messages. Clones share the ring;
/// once the last clone drops, the poller reports shutdown and the writer
/// drains whatever remains.
pub struct Journal {
    producer: DigitsProducer,
    shutdown: Arc<Shutdown>,
    waiter: Arc<Waiter>,
    policy: WaitPolicy,
}

impl Journal {
    pub fn new(
        producer: DigitsProducer,
        shutdown: Arc<Shutdown>,
        waiter: Arc<Waiter>,
        policy: WaitPolicy,
    ) -> Self {
        Self {
            producer,
            shutdown,
            waiter,
            policy,
        }
    }

    /// Copy nine digits into the next free ring slot and publish it. Spins
    /// while the ring is full; the claim protocol bounds how long any one
    /// producer waits. Once shutdown has triggered this is a no-op, so a
    /// producer stuck on a full ring cannot outlive the drain.
    pub fn write(&mut self, digits: &[u8; DIGIT_COUNT]) {
        loop {
            if self.shutdown.is_stopped() {
                return;
            }
            match self.producer.try_publish(|slot| slot.digits = *digits) {
                Ok(_) => break,
                Err(RingBufferFull) => std::hint::spin_loop(),
            }
        }
        if self.policy == WaitPolicy::Block {
            self.waiter.notify();
        }
    }
}

impl Clone for Journal {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
            shutdown: Arc::clone(&self.shutdown),
            waiter: Arc::clone(&self.waiter),
            policy: self.policy,
        }
    }
}
