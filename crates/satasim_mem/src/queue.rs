//! Circular queue of in-flight bus responses.
//!
//! Each step the head moves forward one slot. A request accepted on a step
//! is recorded at the head; the slot `delay` behind the head is the one whose
//! response comes due. Capacity is the next power of two at or above the
//! delay, so a slot is never reused before its response is read.

/// Fixed-capacity delay line of acknowledgment flags and read data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayQueue {
    capacity: usize,
    delay: usize,
    /// Words per slot.
    width: usize,
    head: usize,
    acks: Vec<bool>,
    data: Vec<u32>,
}

impl DelayQueue {
    /// Creates a queue delivering responses `delay` steps after acceptance,
    /// with `width` data words per slot. `delay` must be non-zero.
    pub fn new(delay: usize, width: usize) -> Self {
        debug_assert!(delay > 0, "delay must be at least one step");
        let capacity = delay.max(1).next_power_of_two();
        Self {
            capacity,
            delay: delay.max(1),
            width,
            head: 0,
            acks: vec![false; capacity],
            data: vec![0; capacity * width],
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Steps from acceptance to acknowledgment.
    pub fn delay(&self) -> usize {
        self.delay
    }

    fn tail(&self) -> usize {
        (self.head + self.capacity - self.delay) % self.capacity
    }

    /// Moves to the next step. Copies the due slot's data into `out` and
    /// returns its acknowledgment flag, then frees the due slot and the new
    /// head slot.
    pub fn advance(&mut self, out: &mut [u32]) -> bool {
        self.head = (self.head + 1) % self.capacity;
        let tail = self.tail();
        let ack = std::mem::replace(&mut self.acks[tail], false);
        let slot = &self.data[tail * self.width..(tail + 1) * self.width];
        for (o, &d) in out.iter_mut().zip(slot) {
            *o = d;
        }
        self.acks[self.head] = false;
        ack
    }

    /// Records a request accepted this step. Reads pass the words to return.
    pub fn accept(&mut self, read_data: Option<&[u32]>) {
        self.acks[self.head] = true;
        if let Some(words) = read_data {
            let base = self.head * self.width;
            for (k, &w) in words.iter().take(self.width).enumerate() {
                self.data[base + k] = w;
            }
        }
    }

    /// Drops every in-flight response and rewinds the cursors.
    pub fn clear(&mut self) {
        self.head = 0;
        self.acks.fill(false);
    }

    /// Responses accepted but not yet delivered.
    pub fn in_flight(&self) -> usize {
        self.acks.iter().filter(|&&a| a).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_next_power_of_two() {
        assert_eq!(DelayQueue::new(1, 1).capacity(), 1);
        assert_eq!(DelayQueue::new(3, 1).capacity(), 4);
        assert_eq!(DelayQueue::new(4, 1).capacity(), 4);
        assert_eq!(DelayQueue::new(5, 1).capacity(), 8);
    }

    #[test]
    fn response_arrives_exactly_delay_steps_later() {
        for delay in [1, 2, 3, 4, 5, 8] {
            let mut q = DelayQueue::new(delay, 1);
            let mut out = [0u32];
            assert!(!q.advance(&mut out));
            q.accept(Some(&[0xABCD][..]));
            for step in 1..delay {
                assert!(!q.advance(&mut out), "delay {delay}: early ack at {step}");
            }
            assert!(q.advance(&mut out), "delay {delay}: no ack");
            assert_eq!(out[0], 0xABCD);
            assert!(!q.advance(&mut out));
        }
    }

    #[test]
    fn back_to_back_requests_stay_in_order() {
        let mut q = DelayQueue::new(3, 1);
        let mut out = [0u32];
        let mut seen = Vec::new();
        for i in 0..10u32 {
            if q.advance(&mut out) {
                seen.push(out[0]);
            }
            if i < 5 {
                q.accept(Some(&[i][..]));
            }
            assert!(q.in_flight() <= q.delay());
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn clear_drops_in_flight() {
        let mut q = DelayQueue::new(2, 1);
        let mut out = [0u32];
        q.advance(&mut out);
        q.accept(None);
        assert_eq!(q.in_flight(), 1);
        q.clear();
        assert_eq!(q.in_flight(), 0);
        assert!((0..8).all(|_| !q.advance(&mut out)));
    }
}
