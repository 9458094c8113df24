use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::registers::*;

/// The controller's single interrupt output. It is level sensitive: the sink
/// is told the current level after every change that could affect it, and
/// may see the same level many times in a row.
pub trait InterruptSink {
    fn set_level(&mut self, level: bool);
}

/// Forward every level to a channel, for hosts that collect interrupts on
/// another thread. A disconnected receiver is ignored.
impl InterruptSink for Sender<bool> {
    fn set_level(&mut self, level: bool) {
        let _ = self.send(level);
    }
}

/// Keep the current level in a shared flag the host can poll.
impl InterruptSink for Arc<AtomicBool> {
    fn set_level(&mut self, level: bool) {
        self.store(level, Ordering::SeqCst);
    }
}

/// A sink for hosts that don't wire up the interrupt line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInterrupt;

impl InterruptSink for NoInterrupt {
    fn set_level(&mut self, _level: bool) {
        // no-op
    }
}

/// The interrupt line level for the given register contents: only while
/// idle, and then either for a finished command with interrupts enabled or
/// for an attention line whose enable bit is set.
pub fn interrupt_level(w0: u16, w7: u16) -> bool {
    let idle = w7 & W7_IDLE != 0;
    let finished = w7 & W7_INT_ENABLE != 0 && w7 & (W7_COMPLETE | W7_ERROR) != 0;
    let attention = ((w0 & W0_ATTENTION_LINES) >> 4) & w0 & W0_ATTENTION_ENABLES != 0;
    idle && (finished || attention)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_truth_table() {
        // Exhaustively combine the bits that matter.
        for bits in 0..(1u16 << 6) {
            let idle = bits & 0b000001 != 0;
            let int_enable = bits & 0b000010 != 0;
            let complete = bits & 0b000100 != 0;
            let error = bits & 0b001000 != 0;
            let line = bits & 0b010000 != 0;
            let enable = bits & 0b100000 != 0;

            let mut w7 = 0;
            if idle { w7 |= W7_IDLE; }
            if int_enable { w7 |= W7_INT_ENABLE; }
            if complete { w7 |= W7_COMPLETE; }
            if error { w7 |= W7_ERROR; }
            let mut w0 = W0_OFFLINE | W0_UNSAFE;  // Status bits must not matter.
            if line { w0 |= attention_line(1); }
            if enable { w0 |= attention_enable(1); }

            let expected = idle && ((int_enable && (complete || error)) || (line && enable));
            assert_eq!(interrupt_level(w0, w7), expected, "w0={:#06X} w7={:#06X}", w0, w7);
        }
    }

    #[test]
    fn test_attention_needs_matching_enable() {
        let w0 = attention_line(0) | attention_enable(1);
        assert!(!interrupt_level(w0, W7_IDLE));
        let w0 = attention_line(3) | attention_enable(3);
        assert!(interrupt_level(w0, W7_IDLE));
    }

    #[test]
    fn test_sinks() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut sink = Arc::clone(&flag);
        sink.set_level(true);
        assert!(flag.load(Ordering::SeqCst));

        let (mut tx, rx) = std::sync::mpsc::channel();
        tx.set_level(true);
        tx.set_level(true);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![true, true]);
        drop(rx);
        tx.set_level(false);
    }
}
