//! Offset-indexed song events.

use alloc::vec::Vec;

use crate::command::Command;

/// One decoded command at a unique byte offset of a track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SongEvent {
    /// Absolute ROM offset of the opcode
    pub offset: usize,
    /// Encoded length in bytes (opcode + operands)
    pub size: u8,
    /// What the bytes decode to
    pub command: Command,
    /// Absolute ticks at which playback reaches this offset, in visit order
    pub ticks: Vec<u32>,
}

impl SongEvent {
    /// Create an event that has not been visited yet.
    pub fn new(offset: usize, size: u8, command: Command) -> Self {
        Self {
            offset,
            size,
            command,
            ticks: Vec::new(),
        }
    }

    /// Offset of the command that follows in ROM order.
    pub fn next_offset(&self) -> usize {
        self.offset + self.size as usize
    }
}

/// Find the event at `offset` in a track's event list (sorted by offset).
pub fn find_event(events: &[SongEvent], offset: usize) -> Option<usize> {
    events.binary_search_by_key(&offset, |e| e.offset).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn next_offset_skips_operands() {
        let ev = SongEvent::new(0x100, 3, Command::Voice(2));
        assert_eq!(ev.next_offset(), 0x103);
    }

    #[test]
    fn find_event_by_offset() {
        let events = vec![
            SongEvent::new(0x10, 2, Command::Voice(1)),
            SongEvent::new(0x12, 1, Command::Rest { ticks: 4 }),
            SongEvent::new(0x13, 1, Command::Finish),
        ];
        assert_eq!(find_event(&events, 0x12), Some(1));
        assert_eq!(find_event(&events, 0x11), None);
    }
}
