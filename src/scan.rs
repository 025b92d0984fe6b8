//! Barcode scan decoding
//!
//! Hardware barcode scanners emulate a keyboard: a scan arrives as a fast
//! burst of character events terminated by CR/LF. The decoder accumulates
//! the burst and emits one complete barcode per terminator. A long pause
//! between characters restarts the buffer, which keeps interleaved manual
//! typing from leaking into a code.

use std::time::{Duration, Instant};

/// Maximum pause between two characters of the same scan burst.
pub const INTER_CHAR_GAP: Duration = Duration::from_millis(200);

/// A completed barcode scan. Produced once, consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub code: String,
    pub timestamp: Instant,
}

/// Accumulates character events into discrete barcode strings.
///
/// Pure and synchronous: no blocking, no external calls. Terminator
/// characters are always consumed here and must not be forwarded to
/// whatever control has input focus.
#[derive(Debug)]
pub struct ScanDecoder {
    buf: String,
    last_char_at: Option<Instant>,
}

impl Default for ScanDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanDecoder {
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            last_char_at: None,
        }
    }

    /// Feed one character event with an explicit timestamp.
    ///
    /// Returns a completed barcode when `ch` terminates a non-empty burst.
    pub fn push_char_at(&mut self, ch: char, now: Instant) -> Option<ScanEvent> {
        // A stale buffer belongs to an abandoned burst or to manual typing.
        if let Some(last) = self.last_char_at {
            if now.duration_since(last) > INTER_CHAR_GAP {
                self.buf.clear();
            }
        }
        self.last_char_at = Some(now);

        if ch == '\r' || ch == '\n' {
            let code = self.buf.trim().to_string();
            self.buf.clear();
            if code.is_empty() {
                return None;
            }
            return Some(ScanEvent {
                code,
                timestamp: now,
            });
        }

        if !ch.is_control() {
            self.buf.push(ch);
        }
        None
    }

    /// Feed one character event stamped with the current time.
    pub fn push_char(&mut self, ch: char) -> Option<ScanEvent> {
        self.push_char_at(ch, Instant::now())
    }

    /// Characters currently buffered (incomplete burst).
    pub fn pending(&self) -> &str {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(decoder: &mut ScanDecoder, text: &str, start: Instant) -> Vec<String> {
        let mut out = Vec::new();
        for (i, ch) in text.chars().enumerate() {
            let now = start + Duration::from_millis(i as u64 * 10);
            if let Some(event) = decoder.push_char_at(ch, now) {
                out.push(event.code);
            }
        }
        out
    }

    #[test]
    fn test_burst_emits_on_terminator() {
        let mut decoder = ScanDecoder::new();
        let codes = feed(&mut decoder, "12345678\r", Instant::now());
        assert_eq!(codes, vec!["12345678".to_string()]);
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn test_newline_also_terminates() {
        let mut decoder = ScanDecoder::new();
        let codes = feed(&mut decoder, "ABC-001\n", Instant::now());
        assert_eq!(codes, vec!["ABC-001".to_string()]);
    }

    #[test]
    fn test_empty_buffer_never_emits() {
        let mut decoder = ScanDecoder::new();
        let start = Instant::now();
        assert!(decoder.push_char_at('\r', start).is_none());
        assert!(decoder.push_char_at('\n', start).is_none());
    }

    #[test]
    fn test_whitespace_only_buffer_never_emits() {
        let mut decoder = ScanDecoder::new();
        let codes = feed(&mut decoder, "   \r", Instant::now());
        assert!(codes.is_empty());
    }

    #[test]
    fn test_slow_typing_discarded_before_burst() {
        let mut decoder = ScanDecoder::new();
        let start = Instant::now();

        // Manual typing, one key every half second
        decoder.push_char_at('x', start);
        decoder.push_char_at('y', start + Duration::from_millis(500));

        // Scanner burst begins 500ms later; the stale buffer must go
        let burst = start + Duration::from_millis(1000);
        let mut codes = Vec::new();
        for (i, ch) in "777\r".chars().enumerate() {
            if let Some(e) = decoder.push_char_at(ch, burst + Duration::from_millis(i as u64 * 5)) {
                codes.push(e.code);
            }
        }
        assert_eq!(codes, vec!["777".to_string()]);
    }

    #[test]
    fn test_control_characters_ignored() {
        let mut decoder = ScanDecoder::new();
        let start = Instant::now();
        decoder.push_char_at('A', start);
        decoder.push_char_at('\t', start + Duration::from_millis(5));
        decoder.push_char_at('B', start + Duration::from_millis(10));
        let event = decoder
            .push_char_at('\r', start + Duration::from_millis(15))
            .unwrap();
        assert_eq!(event.code, "AB");
    }

    #[test]
    fn test_two_consecutive_scans() {
        let mut decoder = ScanDecoder::new();
        let codes = feed(&mut decoder, "one\rtwo\r", Instant::now());
        assert_eq!(codes, vec!["one".to_string(), "two".to_string()]);
    }
}
