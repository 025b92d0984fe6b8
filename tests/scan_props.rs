//! Property tests for the scan decoder

use std::time::{Duration, Instant};

use proptest::prelude::*;

use packcam::scan::{ScanDecoder, INTER_CHAR_GAP};

fn feed_burst(decoder: &mut ScanDecoder, text: &str, start: Instant) -> Vec<String> {
    let mut out = Vec::new();
    for (i, ch) in text.chars().enumerate() {
        let now = start + Duration::from_millis(i as u64 * 5);
        if let Some(event) = decoder.push_char_at(ch, now) {
            out.push(event.code);
        }
    }
    out
}

proptest! {
    /// No input sequence ever produces an empty or padded barcode.
    #[test]
    fn emitted_codes_are_trimmed_and_non_empty(input in "[ -~\r\n]{0,64}") {
        let mut decoder = ScanDecoder::new();
        for code in feed_burst(&mut decoder, &input, Instant::now()) {
            prop_assert!(!code.is_empty());
            prop_assert_eq!(code.trim(), code.as_str());
        }
    }

    /// A clean burst of printable payload plus terminator round-trips.
    #[test]
    fn clean_burst_round_trips(payload in "[0-9A-Za-z-]{1,32}") {
        let mut decoder = ScanDecoder::new();
        let codes = feed_burst(&mut decoder, &format!("{payload}\r"), Instant::now());
        prop_assert_eq!(codes, vec![payload]);
    }

    /// Characters older than the inter-char gap never leak into a burst.
    #[test]
    fn stale_prefix_never_leaks(
        stale in "[0-9A-Za-z]{1,8}",
        payload in "[0-9A-Za-z]{1,16}",
        extra_ms in 1u64..5_000,
    ) {
        let start = Instant::now();
        let mut decoder = ScanDecoder::new();

        feed_burst(&mut decoder, &stale, start);

        let burst_start = start
            + Duration::from_millis(stale.len() as u64 * 5)
            + INTER_CHAR_GAP
            + Duration::from_millis(extra_ms);
        let codes = feed_burst(&mut decoder, &format!("{payload}\r"), burst_start);

        prop_assert_eq!(codes, vec![payload]);
    }

    /// Consecutive terminated bursts each emit exactly once, in order.
    #[test]
    fn consecutive_bursts_emit_in_order(codes in prop::collection::vec("[0-9A-Z]{1,16}", 1..5)) {
        let mut decoder = ScanDecoder::new();
        let input: String = codes.iter().map(|c| format!("{c}\r")).collect();
        let emitted = feed_burst(&mut decoder, &input, Instant::now());
        prop_assert_eq!(emitted, codes);
    }
}
