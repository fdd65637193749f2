//! Fixed-width framing: classify 10-octet windows and carry partial frames
//! across reads.
//!
//! The framing is strictly fixed-width. A line of any other length is
//! invalid; a short final line before EOF is invalid, not truncated-valid.
//! The decoder never back-tracks and never buffers more than nine octets.

use crate::constants::{DIGIT_COUNT, LINE_LEN, TERMINATE_LINE};

/// One complete frame recognized on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Nine ASCII digits, newline stripped.
    Digits([u8; DIGIT_COUNT]),
    /// The in-band shutdown command.
    Terminate,
}

/// A window that is neither a digit line nor the terminate line. The
/// connection that produced it must be closed; no further parsing happens
/// on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidFrame;

/// Classify one 10-octet window.
pub fn classify(window: &[u8; LINE_LEN]) -> Result<Frame, InvalidFrame> {
    if window[DIGIT_COUNT] == b'\n' && window[..DIGIT_COUNT].iter().all(u8::is_ascii_digit) {
        let mut digits = [0u8; DIGIT_COUNT];
        digits.copy_from_slice(&window[..DIGIT_COUNT]);
        return Ok(Frame::Digits(digits));
    }
    if window == TERMINATE_LINE {
        return Ok(Frame::Terminate);
    }
    Err(InvalidFrame)
}

/// Parse nine ASCII digits into their integer value. The caller guarantees
/// the bytes are digits; `classify` validated them.
pub fn parse_digits(digits: &[u8; DIGIT_COUNT]) -> u32 {
    digits
        .iter()
        .fold(0u32, |value, b| value * 10 + u32::from(b & 0x0F))
}

/// Per-connection decoder. Holds at most one partial frame between reads.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    carry: [u8; LINE_LEN],
    carry_len: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of octets carried over from a previous read.
    pub fn carried(&self) -> usize {
        self.carry_len
    }

    /// Pull the next frame out of `input`, advancing it past consumed bytes.
    ///
    /// Returns `Ok(None)` once `input` is drained; any 1–9 octet remainder
    /// has been moved into the carry buffer for the next call. On
    /// `InvalidFrame` the caller must stop feeding this decoder and close
    /// the connection.
    pub fn next_frame(&mut self, input: &mut &[u8]) -> Result<Option<Frame>, InvalidFrame> {
        if self.carry_len != 0 {
            let take = (LINE_LEN - self.carry_len).min(input.len());
            self.carry[self.carry_len..self.carry_len + take].copy_from_slice(&input[..take]);
            self.carry_len += take;
            *input = &input[take..];
            if self.carry_len < LINE_LEN {
                return Ok(None);
            }
            self.carry_len = 0;
            let window = self.carry;
            return classify(&window).map(Some);
        }

        if input.len() >= LINE_LEN {
            let mut window = [0u8; LINE_LEN];
            window.copy_from_slice(&input[..LINE_LEN]);
            *input = &input[LINE_LEN..];
            return classify(&window).map(Some);
        }

        if !input.is_empty() {
            self.carry[..input.len()].copy_from_slice(input);
            self.carry_len = input.len();
            *input = &input[input.len()..];
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn drain(decoder: &mut FrameDecoder, mut input: &[u8]) -> Result<Vec<Frame>, InvalidFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = decoder.next_frame(&mut input)? {
            frames.push(frame);
        }
        Ok(frames)
    }

    #[test]
    fn classifies_digit_line() {
        assert_eq!(
            classify(b"000000042\n"),
            Ok(Frame::Digits(*b"000000042"))
        );
    }

    #[test]
    fn classifies_terminate_line() {
        assert_eq!(classify(b"terminate\n"), Ok(Frame::Terminate));
    }

    #[test]
    fn rejects_non_digit_and_missing_newline() {
        assert_eq!(classify(b"00000004a\n"), Err(InvalidFrame));
        assert_eq!(classify(b"0000000420"), Err(InvalidFrame));
        // CR before LF makes the digit count eight
        assert_eq!(classify(b"00000042\r\n"), Err(InvalidFrame));
    }

    #[test]
    fn parses_digits() {
        assert_eq!(parse_digits(b"000000000"), 0);
        assert_eq!(parse_digits(b"000000042"), 42);
        assert_eq!(parse_digits(b"999999999"), 999_999_999);
    }

    #[test]
    fn whole_frames_in_one_read() {
        let mut decoder = FrameDecoder::new();
        let frames = drain(&mut decoder, b"000000001\n000000002\n").unwrap();
        assert_eq!(
            frames,
            vec![
                Frame::Digits(*b"000000001"),
                Frame::Digits(*b"000000002")
            ]
        );
        assert_eq!(decoder.carried(), 0);
    }

    #[test]
    fn frame_split_across_two_reads() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(drain(&mut decoder, b"00000").unwrap(), vec![]);
        assert_eq!(decoder.carried(), 5);
        let frames = drain(&mut decoder, b"0001\n").unwrap();
        assert_eq!(frames, vec![Frame::Digits(*b"000000001")]);
        assert_eq!(decoder.carried(), 0);
    }

    #[test]
    fn one_byte_feeds() {
        let mut decoder = FrameDecoder::new();
        let stream = b"000000123\nterminate\n";
        let mut frames = Vec::new();
        for byte in stream {
            frames.extend(drain(&mut decoder, std::slice::from_ref(byte)).unwrap());
        }
        assert_eq!(
            frames,
            vec![Frame::Digits(*b"000000123"), Frame::Terminate]
        );
    }

    #[test]
    fn second_partial_frame_in_same_read_is_rebuffered() {
        let mut decoder = FrameDecoder::new();
        // carry 3, then a read that completes the first frame and leaves a
        // new 4-octet partial
        assert_eq!(drain(&mut decoder, b"000").unwrap(), vec![]);
        let frames = drain(&mut decoder, b"000007\n0000").unwrap();
        assert_eq!(frames, vec![Frame::Digits(*b"000000007")]);
        assert_eq!(decoder.carried(), 4);
        let frames = drain(&mut decoder, b"00008\n").unwrap();
        assert_eq!(frames, vec![Frame::Digits(*b"000000008")]);
    }

    #[test]
    fn invalid_window_reports_error() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(drain(&mut decoder, b"12345\n12345\n"), Err(InvalidFrame));
    }

    #[test]
    fn invalid_spanning_carry_reports_error() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(drain(&mut decoder, b"12345\n").unwrap(), vec![]);
        assert_eq!(drain(&mut decoder, b"0000"), Err(InvalidFrame));
    }

    proptest! {
        /// Any concatenation of valid frames split at arbitrary boundaries
        /// decodes to exactly the original frame sequence.
        #[test]
        fn framing_survives_arbitrary_segmentation(
            values in proptest::collection::vec(0u32..1_000_000_000, 1..40),
            cuts in proptest::collection::vec(any::<u16>(), 0..48),
        ) {
            let mut stream = Vec::new();
            for v in &values {
                stream.extend_from_slice(format!("{v:09}\n").as_bytes());
            }

            let mut boundaries: Vec<usize> =
                cuts.iter().map(|c| *c as usize % (stream.len() + 1)).collect();
            boundaries.push(0);
            boundaries.push(stream.len());
            boundaries.sort_unstable();
            boundaries.dedup();

            let mut decoder = FrameDecoder::new();
            let mut decoded = Vec::new();
            for pair in boundaries.windows(2) {
                let mut chunk = &stream[pair[0]..pair[1]];
                while let Some(frame) = decoder.next_frame(&mut chunk).unwrap() {
                    match frame {
                        Frame::Digits(d) => decoded.push(parse_digits(&d)),
                        Frame::Terminate => unreachable!("stream holds digit lines only"),
                    }
                }
            }

            prop_assert_eq!(decoded, values);
            prop_assert_eq!(decoder.carried(), 0);
        }
    }
}
