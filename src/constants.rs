//! Wire-protocol constants shared by the server, the test client, and tests.

/// Number of ASCII digits in one message.
pub const DIGIT_COUNT: usize = 9;

/// One frame on the wire: nine digits plus a trailing newline.
pub const LINE_LEN: usize = DIGIT_COUNT + 1;

/// In-band shutdown command, byte-for-byte.
pub const TERMINATE_LINE: &[u8; LINE_LEN] = b"terminate\n";

/// Number of distinct nine-digit values.
pub const KEY_SPACE: u32 = 1_000_000_000;
