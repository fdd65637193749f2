use crate::constants::DIGIT_COUNT;

/// Entry in the journal ring. Pre-allocated per slot by the factory;
/// producers copy nine digits in inside the publish closure, the journal
/// writer reads them back out. Slots are cache-line sized so neighboring
/// sequences do not false-share.
#[repr(C, align(64))]
pub struct DigitsEvent {
    pub digits: [u8; DIGIT_COUNT],
}

impl DigitsEvent {
    /// Factory for the disruptor: slots start zeroed and are overwritten on
    /// every publish.
    pub fn factory() -> Self {
        Self {
            digits: [0u8; DIGIT_COUNT],
        }
    }
}
