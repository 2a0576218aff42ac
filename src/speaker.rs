//! PC speaker: PIT channel 2 gated onto the speaker through port 0x61.

use crate::io::{inb, outb};
use crate::pit;

const SPEAKER_PORT: u16 = 0x61;
/// Bit 0 gates channel 2, bit 1 connects its output to the speaker.
const SPEAKER_ENABLE: u8 = 0b11;

/// Channel 2, lo/hi bytes, mode 3 (square wave), binary.
const CMD_CH2_SQUARE: u8 = 0xB6;

/// One note of a track. A frequency of zero is a rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub frequency: u32,
    pub duration_ms: u32,
}

impl Note {
    pub const fn new(frequency: u32, duration_ms: u32) -> Self {
        Self { frequency, duration_ms }
    }

    pub const fn rest(duration_ms: u32) -> Self {
        Self::new(notes::R, duration_ms)
    }

    pub fn is_rest(&self) -> bool {
        self.frequency == 0
    }
}

/// Equal temperament frequencies, rounded to whole Hz.
pub mod notes {
    pub const R: u32 = 0;

    pub const C4: u32 = 262;
    pub const CS4: u32 = 277;
    pub const D4: u32 = 294;
    pub const DS4: u32 = 311;
    pub const E4: u32 = 330;
    pub const F4: u32 = 349;
    pub const FS4: u32 = 370;
    pub const G4: u32 = 392;
    pub const GS4: u32 = 415;
    pub const A4: u32 = 440;
    pub const AS4: u32 = 466;
    pub const B4: u32 = 494;

    pub const C5: u32 = 523;
    pub const CS5: u32 = 554;
    pub const D5: u32 = 587;
    pub const DS5: u32 = 622;
    pub const E5: u32 = 659;
    pub const F5: u32 = 698;
    pub const FS5: u32 = 740;
    pub const G5: u32 = 784;
    pub const GS5: u32 = 831;
    pub const A5: u32 = 880;
    pub const AS5: u32 = 932;
    pub const B5: u32 = 988;
}

/// Start a square wave at `frequency` Hz. Zero stops the speaker.
pub fn play(frequency: u32) {
    if frequency == 0 {
        stop();
        return;
    }
    let divisor = pit::divisor_for(frequency);
    unsafe {
        outb(pit::CMD, CMD_CH2_SQUARE);
        outb(pit::CH2_DATA, divisor as u8);
        outb(pit::CH2_DATA, (divisor >> 8) as u8);

        let gate = inb(SPEAKER_PORT);
        if gate & SPEAKER_ENABLE != SPEAKER_ENABLE {
            outb(SPEAKER_PORT, gate | SPEAKER_ENABLE);
        }
    }
}

pub fn stop() {
    unsafe {
        outb(SPEAKER_PORT, inb(SPEAKER_PORT) & !SPEAKER_ENABLE);
    }
}

/// Play `frequency` for `duration_ms`, then fall silent. Top level only.
pub fn tone(frequency: u32, duration_ms: u32) {
    play(frequency);
    pit::sleep_interrupt(duration_ms);
    stop();
}

/// Play every note of `track` in order. Rests are silent sleeps. The speaker
/// is off when this returns. Top level only.
pub fn play_song<I>(track: I)
where
    I: IntoIterator<Item = Note>,
{
    for note in track {
        if note.is_rest() {
            stop();
        } else {
            play(note.frequency);
        }
        pit::sleep_interrupt(note.duration_ms);
    }
    stop();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn concert_a_divisor() {
        assert_eq!(pit::divisor_for(notes::A4), 2711);
    }

    #[test]
    fn rests_have_no_frequency() {
        assert!(Note::rest(125).is_rest());
        assert!(!Note::new(notes::E5, 125).is_rest());
    }

    #[test]
    fn gate_bits_are_the_low_two() {
        assert_eq!(SPEAKER_ENABLE, 0x03);
        assert_eq!(0xFFu8 & !SPEAKER_ENABLE, 0xFC);
    }
}
