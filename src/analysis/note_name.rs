//! NoteNamer - frequency to musical note conversion
//!
//! Maps a frequency to the nearest equal-tempered note relative to A4 = 440 Hz.
//! Pure functions only; used for display next to the live pitch readout.

use std::fmt;

/// Concert pitch reference
pub const A4_HZ: f32 = 440.0;

/// Chromatic names starting at C
const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Nearest note to a frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NoteName {
    /// Index into the chromatic table (0 = C)
    pub pitch_class: u8,
    pub octave: i32,
}

impl NoteName {
    pub fn pitch_class_name(&self) -> &'static str {
        NOTE_NAMES[self.pitch_class as usize]
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class_name(), self.octave)
    }
}

/// Map a frequency to its nearest note name.
///
/// Computes the semitone distance from C0 (`A4 · 2^-4.75`), rounds it, and
/// splits it into octave and pitch class with floor semantics so that
/// frequencies below C0 still land on a valid table entry.
///
/// # Returns
/// `None` for zero, negative or non-finite frequencies
///
/// # Examples
/// ```
/// use vocal_rhythm::analysis::note_name::note_name;
/// assert_eq!(note_name(440.0).unwrap().to_string(), "A4");
/// assert!(note_name(0.0).is_none());
/// ```
pub fn note_name(frequency: f32) -> Option<NoteName> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return None;
    }

    let c0 = A4_HZ as f64 * 2f64.powf(-4.75);
    let h = (12.0 * (frequency as f64 / c0).log2()).round() as i64;

    Some(NoteName {
        pitch_class: h.rem_euclid(12) as u8,
        octave: h.div_euclid(12) as i32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_notes() {
        assert_eq!(note_name(440.0).unwrap().to_string(), "A4");
        assert_eq!(note_name(261.63).unwrap().to_string(), "C4");
        assert_eq!(note_name(220.0).unwrap().to_string(), "A3");
        assert_eq!(note_name(880.0).unwrap().to_string(), "A5");
        assert_eq!(note_name(523.25).unwrap().to_string(), "C5");
        assert_eq!(note_name(466.16).unwrap().to_string(), "A#4");
    }

    #[test]
    fn test_rounds_to_nearest_semitone() {
        // A quarter tone sharp of A4 still reads A4 until the midpoint
        assert_eq!(note_name(450.0).unwrap().to_string(), "A4");
        assert_eq!(note_name(460.0).unwrap().to_string(), "A#4");
    }

    #[test]
    fn test_invalid_frequencies() {
        assert!(note_name(0.0).is_none());
        assert!(note_name(-440.0).is_none());
        assert!(note_name(f32::NAN).is_none());
        assert!(note_name(f32::INFINITY).is_none());
    }

    #[test]
    fn test_below_c0_uses_floor_octave() {
        // One semitone below C0 is B-1, not a negative table index
        let b_minus_one = 16.3516 * 2f32.powf(-1.0 / 12.0);
        let note = note_name(b_minus_one).unwrap();
        assert_eq!(note.pitch_class_name(), "B");
        assert_eq!(note.octave, -1);
    }
}
