use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One measured step of a scan.
#[derive(Clone, Debug, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanRecord {
    /// Index of the record inside its scan (starting from zero).
    pub id: i32,
    /// Scan angle in radian.
    pub angle: f64,
    /// Distance to an object in mm, -1 if the step reported an error.
    pub distance: f64,
    /// Return strength of the laser pulse, -1 if the device does not report it.
    pub intensity: i32,
    /// Device specific error code, zero when the step is valid.
    pub error_code: i32,
    /// True if the step reported an error.
    pub error: bool,
}

impl ScanRecord {
    pub fn new(
        id: i32,
        angle: f64,
        distance: f64,
        intensity: i32,
        error_code: i32,
        error: bool,
    ) -> ScanRecord {
        ScanRecord {
            id,
            angle,
            distance,
            intensity,
            error_code,
            error,
        }
    }
}

impl fmt::Display for ScanRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ScanRecord({}: {}°; {}mm",
            self.id,
            self.angle.to_degrees(),
            self.distance
        )?;
        if self.error {
            write!(f, "; error")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let record = ScanRecord::new(3, 0., 221., 1400, 0, false);
        assert_eq!(record.to_string(), "ScanRecord(3: 0°; 221mm)");

        let record = ScanRecord::new(4, 0., -1., -1, 0x8035, true);
        assert_eq!(record.to_string(), "ScanRecord(4: 0°; -1mm; error)");
    }
}
