use crate::scan_record::ScanRecord;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Struct to hold one complete scan returned by a device or replayed from a log.
///
/// An empty scan means that no usable data was available (wrong response header,
/// rejected status or the end of a log).
#[derive(Clone, Debug, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanData {
    /// Measured steps in the order the device reported them.
    pub records: Vec<ScanRecord>,
    /// Scan id, monotonic per controller and starting from zero.
    pub scan_id: usize,
    /// Rotation speed in Hz, -1 if unknown.
    pub rotation_speed: f64,
    /// Capture time in milliseconds.
    ///
    /// Milliseconds since the Unix epoch for live scans, milliseconds since the
    /// first logged exchange for scans replayed from a timed log.
    pub time: i64,
}

impl ScanData {
    pub fn new() -> ScanData {
        ScanData {
            records: Vec::new(),
            scan_id: 0,
            rotation_speed: -1.,
            time: 0,
        }
    }

    pub fn push(&mut self, record: ScanRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScanRecord> {
        self.records.iter()
    }
}

impl Default for ScanData {
    fn default() -> Self {
        ScanData::new()
    }
}

impl<'a> IntoIterator for &'a ScanData {
    type Item = &'a ScanRecord;
    type IntoIter = std::slice::Iter<'a, ScanRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl fmt::Display for ScanData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "ScanData({}: {} records; {}Hz; t={})",
            self.scan_id,
            self.records.len(),
            self.rotation_speed,
            self.time
        )?;
        for record in &self.records {
            writeln!(f, "{}", record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scan_is_empty() {
        let scan = ScanData::new();
        assert!(scan.is_empty());
        assert_eq!(scan.scan_id, 0);
        assert_eq!(scan.rotation_speed, -1.);
        assert_eq!(scan, ScanData::default());
    }

    #[test]
    fn test_push_and_iterate() {
        let mut scan = ScanData::new();
        scan.push(ScanRecord::new(0, 0., 100., -1, 0, false));
        scan.push(ScanRecord::new(1, 0.1, -1., -1, 7, true));

        assert_eq!(scan.len(), 2);
        let ids: Vec<i32> = scan.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!((&scan).into_iter().filter(|r| r.error).count(), 1);
    }
}
