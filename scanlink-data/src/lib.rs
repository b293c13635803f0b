pub mod scan_data;
pub mod scan_record;

pub use scan_data::ScanData;
pub use scan_record::ScanRecord;

/// Key/value pairs reported by a device's version command, ordered by key.
pub type VersionInfo = std::collections::BTreeMap<String, String>;
