pub(crate) const DEFAULT_REQUEST_END: &str = "\n";
pub(crate) const DEFAULT_RESPONSE_END: &str = "\n";
pub(crate) const DEFAULT_BAUD_RATE: u32 = 115200;

pub(crate) const LOG_TYPE: &str = "log";
pub(crate) const TIMED_LOG_TYPE: &str = "timedlog";
pub(crate) const LOG_VERSION: u32 = 2;

pub(crate) const METADATA_TYPE: &str = "type";
pub(crate) const METADATA_VERSION: &str = "version";
pub(crate) const METADATA_TIME_RESOLUTION: &str = "timeres";

pub(crate) const RECORD_COMMAND: &str = "c";
pub(crate) const RECORD_RESPONSE: &str = "r";
pub(crate) const RECORD_TIME: &str = "t";
pub(crate) const COMMENT_MARK: u8 = b'#';

// Chunk size for a single transport read
pub(crate) const READ_CHUNK_SIZE: usize = 1024;
// Poll period of the simulator thread
pub(crate) const SIMULATOR_POLL_MS: u64 = 10;
