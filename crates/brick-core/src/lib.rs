//! Brick Core - shared infrastructure for the XML-to-Parquet pipeline
//!
//! Building blocks that know nothing about PubMed or DTDs: local input
//! decoding, atomic Parquet output, the worker queue, progress bars,
//! logging and the shutdown flag.

pub mod accumulator;
pub mod input;
pub mod logging;
pub mod progress;
pub mod shutdown;
pub mod sink;
pub mod work_queue;

// Re-exports for convenience
pub use accumulator::{Accumulator, DEFAULT_BATCH_SIZE};
pub use input::{ByteCounter, InputReader, is_gzip, open_input};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_duration, fmt_num};
pub use shutdown::{
    install_signal_handlers, is_shutdown_requested, request_shutdown, shutdown_flag,
};
pub use sink::{ParquetSink, cleanup_tmp_files, is_valid_parquet, parquet_row_count};
pub use work_queue::WorkQueue;
