//! Fuelsync engine: report-server IO and effect execution.
mod backend;
mod engine;
mod persist;
mod sse;
mod stream;
mod table;
mod types;

pub use backend::{
    filename_from_disposition, Backend, BackendSettings, ByteStream, ReqwestBackend,
};
pub use engine::{EngineConfig, EngineHandle};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use sse::SseDecoder;
pub use stream::{run_log_stream, ChannelStreamSink, ReconnectPolicy, StreamSink};
pub use table::{display_width, parse_tables, render_grid, TableGrid};
pub use types::{
    ClientError, DownloadedReport, EngineEvent, FailureKind, LogPayload, PreviewSheets,
    StreamEvent, UploadReceipt,
};
