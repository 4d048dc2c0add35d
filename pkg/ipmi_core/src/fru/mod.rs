mod decoder;
mod handle;
mod reader;
mod registry;
mod writer;

pub use decoder::{FruDecoder, FruDecoderRegistry};
pub use handle::{
    FetchedCallback, FruHandle, FruIdentity, FruRecordOps, MAX_FRU_DATA_WRITE,
    MAX_FRU_WRITE_RETRIES, MAX_READ_FETCH, MIN_READ_FETCH, READ_FETCH_STEP,
};
pub use reader::start_fetch;
pub use registry::FruRegistry;
pub use writer::{start_write, WriteCallback};
