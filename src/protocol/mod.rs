mod chat_request;
mod event_codec;
mod frame_decoder;

pub use chat_request::{ChatRequest, HistoryEntry, MAX_HISTORY_MESSAGES};
pub use event_codec::{
    DATA_PREFIX, DONE_SENTINEL, decode, encode, encode_done_sentinel, split_complete_lines,
};
pub use frame_decoder::FrameDecoder;

pub(crate) use event_codec::data_payload;
