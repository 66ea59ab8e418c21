pub mod error;
pub mod event_parser;
pub mod request_handler;
pub mod response_wrapper;
pub mod types;

pub use error::DecodeError;
pub use event_parser::FrameDecoder;
pub use response_wrapper::ChatEventStream;
pub use types::*;
