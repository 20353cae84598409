pub mod labeler;
pub mod pipeline;
pub mod queue;
pub mod scope;
pub mod storage;
pub mod thumbnail;
