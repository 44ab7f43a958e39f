pub mod catalog;
pub mod client;
pub mod codec;
pub mod descriptor;
pub mod encoder;
pub mod job;
pub mod mapper;
pub mod native;
pub mod storage;
