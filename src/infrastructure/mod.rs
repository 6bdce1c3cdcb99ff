pub mod observability;
pub mod storage;
pub mod transport;
pub mod upstream;
