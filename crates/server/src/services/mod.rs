pub mod integrity;
pub mod relationships;
pub mod storage;
pub mod watch;
