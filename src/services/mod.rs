pub mod akool;
pub mod media_proxy;
pub mod poller;
pub mod provider;
pub mod speech;
pub mod storage;
