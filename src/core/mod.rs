pub mod assembler;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod decoder;
pub mod dispatcher;
pub mod frame;
pub mod message;
pub mod relay;
pub mod session;
pub mod surface;
pub mod transport;
