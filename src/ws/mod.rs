pub mod close;
pub mod frame;
pub mod message;
