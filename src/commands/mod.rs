pub mod cursor;
pub mod init;
pub mod resolve;
