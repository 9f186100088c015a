pub mod init;
pub mod start;
pub mod status;
pub mod stop;
