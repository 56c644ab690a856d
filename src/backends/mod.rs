pub mod ftp;
pub mod local;
