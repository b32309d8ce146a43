pub mod grade;
pub mod init;
pub mod learn;
pub mod list_models;
