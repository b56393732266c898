pub mod command_helpers;
pub mod responses;
