pub mod headers;
pub mod imap;
pub mod parser;
pub mod types;

pub use imap::{ImapClient, ImapError};
