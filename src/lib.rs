//! Quoteflow: an email-to-quote agent for a catering business.
//!
//! Polls a mailbox for customer inquiries, drafts a grounded quote through
//! a generative model, replies by email exactly once per inquiry and
//! mirrors each quote to an ops channel.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod mailbox;
pub mod notify;
pub mod pipeline;
pub mod quote;
pub mod retrieval;
pub mod store;

pub use error::{Error, Result};
