//! Courier moves a single email message between a mailbox application and
//! the public mail network.
//!
//! The crate has two halves:
//!
//! - An **inbound intake pipeline** ([`intake::Intake`]) that takes a
//!   completed SMTP transaction (envelope + raw RFC 5322 bytes), validates
//!   every recipient against a [`directory::RecipientDirectory`], parses the
//!   message once, and hands one record per accepted recipient to a
//!   [`store::MessageStore`].
//! - An **outbound delivery orchestrator** ([`delivery::Courier`]) that
//!   groups a message's recipients by domain, resolves the mail exchangers
//!   for each domain, and drives delivery with ordered failover across the
//!   candidate hosts.
//!
//! External collaborators (directory lookup, storage, DNS, and the SMTP
//! client conversation) are capability traits so they can be swapped for
//! test doubles or alternative backends.

pub mod address;
pub mod backend;
pub mod config;
pub mod delivery;
pub mod directory;
pub mod intake;
pub mod logging;
pub mod message;
pub mod outbound;
pub mod smtp;
pub mod store;

pub use address::Address;
pub use delivery::{Courier, SendError, SendReport};
pub use intake::{Envelope, Intake, IntakeError, IntakeReceipt};
pub use message::ParsedMessage;
pub use outbound::OutboundMessage;
