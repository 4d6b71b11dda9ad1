//! SMTP wire plumbing: reply parsing, a line-level client, the outbound
//! client session capability, and a minimal inbound receiver loop.

pub mod client;
pub mod response;
pub mod server;
pub mod session;

pub use client::{ClientError, SmtpClient};
pub use response::Response;
pub use server::{ServerError, SmtpReceiver};
pub use session::{SessionError, SmtpClientSession, TcpSmtpSession};
