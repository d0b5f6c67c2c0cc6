pub mod handler;
pub mod mailer;

pub use handler::send_email;
pub use mailer::{Mailer, OutgoingEmail, SmtpMailer};
