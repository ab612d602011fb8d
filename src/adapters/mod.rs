pub mod database;
pub mod mailer;
