//! Backend for a website contact form: validates a submission, notifies the site operator by
//! email, optionally confirms receipt to the submitter, and answers with a JSON status.

pub mod compose;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod http_api;
pub mod locale;
pub mod mailer;
pub mod routes;
pub mod sanitize;
pub mod secrets;
pub mod smtp;
pub mod startup;
pub mod submission;
pub mod validation;
