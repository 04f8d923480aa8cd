//! Django application deployment
//!
//! - [`database`]: connection URL to `DATABASES['default']`
//! - [`locator`]: nearest file with a given name
//! - [`resolver`]: inference of unset attributes
//! - [`settings`]: local settings rendering
//! - [`provider`]: the deployment state machine
//! - [`resource`]: the declaration and its [`declarative::Resource`] impl

pub mod database;
pub mod locator;
pub mod provider;
pub mod resolver;
pub mod resource;
pub mod settings;

pub use provider::Step;
pub use resolver::ResolvedDjango;
pub use resource::{DjangoApp, DjangoDeployment, Journal, JournalEntry};
