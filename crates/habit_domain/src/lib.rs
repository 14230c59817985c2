pub mod archive;
pub mod calendar;
pub mod editor;
pub mod error;
pub mod events;
pub mod habit;
pub mod locks;
pub mod notifications;
pub mod repository;
pub mod rollover;
pub mod service;
pub mod sort;
pub mod status;
pub mod store;

pub use crate::error::{HabitError, HabitResult, ValidationError};
pub use crate::service::{HabitService, HabitServiceBuilder};
pub use crate::status::{stat_delta, StatDelta, Status};
