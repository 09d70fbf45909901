pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;
pub mod web;

pub use domain::entities;
pub use domain::value_objects;
pub use domain::{SchedulerResult, SchedulingError};
pub use application::services;
pub use application::use_cases;
