pub mod in_memory_scheduler_repository;
pub mod sqlite_scheduler_repository;

pub use in_memory_scheduler_repository::InMemorySchedulerRepository;
pub use sqlite_scheduler_repository::SqliteSchedulerRepository;
