// External I/O operations module
pub mod lock; // Single-instance lock file operations
