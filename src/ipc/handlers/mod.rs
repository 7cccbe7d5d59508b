pub mod core;
pub mod evaluations;
pub mod grades;
pub mod students;
pub mod subjects;
