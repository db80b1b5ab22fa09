#[path = "builder/state.rs"]
mod state;

#[path = "builder/grader_builder.rs"]
mod grader_builder;

#[path = "builder/resilience.rs"]
mod resilience;

#[path = "builder/build.rs"]
mod build;

pub use grader_builder::GraderBuilder;
