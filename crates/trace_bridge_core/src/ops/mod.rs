pub mod breakpoints;
pub mod debugger;
pub mod memory;
pub mod processes;
pub mod threads;
