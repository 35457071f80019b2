//! Command-line front end.

pub mod arg_parser;
pub mod cli;

pub use arg_parser::Cli;
pub use cli::handle_run;
