//! Built-in steps and the registry that constructs steps by type name.

pub mod file_list;
pub mod filter;
pub mod list_dir;
pub mod null;
pub mod registry;

pub use file_list::FileListSink;
pub use filter::Filter;
pub use list_dir::ListDir;
pub use null::{NullSink, NullSource, NullStage};
pub use registry::StepRegistry;
