pub mod constants;
pub mod options;

pub use options::NodekeeperOptions;
