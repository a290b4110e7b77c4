mod init;
mod run;
mod sources;

pub use init::init_config;
pub use run::{merge_sinks, run_all, run_source};
pub use sources::{convert_source, extract_source, list_sources, show_status};
