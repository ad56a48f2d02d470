pub mod batch;
pub mod chunker;
pub mod config;
pub mod extract;
pub mod invoker;
pub mod prompts;
pub mod realign;
pub mod table;
pub mod trace;
pub mod translator;

pub use batch::{collect_inputs, output_path_for, run_batch, write_zip, BatchReport, OutcomeStatus};
pub use config::{init_default_config, Overrides, PipelineConfig};
pub use table::TableMode;
pub use translator::{DocumentReport, DocumentTranslator, TranslateOptions};
