pub mod backend;
pub mod cancel;
pub mod config;
pub mod docx;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod textutil;
