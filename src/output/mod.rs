//! Output formatters for run summaries.
//!
//! - [`TextOutput`] for people reading a terminal
//! - [`JsonOutput`] for automation and scripting
//!
//! # Example
//!
//! ```no_run
//! use dupelink::duplicates::DuplicateFinder;
//! use dupelink::error::ExitCode;
//! use dupelink::output::{JsonOutput, TextOutput};
//! use std::path::Path;
//!
//! let summary = DuplicateFinder::with_defaults().run(Path::new(".")).unwrap();
//! let code = ExitCode::from_run(&summary);
//!
//! print!("{}", TextOutput::run(&summary));
//! println!("{}", JsonOutput::new(&summary, code).to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

pub use json::{JsonOutput, JsonOutputError};
pub use text::TextOutput;
