//! Writing extraction runs to files: structured JSON and `.xlsx` workbooks.

pub mod json;
pub mod xlsx;

pub use json::{read_json_document, write_json};
pub use xlsx::{run_to_workbook, Workbook};
