mod extract;
mod parser;

pub use extract::{merge_table_pages, pages_with_tables, TableError};
pub use parser::{parse_table_text, EligibilityCriterion, TableAnswer, UseOfProceeds};
