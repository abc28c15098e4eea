pub mod config;
pub mod datasource;
pub mod extract;
pub mod external;
pub mod parser;
pub mod processor;
pub mod prompts;
pub mod tables;
pub mod writer;

pub use config::Config;
pub use datasource::{discover_companies, CompanyFolder};
pub use extract::{chunk_text, extract_text_from_pdf, DocChunk, SourceDoc};
pub use external::{ExternalError, GeminiClient, GroqClient, LlmClient, WhispererClient};
pub use parser::{assemble_context, parse_with_llm, TfidfIndex};
pub use processor::CompanyProcessor;
pub use prompts::{Prompts, TablePrompt};
pub use tables::{merge_table_pages, pages_with_tables, TableAnswer};
pub use writer::{FrameworkRecord, FrameworkWorkbook, SpoRecord};
