use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::str::FromStr;
use tracing::error;

use spo_extractor::config::Config;
use spo_extractor::datasource::discover_companies;
use spo_extractor::external::{create_client, LlmClient, WhispererClient};
use spo_extractor::processor::CompanyProcessor;
use spo_extractor::prompts::{Prompts, TablePrompt};
use spo_extractor::writer::FrameworkWorkbook;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root folder containing company subfolders
    #[arg(short = 'r', long)]
    root: Option<String>,

    /// Output Excel workbook
    #[arg(short = 'o', long)]
    excel: Option<String>,

    /// Primary LLM provider (gemini or groq)
    #[arg(short = 'p', long, default_value = "gemini")]
    provider: String,

    /// Run the table pipeline (OCR + table prompt) instead of the text pipeline
    #[arg(long)]
    tables: bool,

    /// Only process the company folder with this name
    #[arg(long)]
    company: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(root) = args.root {
        config.output.root_folder = root;
    }
    if let Some(excel) = args.excel {
        config.output.excel_file = excel;
    }

    let level = tracing::Level::from_str(&config.log_level).unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    let primary = create_client(&args.provider, &config.models)?;
    let fallback = fallback_client(&args.provider, &config)?;

    let prompts = Prompts::load(Path::new(&config.output.prompts_file))?;

    let mut companies = discover_companies(Path::new(&config.output.root_folder))?;
    if let Some(only) = &args.company {
        companies.retain(|c| &c.name == only);
    }
    if companies.is_empty() {
        println!("No company folders with a framework/SPO pair found. Exiting.");
        return Ok(());
    }
    println!("Found {} companies to process.", companies.len());

    let mut workbook = FrameworkWorkbook::open(Path::new(&config.output.excel_file))?;
    let processor = CompanyProcessor::new(
        primary.as_ref(),
        fallback.as_deref(),
        &prompts,
        &config.retrieval,
    );

    let mut processed = 0usize;
    let mut failed = 0usize;

    if args.tables {
        let whisperer = WhispererClient::new(&config.whisperer)?;
        let table_prompt = TablePrompt::load(Path::new(&config.output.table_prompts_file))?;

        for company in &companies {
            println!("\nProcessing tables for: {}", company.name);
            match processor
                .process_company_tables(company, &whisperer, &table_prompt, &mut workbook)
                .await
            {
                Ok(Some(id)) => {
                    println!("Tables written for {} ({})", company.name, id);
                    processed += 1;
                }
                Ok(None) => {
                    println!("No table pages found for {}, skipped.", company.name);
                }
                Err(e) => {
                    error!(company = %company.name, error = %e, "table pipeline failed");
                    failed += 1;
                }
            }
            workbook.save()?;
        }
    } else {
        for company in &companies {
            println!("\nProcessing company: {}", company.name);
            match processor.process_company(company, &mut workbook).await {
                Ok(id) => {
                    println!("Data written for {} ({})", company.name, id);
                    processed += 1;
                }
                Err(e) => {
                    error!(company = %company.name, error = %e, "pipeline failed");
                    failed += 1;
                }
            }
            workbook.save()?;
        }
    }

    println!(
        "\nProcessing complete: {} succeeded, {} failed.",
        processed, failed
    );
    println!("Results saved to: {}", config.output.excel_file);

    Ok(())
}

/// The provider not chosen as primary becomes the fallback, when its key is set.
fn fallback_client(primary: &str, config: &Config) -> Result<Option<Box<dyn LlmClient>>> {
    let other = match primary {
        "gemini" => "groq",
        _ => "gemini",
    };
    match create_client(other, &config.models) {
        Ok(client) => Ok(Some(client)),
        Err(spo_extractor::external::ExternalError::MissingKey(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
