use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use survey_flow::{Paginator, PaginatorOptions};

use super::load_document;

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[arg(long, value_name = "survey.json")]
    pub config: PathBuf,
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
}

/// Loads the document and builds a paginator from it, which resolves every
/// page type and checks page props.
pub fn run(args: CheckArgs) -> Result<()> {
    let document = load_document(&args.config)?;
    Paginator::builder(document.pages.clone())
        .options(PaginatorOptions::from_document(&document))
        .build()
        .with_context(|| format!("survey '{}' is not runnable", document.id))?;

    let keys = document.page_keys();
    if args.json {
        let report = json!({
            "id": document.id,
            "title": document.title,
            "storageKey": document.storage_key(),
            "pages": keys,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("survey '{}' is valid ({} pages)", document.id, keys.len());
        for (index, (key, page)) in keys.iter().zip(&document.pages).enumerate() {
            println!("  {:>2}. {key} [{}]", index + 1, page.page_type);
        }
    }
    Ok(())
}
