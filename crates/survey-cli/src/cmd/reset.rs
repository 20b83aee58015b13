use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use survey_flow::{FileSlot, StateSlot};

use super::{load_document, state_dir};

#[derive(Args, Debug, Clone)]
pub struct ResetArgs {
    #[arg(long, value_name = "survey.json")]
    pub config: PathBuf,
    #[arg(long = "state-dir", value_name = "DIR")]
    pub state_dir: Option<PathBuf>,
}

pub fn run(args: ResetArgs) -> Result<()> {
    let document = load_document(&args.config)?;
    let slot = FileSlot::new(state_dir(args.state_dir.as_deref()));
    let key = document.storage_key();
    slot.remove(&key)
        .with_context(|| format!("failed to clear progress in {}", slot.dir().display()))?;
    println!("cleared saved progress for survey '{}'", document.id);
    Ok(())
}
