use std::path::Path;

use anyhow::Result;
use netsim_cli::cli::{ModelArgs, ModelFormat};
use netsim_cli::load_model;
use netsim_io::{export_csv_folder, export_json};

pub fn handle(input: &ModelArgs, format: ModelFormat, out: &Path) -> Result<()> {
    let network = load_model(&input.model, input.model_json)?.network;
    match format {
        ModelFormat::Csv => export_csv_folder(&network, out)?,
        ModelFormat::Json => export_json(&network, out)?,
    }
    println!("Wrote {format:?} model to {}", out.display());
    Ok(())
}
