//! Schema subcommand: show what the DTD extractor derived

use std::path::PathBuf;

use anyhow::{Context, Result};
use brick_pubmed::{DtdSchema, Occurrence};
use clap::Args;
use comfy_table::{Cell, Color};

use super::styled_table;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// DTD to inspect
    #[arg(long)]
    pub dtd: Option<PathBuf>,

    /// Only show these elements
    #[arg(value_name = "ELEMENT")]
    pub elements: Vec<String>,

    /// Print the skipped declarations
    #[arg(long)]
    pub warnings: bool,
}

pub fn run(args: SchemaArgs, config: &Config) -> Result<()> {
    let path = args.dtd.unwrap_or_else(|| config.paths.dtd_path.clone());
    let schema = DtdSchema::from_file(&path)
        .with_context(|| format!("Failed to read DTD {}", path.display()))?;

    for name in &args.elements {
        if schema.get(name).is_none() {
            anyhow::bail!("{name} is not declared in {}", path.display());
        }
    }

    let mut table = styled_table(&["Element", "Occurrence", "Children"]);
    for (name, element) in schema.sorted() {
        if !args.elements.is_empty() && !args.elements.iter().any(|e| e == name) {
            continue;
        }
        table.add_row(vec![
            Cell::new(name),
            occurrence_cell(element.occurrence),
            Cell::new(element.children.join(", ")),
        ]);
    }
    eprintln!("\n{table}");
    eprintln!(
        "{} elements, {} warnings",
        schema.len(),
        schema.warnings().len()
    );

    if args.warnings {
        for warning in schema.warnings() {
            eprintln!("  {warning}");
        }
    }
    Ok(())
}

fn occurrence_cell(occurrence: Occurrence) -> Cell {
    let color = match occurrence {
        Occurrence::OneOrMore | Occurrence::ZeroOrMore => Color::Yellow,
        Occurrence::Required | Occurrence::Optional => Color::Green,
        Occurrence::None => Color::DarkGrey,
    };
    Cell::new(occurrence.as_str()).fg(color)
}
