mod cli;

use std::fs;

use clap::Parser;
use cli::{Args, Command};
use miette::IntoDiagnostic;
use plc_codec::fixture::{tree_from_json, tree_to_json};

fn main() -> miette::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Compress { input, output } => {
            let raw = fs::read_to_string(&input).into_diagnostic()?;
            let json: serde_json::Value = serde_json::from_str(&raw).into_diagnostic()?;
            let serde_json::Value::Array(items) = json else {
                miette::bail!("input must be a JSON array of operations");
            };
            let ops = items
                .iter()
                .map(tree_from_json)
                .collect::<Result<Vec<_>, _>>()?;
            let blob = plc_codec::compress(&ops)?;
            fs::write(&output, &blob).into_diagnostic()?;
            println!(
                "compressed {} operations into {} bytes ({output:?})",
                ops.len(),
                blob.len()
            );
        }
        Command::Decompress { input, output } => {
            let blob = fs::read(&input).into_diagnostic()?;
            let ops = plc_codec::decompress(&blob)?;
            let json = serde_json::Value::Array(ops.iter().map(tree_to_json).collect());
            fs::write(
                &output,
                serde_json::to_string_pretty(&json).into_diagnostic()?,
            )
            .into_diagnostic()?;
            println!("decompressed {} operations into {output:?}", ops.len());
        }
        Command::Stats { input } => {
            let blob = fs::read(&input).into_diagnostic()?;
            let ops = plc_codec::decompress(&blob)?;
            println!("blob size: {} bytes", blob.len());
            println!("operations: {}", ops.len());
            if !ops.is_empty() {
                println!(
                    "average bytes per operation: {:.1}",
                    blob.len() as f64 / ops.len() as f64
                );
            }
        }
    }

    Ok(())
}
