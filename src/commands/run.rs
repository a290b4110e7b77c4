use anyhow::Result;
use pronlex::{
    config::Config,
    pipeline::{self, Pipeline, RunOptions},
};
use std::path::PathBuf;

pub async fn run_source(config: Config, name: String, options: RunOptions, quiet: bool) -> Result<()> {
    let pipeline = Pipeline::connect(config)?.with_quiet(quiet);
    let stats = pipeline.run_source(&name, options).await?;

    if !quiet {
        stats.print_summary(&name);
    }
    Ok(())
}

pub async fn run_all(config: Config, quiet: bool) -> Result<()> {
    let pipeline = Pipeline::connect(config)?.with_quiet(quiet);
    let report = pipeline.run_all().await?;

    if !quiet {
        for (name, stats) in &report.completed {
            stats.print_summary(name);
        }
    }

    if let Some(ref merge) = report.merge {
        println!(
            "\nMerged {} sinks into {}: {} unique records, {} duplicates",
            merge.sinks,
            pipeline.config().output.merged.display(),
            merge.unique_written,
            merge.duplicates
        );
    }

    if !report.failed.is_empty() {
        for (name, error) in &report.failed {
            eprintln!("Source '{}' failed: {}", name, error);
        }
        anyhow::bail!("{} of {} sources failed", report.failed.len(), pipeline.config().sources.len());
    }
    Ok(())
}

pub async fn merge_sinks(config: Config, output: Option<PathBuf>) -> Result<()> {
    let destination = output.unwrap_or_else(|| config.output.merged.clone());
    let stats = pipeline::merge(&config, Some(&destination))?;

    println!("\nMerge Summary");
    println!("=============");
    println!("Sinks read:       {}", stats.sinks);
    println!("Records read:     {}", stats.records_read);
    println!("Unique written:   {}", stats.unique_written);
    println!("Duplicates:       {}", stats.duplicates);
    println!("Output:           {}", destination.display());
    Ok(())
}
