use anyhow::{Context, Result};
use pronlex::{
    batch::{checkpoint_path, RunCheckpoint},
    config::Config,
    pipeline, sink,
};

pub async fn list_sources(config: Config) -> Result<()> {
    println!("\nConfigured Sources");
    println!("==================");

    for (i, source) in config.sources.iter().enumerate() {
        let records = if source.sink.exists() {
            match sink::read_records(&source.sink) {
                Ok(records) => format!("{} records", records.len()),
                Err(e) => format!("unreadable ({})", e),
            }
        } else {
            "not written".to_string()
        };

        let checkpoint = RunCheckpoint::load_if_exists(&checkpoint_path(&source.sink))
            .ok()
            .flatten()
            .map(|c| format!(", checkpoint at term {}", c.next_index))
            .unwrap_or_default();

        println!("{}. {} (policy: {})", i + 1, source.name, source.policy);
        println!("   Document: {}", source.document.display());
        if let Some(ref cache) = source.text_cache {
            let state = if cache.exists() { "built" } else { "missing" };
            println!("   Text:     {} ({})", cache.display(), state);
        }
        println!("   Sink:     {} ({}{})", source.sink.display(), records, checkpoint);
    }

    println!("\nMerged output: {}", config.output.merged.display());
    Ok(())
}

pub async fn convert_source(config: Config, name: String, force: bool) -> Result<()> {
    let text = pipeline::convert(&config, &name, force)?;
    let source = config.source(&name)?;

    println!("Source '{}': {} lines of text", name, text.lines().count());
    if let Some(ref cache) = source.text_cache {
        println!("Text cache: {}", cache.display());
    }
    Ok(())
}

pub async fn extract_source(config: Config, name: String, print: bool) -> Result<()> {
    let terms = pipeline::extract(&config, &name, None)?;

    if print {
        for term in &terms {
            println!("{}", term);
        }
    }
    println!("Source '{}': {} candidate terms", name, terms.len());
    Ok(())
}

pub async fn show_status(config: Config, name: String) -> Result<()> {
    let source = config.source(&name)?;
    let path = checkpoint_path(&source.sink);

    let checkpoint = RunCheckpoint::load_if_exists(&path)?
        .with_context(|| format!("No checkpoint for source '{}' at {}", name, path.display()))?;

    println!("\nRun Checkpoint Status");
    println!("=====================");
    println!("Source:          {}", checkpoint.source);
    println!("Sink:            {}", checkpoint.sink.display());
    println!("Next term index: {}", checkpoint.next_index);
    println!("Sink length:     {} bytes", checkpoint.sink_len);
    println!("Terms written:   {}", checkpoint.terms_written);
    println!("Records written: {}", checkpoint.records_written);
    if let Some(prefix) = checkpoint.own_sink_prefix {
        println!("Incremental:     ignoring labels in the first {} bytes of the sink", prefix);
    }
    println!("Timestamp:       {}", checkpoint.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("\nTo resume this run:");
    println!("  pronlex run {} --resume", name);

    Ok(())
}
