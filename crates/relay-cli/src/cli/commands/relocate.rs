use anyhow::Context;
use relay_cache::{CacheFileMover, DiscoveredSources};

use crate::cli::args::RelocateArgs;
use crate::exit_codes;
use crate::manifest::write_manifests;

pub async fn run(args: RelocateArgs) -> anyhow::Result<i32> {
    let mover = match CacheFileMover::new(&args.cache_dir, &args.from, &args.to) {
        Ok(mover) => mover,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(e.exit_code());
        }
    };

    let mut sources = DiscoveredSources::new();
    if let Err(e) = mover.run(&mut sources).await {
        eprintln!("error: {e}");
        return Ok(e.exit_code());
    }

    let listed = serde_json::to_string_pretty(&sources.into_vec())?;
    match &args.sources_out {
        Some(path) => tokio::fs::write(path, listed)
            .await
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{}", listed),
    }

    write_manifests(&args.manifest).await?;
    Ok(exit_codes::SUCCESS)
}
