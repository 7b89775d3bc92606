use crate::cli::args::ManifestArgs;
use crate::exit_codes;
use crate::manifest::write_manifests;

pub async fn run(args: ManifestArgs) -> anyhow::Result<i32> {
    if args.manifest.entrypoints.is_empty() {
        eprintln!("error: at least one --entrypoint is required");
        return Ok(exit_codes::INTERNAL_ERROR);
    }

    for path in write_manifests(&args.manifest).await? {
        println!("{}", path.display());
    }
    Ok(exit_codes::SUCCESS)
}
