pub mod dev;
pub mod manifest;
pub mod relocate;

use super::args::{Cli, Command};

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Relocate(args) => relocate::run(args).await,
        Command::Manifest(args) => manifest::run(args).await,
        Command::Dev(args) => dev::run(args).await,
    }
}
