//! `mirror-op name` command implementation

use crate::cli::DestinationArgs;
use crate::image::ImageReference;
use clap::Args;

/// Arguments for the `name` command
#[derive(Args)]
pub struct NameArgs {
    /// Upstream image, including its tag
    pub image: String,

    #[command(flatten)]
    pub destination: DestinationArgs,
}

/// Execute the `name` command
pub async fn execute(args: NameArgs) -> anyhow::Result<()> {
    let destination = args.destination.destination()?;
    let image = ImageReference::parse(&args.image)?;

    println!("{} -> {}", image, image.destination_reference(&destination));

    Ok(())
}
