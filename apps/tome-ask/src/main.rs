use clap::Parser;

use tome_ask::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	tome_ask::run(args).await
}
