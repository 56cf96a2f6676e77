// crates.io
use clap::Parser;
// self
use realty_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	realty_eval::run(args).await
}
