use std::path::PathBuf;

use clap::Args;

use super::CliContext;
use screenflow::schema::write_schema;

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Output directory, relative to the root unless absolute
    #[arg(long, default_value = "schemas")]
    pub out: PathBuf,
}

pub async fn execute(args: SchemaArgs, context: &CliContext) -> anyhow::Result<()> {
    let out_dir = context.root.join(args.out);
    for file in write_schema(&out_dir)? {
        println!("wrote {}", out_dir.join(file).display());
    }
    Ok(())
}
