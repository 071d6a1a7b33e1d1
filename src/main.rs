use anyhow::Context;
use log::debug;

use x86gen::assembler::assembler::{assemble, CompileOptions};
use x86gen::utils::cli;

fn get_writer(output: &Option<std::path::PathBuf>) -> anyhow::Result<Box<dyn std::io::Write>> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(path.as_path())
                .with_context(|| format!("cannot create {}", path.display()))?;
            Ok(Box::new(std::io::BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout())),
    }
}

fn main() -> anyhow::Result<()> {
    let args = cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.debug {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let active_opts = cli::parse_optimizations(&args.opt);
    debug!(
        "Filename: {:?} Optimizations: {:?} Output File: {:?} Target: {:?}",
        args.input, active_opts, args.output, args.target
    );

    let writer = get_writer(&args.output)?;
    let opts = CompileOptions::from_optimizations(&active_opts);
    assemble(&args.input, writer, &args.target, &opts)
}
