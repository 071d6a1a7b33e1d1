/**
 * Command-line interface for the x86-64 backend. Recognizes the
 * `--target`, `--debug`, `-O` and `-o` switches and the input file,
 * a JSON-serialized IR program.
 */
use clap::Parser;
use log::warn;
use std::collections::HashSet;

#[derive(Clone, clap::ValueEnum, Debug, Default, PartialEq)]
pub enum CompilerAction {
    /// Indexed IR listing
    Ir,
    /// IR listing annotated with live-out sets
    Liveness,
    /// Interference graph and register assignment
    Regalloc,
    /// x86-64 assembly
    #[default]
    Assembly,
}

/// Individual optimization passes.
///
/// Names for use with `-O`:
///   `fold`  fold address arithmetic into loads and stores
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Optimization {
    /// Address-arithmetic folding
    Fold,
}

impl Optimization {
    /// All available optimizations.
    pub fn all() -> Vec<Optimization> {
        vec![Optimization::Fold]
    }

    pub fn from_str(s: &str) -> Option<Optimization> {
        match s {
            "fold" => Some(Optimization::Fold),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Optimization::Fold => "fold",
        }
    }
}

/// Parse the raw `-O` strings into an active set of optimizations.
///
/// Supported syntax (comma-separated, no spaces):
///   `-O fold`         enable fold
///   `-O all`          enable all optimizations
///   `-O all,-fold`    enable all except fold
///
/// A leading `-` on a token *disables* that optimization from the set.
pub fn parse_optimizations(opts: &[String]) -> HashSet<Optimization> {
    let mut active: HashSet<Optimization> = HashSet::new();

    for token in opts {
        if token == "all" {
            active.extend(Optimization::all());
        } else if let Some(name) = token.strip_prefix('-') {
            match Optimization::from_str(name) {
                Some(o) => {
                    active.remove(&o);
                }
                None => warn!("unknown optimization '{}' (ignored)", name),
            }
        } else {
            match Optimization::from_str(token) {
                Some(o) => {
                    active.insert(o);
                }
                None => warn!("unknown optimization '{}' (ignored)", token),
            }
        }
    }

    active
}

#[derive(Parser, Debug)]
#[command(name = "x86gen", about = "Register-allocating x86-64 backend for three-address IR")]
pub struct Args {
    /// Compile to the given stage
    #[clap(
        short,
        long,
        value_enum,
        default_value_t = CompilerAction::Assembly,
        value_name = "stage"
    )]
    pub target: CompilerAction,

    /// Write output to file
    #[clap(short, long, value_name = "outname")]
    pub output: Option<std::path::PathBuf>,

    /// Optimizations to enable. Comma-separated list of: fold, all.
    /// Prefix a name with '-' to disable it (e.g. -O all,-fold).
    #[clap(
        short = 'O',
        long = "opt",
        value_delimiter = ',',
        value_name = "opt,..",
        allow_hyphen_values = true
    )]
    pub opt: Vec<String>,

    /// Print debugging information
    #[arg(short, long, default_value_t = false)]
    pub debug: bool,

    /// IR program (JSON)
    pub input: std::path::PathBuf,
}

pub fn parse() -> Args {
    Args::parse()
}
