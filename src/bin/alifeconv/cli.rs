use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

use alifeconv::alife::{io::TableFormat, ValidationMode};
use alifeconv::schema::Schema;

/// Convert phylogenies between the alife data standard and phyloinformatics formats
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    /// The command to execute
    pub command: Commands,

    /// Logging level
    #[arg(short = 'v', long, value_enum, global = true, default_value_t = Verbosity::default())]
    pub verbosity: Verbosity,
}

/// The available commands in the `alifeconv` tool
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert phyloinformatics data to standard alife phylogeny data
    Toalifedata {
        /// Phyloinformatics data file, `-` for stdin
        #[arg(long, default_value = "-")]
        input_file: PathBuf,

        /// Phyloinformatics schema, guessed from the file extension if absent
        #[arg(long, value_enum)]
        input_schema: Option<Schema>,

        /// Alife data file, `-` for stdout
        #[arg(long, default_value = "-")]
        output_file: PathBuf,

        /// Alife data format, guessed from the file extension if absent
        #[arg(long, value_enum)]
        output_format: Option<TableFormat>,

        /// What to do when the converted table does not comply with the standard
        #[arg(long, value_enum, default_value_t = ValidationMode::default())]
        validation: ValidationMode,
    },

    /// Convert standard alife phylogeny data to phyloinformatics data
    Fromalifedata {
        /// Alife data file, `-` for stdin
        #[arg(long, default_value = "-")]
        input_file: PathBuf,

        /// Alife data format, guessed from the file extension if absent
        #[arg(long, value_enum)]
        input_format: Option<TableFormat>,

        /// Phyloinformatics data file, `-` for stdout
        #[arg(long, default_value = "-")]
        output_file: PathBuf,

        /// Phyloinformatics schema, guessed from the file extension if absent
        #[arg(long, value_enum)]
        output_schema: Option<Schema>,

        /// Collapse internal nodes with a single child
        #[arg(long, action = ArgAction::SetTrue, overrides_with = "keep_unifurcations")]
        suppress_unifurcations: bool,

        /// Keep internal nodes with a single child (default)
        #[arg(long, action = ArgAction::SetTrue, overrides_with = "suppress_unifurcations")]
        keep_unifurcations: bool,

        /// What to do when the input table does not comply with the standard
        #[arg(long, value_enum, default_value_t = ValidationMode::default())]
        validation: ValidationMode,
    },

    /// Generate shell completion scripts for the `alifeconv` tool
    Completion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Logging verbosity levels
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, ValueEnum)]
pub enum Verbosity {
    /// Only errors
    Error,
    /// Errors and warnings
    #[default]
    Warn,
    /// Progress information
    Info,
    /// Everything
    Debug,
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // RUST_LOG expects lowercase level names
        let lowercase = format!("{:?}", self).to_lowercase();
        write!(f, "{lowercase}")
    }
}
