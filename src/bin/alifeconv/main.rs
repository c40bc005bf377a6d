#![warn(missing_docs)]
//! The `alifeconv` binary is a command line tool, using the [`alifeconv`] crate.
//! It converts phylogenies between the alife data standard (CSV or JSON
//! tables) and the Newick, Nexus and NeXML formats.

use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use log::{error, info};

use alifeconv::alife::{io::TableFormat, AlifeTable};
use alifeconv::errors::ConversionError;
use alifeconv::rosetta::{Rosetta, RosettaOptions};
use alifeconv::schema::{Schema, TreeSource, WriteOptions};

/// contains the struct representing the command line arguments
/// parsed by [`clap`] and used to execute this binary
pub mod cli;

fn is_std(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn open_input(path: &Path) -> Result<Box<dyn Read>, ConversionError> {
    Ok(if is_std(path) {
        Box::new(io::stdin())
    } else {
        Box::new(BufReader::new(File::open(path)?))
    })
}

fn open_output(path: &Path) -> Result<BufWriter<Box<dyn Write>>, ConversionError> {
    Ok(BufWriter::new(if is_std(path) {
        Box::new(io::stdout()) as Box<dyn Write>
    } else {
        Box::new(File::create(path)?) as Box<dyn Write>
    }))
}

fn schema_or_guess(schema: Option<Schema>, path: &Path) -> Result<Schema, ConversionError> {
    schema.or_else(|| Schema::from_path(path)).ok_or_else(|| {
        ConversionError::UnsupportedFormat(format!(
            "cannot guess the schema of {}, please specify it",
            path.display()
        ))
    })
}

fn format_or_guess(format: Option<TableFormat>, path: &Path) -> TableFormat {
    format.unwrap_or_else(|| TableFormat::from_path(path))
}

fn run(command: cli::Commands) -> Result<(), ConversionError> {
    match command {
        cli::Commands::Toalifedata {
            input_file,
            input_schema,
            output_file,
            output_format,
            validation,
        } => {
            let schema = schema_or_guess(input_schema, &input_file)?;
            let source = if is_std(&input_file) {
                TreeSource::Reader(Box::new(io::stdin()))
            } else {
                TreeSource::Path(input_file)
            };

            let options = RosettaOptions::default().validation(validation);
            let rosetta = Rosetta::from_schema(source, schema, options)?;
            let table = rosetta.as_alife();
            info!("Converted {schema} data into {} alife records", table.len());

            let mut writer = open_output(&output_file)?;
            table.write_to(&mut writer, format_or_guess(output_format, &output_file))?;
            writer.flush()?;
        }
        cli::Commands::Fromalifedata {
            input_file,
            input_format,
            output_file,
            output_schema,
            suppress_unifurcations,
            keep_unifurcations,
            validation,
        } => {
            let schema = schema_or_guess(output_schema, &output_file)?;
            let format = format_or_guess(input_format, &input_file);
            let table = AlifeTable::read_from(open_input(&input_file)?, format)?;
            info!("Read {} alife records", table.len());

            let options = RosettaOptions::default().validation(validation);
            let rosetta = Rosetta::with_options(table, options)?;

            let write_options = WriteOptions::default()
                .suppress_unifurcations(suppress_unifurcations && !keep_unifurcations);
            let mut writer = open_output(&output_file)?;
            rosetta.write_schema(schema, &mut writer, &write_options)?;
            writer.flush()?;
        }
        cli::Commands::Completion { shell } => {
            let mut cmd = cli::Args::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = cli::Args::parse();

    // Set logging level via RUST_LOG
    std::env::set_var("RUST_LOG", args.verbosity.to_string());
    env_logger::init();

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            let mut source = e.source();
            while let Some(cause) = source {
                error!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
