//! Sealtree CLI - Passphrase-based directory tree encryption
//!
//! Command-line interface for sealing and unsealing every regular file
//! under a directory using AES-256-GCM with PBKDF2 key derivation.

use clap::{Parser, Subcommand};
use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::process;

use sealtree::error::Result;
use sealtree::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};
use sealtree::tree_ops::{self, Plan, TreeReport};

#[derive(Parser)]
#[command(name = "sealtree")]
#[command(version)]
#[command(about = "Passphrase-based directory tree encryption.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// List the files the operation would touch, without touching them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt every regular file under a directory
    #[command(alias = "e")]
    Encrypt {
        /// Directory whose files will be sealed
        #[arg(value_name = "DIR")]
        root: PathBuf,
    },

    /// Decrypt every sealed file under a directory
    #[command(alias = "d")]
    Decrypt {
        /// Directory whose sealed files will be restored
        #[arg(value_name = "DIR")]
        root: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Encrypt { ref root } if cli.dry_run => dry_run(root, tree_ops::encrypt_plan),
        Commands::Decrypt { ref root } if cli.dry_run => dry_run(root, tree_ops::decrypt_plan),
        Commands::Encrypt { ref root } => encrypt(root, cli.passphrase_stdin),
        Commands::Decrypt { ref root } => decrypt(root, cli.passphrase_stdin),
    };

    if let Err(e) = result {
        eprint_chain(&e);
        process::exit(1);
    }
}

fn encrypt(root: &Path, passphrase_stdin: bool) -> Result<()> {
    let mut reader = get_passphrase_reader(passphrase_stdin);
    let passphrase = reader.read_passphrase()?;

    let report = tree_ops::encrypt_tree(root, &passphrase)?;
    if report.all_ok() {
        println!(
            "{} has been encrypted ({} file(s) sealed).",
            root.display(),
            report.succeeded.len()
        );
        return Ok(());
    }

    print_failures(&report);
    eprintln!(
        "sealed {} file(s), failed on {} file(s)",
        report.succeeded.len(),
        report.failed.len()
    );
    process::exit(1);
}

fn decrypt(root: &Path, passphrase_stdin: bool) -> Result<()> {
    loop {
        let mut reader = get_passphrase_reader(passphrase_stdin);
        let passphrase = reader.read_passphrase()?;

        let report = tree_ops::decrypt_tree(root, &passphrase)?;
        if report.all_ok() {
            println!(
                "{} has been decrypted ({} file(s) restored).",
                root.display(),
                report.succeeded.len()
            );
            return Ok(());
        }

        // Retrying makes sense only when a different passphrase could
        // change the outcome, and only when one can be prompted for.
        if report.only_auth_failures() && !passphrase_stdin {
            eprintln!("Incorrect passphrase.");
            continue;
        }

        print_failures(&report);
        eprintln!(
            "restored {} file(s), failed on {} file(s)",
            report.succeeded.len(),
            report.failed.len()
        );
        process::exit(1);
    }
}

fn dry_run(root: &Path, plan_fn: fn(&Path) -> Result<Plan>) -> Result<()> {
    let plan = plan_fn(root)?;
    for path in &plan.files {
        println!("{}", path.display());
    }
    for (path, err) in &plan.errors {
        eprintln!("{}: {}", path.display(), err);
    }
    if !plan.errors.is_empty() {
        process::exit(1);
    }
    Ok(())
}

fn print_failures(report: &TreeReport) {
    for (path, err) in &report.failed {
        eprint!("{}: ", path.display());
        eprint_chain(err);
    }
}

/// Print an error and its source chain on one line
fn eprint_chain(err: &sealtree::error::SealtreeError) {
    eprint!("{}", err);
    let mut source = err.source();
    while let Some(cause) = source {
        eprint!(": {}", cause);
        source = cause.source();
    }
    eprintln!();
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}
