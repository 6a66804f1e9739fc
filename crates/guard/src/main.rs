use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use lock3r_contracts::document::InMemoryDocument;
use lock3r_contracts::{ElementId, FieldId, FieldMutation, FieldValue, StorageKind};
use lock3r_guard::host::{RecordingNotifier, RecordingSink, apply_mutation};
use lock3r_guard::{CheckpointDecision, Guard, GuardConfig, Verdict, Violation};
use lock3r_policy::describe_altered;

/// lock3r - ground truth protection for shared document fields
#[derive(Parser, Debug)]
#[command(name = "lock3r")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture the ground truth of a document, replacing any existing record
    Establish { document: PathBuf },

    /// Compare a document with its ground truth
    Validate {
        document: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the open checkpoint
    Open { document: PathBuf },

    /// Run the save checkpoint
    Save { document: PathBuf },

    /// Print the ground truth record of a document
    Show { document: PathBuf },

    /// Change one field with live enforcement enabled
    Set {
        document: PathBuf,
        element_id: ElementId,
        field_id: FieldId,
        value: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match GuardConfig::load() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("STARTUP_ERROR {}", err);
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, Guard::new(config)) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ERROR {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, guard: Guard) -> Result<ExitCode> {
    match command {
        Commands::Establish { document } => {
            let doc = load_document(&document)?;
            let path = guard.establish(&doc)?;
            println!("ground truth written to {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { document, json } => {
            let doc = load_document(&document)?;
            let result = guard.validate(&doc)?;
            if json {
                let mismatched = result
                    .mismatched
                    .iter()
                    .map(|key| {
                        serde_json::json!({
                            "element_id": key.element_id,
                            "field_id": key.field_id,
                        })
                    })
                    .collect::<Vec<_>>();
                println!(
                    "{}",
                    serde_json::json!({ "ok": result.ok(), "mismatched": mismatched })
                );
            } else if result.ok() {
                println!("OK: {} matches its ground truth", document.display());
            } else {
                println!("MISMATCH: {}", document.display());
                println!("{}", describe_altered(&doc, &result));
            }
            Ok(exit_code(result.ok()))
        }
        Commands::Open { document } => {
            let doc = load_document(&document)?;
            let mut sink = RecordingSink::default();
            let decision = guard.on_document_opened(&doc, &mut sink)?;
            report_checkpoint(&decision, &sink);
            Ok(exit_code(!decision.is_violation()))
        }
        Commands::Save { document } => {
            let doc = load_document(&document)?;
            let mut sink = RecordingSink::default();
            let decision = guard.on_document_saving(&doc, &mut sink)?;
            report_checkpoint(&decision, &sink);
            Ok(exit_code(!decision.is_violation()))
        }
        Commands::Show { document } => {
            let record = guard.store().load(&document)?;
            print!("{}", record.serialize());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Set {
            document,
            element_id,
            field_id,
            value,
        } => {
            let mut doc = load_document(&document)?;
            let Some(current) = doc.field_value(element_id, field_id) else {
                bail!("element {} has no field {}", element_id, field_id);
            };
            if current.storage_kind() == StorageKind::None {
                bail!(
                    "field {} on element {} holds no typed value; its storage kind is unknown",
                    field_id,
                    element_id
                );
            }
            let proposed = FieldValue::parse_as(current.storage_kind(), &value)?;

            let mut session = guard.session();
            let mut notifier = RecordingNotifier::default();
            session
                .toggle_on(&doc, guard.store(), &mut notifier)
                .context("cannot enable live enforcement")?;

            let mut sink = RecordingSink::default();
            let mutation = FieldMutation {
                element_id,
                field_id,
                proposed,
            };
            let verdict = apply_mutation(&mut doc, &session, mutation, &mut sink)?;
            for failure in &sink.failures {
                eprintln!(
                    "{} {} {}",
                    failure.severity.as_str(),
                    failure.failure_id,
                    failure.message
                );
            }

            if verdict == Verdict::Allowed {
                doc.write_json_file()
                    .with_context(|| format!("failed to write {}", document.display()))?;
                println!("updated {}", document.display());
            }
            Ok(exit_code(verdict == Verdict::Allowed))
        }
    }
}

fn load_document(path: &Path) -> Result<InMemoryDocument> {
    InMemoryDocument::from_json_file(path)
        .with_context(|| format!("failed to load document {}", path.display()))
}

fn report_checkpoint(decision: &CheckpointDecision, sink: &RecordingSink) {
    match decision {
        CheckpointDecision::Established { path, entries } => {
            println!("{} {} entries -> {}", decision.as_str(), entries, path.display());
        }
        CheckpointDecision::CancelSave(violation)
        | CheckpointDecision::CloseDocument(violation)
        | CheckpointDecision::Flagged(violation) => {
            let count = match violation {
                Violation::Mismatch(result) => result.mismatched.len(),
                Violation::CorruptRecord { .. } => 0,
            };
            println!("{} mismatched={}", decision.as_str(), count);
        }
        CheckpointDecision::Proceed => println!("{}", decision.as_str()),
    }

    for failure in &sink.failures {
        eprintln!("{} {}", failure.severity.as_str(), failure.message);
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
