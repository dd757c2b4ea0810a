use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use sysrev_core::{
    ClassificationEvent, ClassificationStatus, Phase, StudyReview, StudyReviewId,
    SystematicStudyId,
};
use sysrev_server::{SqliteRepository, StudyReviewRepository, StudyReviewService, DATABASE_FILE};

/// sysrev: inspect and classify study reviews in the state database
#[derive(Parser, Debug)]
#[command(name = "sysrev")]
#[command(about = "Inspect and classify study reviews in the state database", long_about = None)]
struct Cli {
    /// Directory holding the state database
    #[arg(long, env = "STATE_DIR", default_value = ".")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print one study review as JSON
    Show(RecordArgs),
    /// List the study reviews of a systematic study
    List(ListArgs),
    /// Change the selection status of a study review
    Select(ClassifyArgs),
    /// Change the extraction status of a study review
    Extract(ClassifyArgs),
    /// Print the classification history of a study review
    History(RecordArgs),
}

#[derive(Parser, Debug)]
struct RecordArgs {
    /// Systematic study UUID
    systematic_study: Uuid,

    /// Study review id within the systematic study
    study_review: i64,
}

#[derive(Parser, Debug)]
struct ListArgs {
    /// Systematic study UUID
    systematic_study: Uuid,

    /// Only show records with this selection status
    #[arg(long)]
    selection: Option<ClassificationStatus>,

    /// Only show records with this extraction status
    #[arg(long)]
    extraction: Option<ClassificationStatus>,
}

#[derive(Parser, Debug)]
struct ClassifyArgs {
    #[command(flatten)]
    record: RecordArgs,

    /// New status: UNCLASSIFIED, INCLUDED or EXCLUDED
    status: ClassificationStatus,
}

impl RecordArgs {
    fn ids(&self) -> (SystematicStudyId, StudyReviewId) {
        (
            SystematicStudyId(self.systematic_study),
            StudyReviewId(self.study_review),
        )
    }
}

/// Locate the state database. Every command works on existing records, so
/// a missing file is an error rather than a fresh database.
fn existing_database(state_dir: &Path) -> Result<PathBuf> {
    let db_path = state_dir.join(DATABASE_FILE);
    if !db_path.is_file() {
        bail!(
            "no state database at {} (check --state-dir or STATE_DIR)",
            db_path.display()
        );
    }
    Ok(db_path)
}

fn open_service(state_dir: &Path) -> Result<StudyReviewService> {
    let db_path = existing_database(state_dir)?;
    let repository = SqliteRepository::new(&db_path)
        .with_context(|| format!("Failed to open state database {}", db_path.display()))?;
    Ok(StudyReviewService::new(std::sync::Arc::new(repository)))
}

async fn load(service: &StudyReviewService, args: &RecordArgs) -> Result<StudyReview> {
    let (systematic_study, id) = args.ids();
    service
        .repository()
        .get(systematic_study, id)
        .await?
        .ok_or_else(|| {
            anyhow!(
                "study review {} not found in systematic study {}",
                id,
                systematic_study
            )
        })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

async fn run_show(service: &StudyReviewService, args: RecordArgs) -> Result<()> {
    let review = load(service, &args).await?;
    print_json(&review)
}

async fn run_list(service: &StudyReviewService, args: ListArgs) -> Result<()> {
    let reviews = service
        .repository()
        .get_all(SystematicStudyId(args.systematic_study))
        .await?;

    let matching: Vec<StudyReview> = reviews
        .into_iter()
        .filter(|review| {
            let classification = review.classification();
            args.selection
                .map_or(true, |status| classification.selection() == status)
                && args
                    .extraction
                    .map_or(true, |status| classification.extraction() == status)
        })
        .collect();

    print_json(&matching)
}

async fn run_classify(service: &StudyReviewService, phase: Phase, args: ClassifyArgs) -> Result<()> {
    let mut review = load(service, &args.record).await?;
    let event = ClassificationEvent::for_status(phase, args.status)?;

    let classification = service.apply_and_save(&mut review, event).await?;
    print_json(&classification)
}

async fn run_history(service: &StudyReviewService, args: RecordArgs) -> Result<()> {
    // Distinguish a missing record from one that was never classified
    load(service, &args).await?;
    let (systematic_study, id) = args.ids();
    let history = service.repository().get_history(systematic_study, id).await?;
    print_json(&history)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Status arguments are parsed by clap before the database is touched
    let service = open_service(&cli.state_dir)?;

    match cli.command {
        Commands::Show(args) => run_show(&service, args).await,
        Commands::List(args) => run_list(&service, args).await,
        Commands::Select(args) => run_classify(&service, Phase::Selection, args).await,
        Commands::Extract(args) => run_classify(&service, Phase::Extraction, args).await,
        Commands::History(args) => run_history(&service, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUDY: &str = "6f1e2d3c-4b5a-4978-8a6b-5c4d3e2f1a0b";

    #[test]
    fn test_parse_select() {
        let cli = Cli::try_parse_from(["sysrev", "--state-dir", "/tmp/x", "select", STUDY, "3", "INCLUDED"])
            .unwrap();
        assert_eq!(cli.state_dir, PathBuf::from("/tmp/x"));
        match cli.command {
            Commands::Select(args) => {
                assert_eq!(args.record.study_review, 3);
                assert_eq!(args.status, ClassificationStatus::Included);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_lowercase_status_rejected() {
        let result = Cli::try_parse_from(["sysrev", "extract", STUDY, "1", "included"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_list_filters() {
        let cli = Cli::try_parse_from(["sysrev", "list", STUDY, "--selection", "EXCLUDED"]).unwrap();
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.selection, Some(ClassificationStatus::Excluded));
                assert_eq!(args.extraction, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_bad_uuid_rejected() {
        let result = Cli::try_parse_from(["sysrev", "show", "not-a-uuid", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_state_dir_is_left_alone() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state_dir = temp_dir.path().join("typo");

        let err = open_service(&state_dir).err().unwrap();
        assert!(err.to_string().contains("no state database"));
        assert!(!state_dir.exists());
    }

    #[test]
    fn test_empty_state_dir_gets_no_database() {
        let temp_dir = tempfile::tempdir().unwrap();

        assert!(open_service(temp_dir.path()).is_err());
        assert!(!temp_dir.path().join(DATABASE_FILE).exists());
    }

    #[test]
    fn test_existing_database_is_opened() {
        let temp_dir = tempfile::tempdir().unwrap();
        SqliteRepository::new(temp_dir.path().join(DATABASE_FILE)).unwrap();

        assert_eq!(
            existing_database(temp_dir.path()).unwrap(),
            temp_dir.path().join(DATABASE_FILE)
        );
        assert!(open_service(temp_dir.path()).is_ok());
    }
}
