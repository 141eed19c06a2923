use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod aggregate;
mod config;
mod db;
mod export;
mod grading;
mod models;
mod report;
mod session;

use crate::db::Store;
use crate::grading::{grade_for_score, grade_point_for_score, Grade, PointScale};
use crate::models::{CourseDraft, NewProfile, Score};
use crate::session::Session;

#[derive(Parser)]
#[command(name = "gpa-tracker")]
#[command(about = "Track semesters, courses and cumulative GPA across profiles", long_about = None)]
struct Cli {
    /// Path to the SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Manage profiles
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Manage semesters of the current profile
    #[command(subcommand)]
    Semester(SemesterCommand),
    /// Manage courses of the current profile
    #[command(subcommand)]
    Course(CourseCommand),
    /// Change the point scale of the current profile
    Scale { scale: PointScale },
    /// Set the previous CGPA baseline of the current profile
    Baseline {
        #[arg(long)]
        cgpa: f64,
        #[arg(long)]
        credits: u32,
    },
    /// Print the GPA report of the current profile
    Show {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export every profile to a JSON file
    Export { out: PathBuf },
    /// Convert a score to its grade and grade points
    Grade { score: f64 },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// List profiles, most recently selected first
    List,
    /// Create a profile and switch to it
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    /// Switch to another profile
    Select { id: Uuid },
    /// Delete a profile with all of its semesters and courses
    Delete {
        id: Uuid,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SemesterCommand {
    /// Add an empty semester
    Add,
    /// Delete a semester with all of its courses
    Delete {
        id: Uuid,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum CourseCommand {
    /// Add a course to a semester
    Add {
        semester: Uuid,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        score: Option<f64>,
        #[arg(long, default_value_t = 0)]
        credits: u32,
    },
    /// Update fields of a course
    Set {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        score: Option<f64>,
        #[arg(long)]
        credits: Option<u32>,
        #[arg(long, conflicts_with = "score")]
        grade: Option<Grade>,
    },
    /// Delete a course
    Delete { id: Uuid },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("gpa_tracker=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn require_confirmation(confirmed: bool, what: &str) -> anyhow::Result<()> {
    if !confirmed {
        bail!("refusing to delete {what} and everything under it without --yes");
    }
    Ok(())
}

fn print_result(session: &Session) {
    println!("{}", report::result_line(session.summary()));
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Grade { score } = cli.command {
        let score = Score::new(score)?;
        println!(
            "{}: {} points on the 5.0 scale, {} on the 4.0 scale",
            grade_for_score(score),
            grade_point_for_score(PointScale::Five, score),
            grade_point_for_score(PointScale::Four, score)
        );
        return Ok(());
    }

    let database_path = config::database_path_from_env(cli.database.as_deref())?;
    let store = Store::open(&database_path)
        .await
        .with_context(|| format!("failed to open database {}", database_path.display()))?;

    if let Commands::InitDb = cli.command {
        println!("Schema ready at {}.", store.path().display());
        store.close().await;
        return Ok(());
    }

    let mut session = Session::open(store)
        .await
        .context("failed to load the current profile")?;
    session.subscribe(|summary| {
        debug!(
            credits = summary.grand_credits,
            points = summary.grand_points,
            cgpa = %summary.cgpa_label(),
            "totals changed"
        )
    });

    match cli.command {
        Commands::InitDb | Commands::Grade { .. } => {}
        Commands::Profile(ProfileCommand::List) => {
            let current = session.profile().id;
            for profile in session.store().list_profiles().await? {
                let marker = if profile.id == current { "*" } else { " " };
                println!(
                    "{} {} {} ({}, scale {})",
                    marker, profile.id, profile.name, profile.color, profile.point_scale
                );
            }
        }
        Commands::Profile(ProfileCommand::Create { name, color }) => {
            let profile = NewProfile::named(&name, color.as_deref())?;
            let id = session.create_profile(profile).await?;
            println!("Created profile {name} ({id}).");
            print_result(&session);
        }
        Commands::Profile(ProfileCommand::Select { id }) => {
            session.select_profile(id).await?;
            println!("Switched to profile {}.", session.profile().name);
            print_result(&session);
        }
        Commands::Profile(ProfileCommand::Delete { id, yes }) => {
            require_confirmation(yes, "the profile")?;
            session.delete_profile(id).await?;
            println!(
                "Deleted profile {id}. Current profile is {}.",
                session.profile().name
            );
            print_result(&session);
        }
        Commands::Semester(SemesterCommand::Add) => {
            let id = session.add_semester().await?;
            println!(
                "Added semester {} ({id}).",
                session.semesters().len()
            );
            print_result(&session);
        }
        Commands::Semester(SemesterCommand::Delete { id, yes }) => {
            require_confirmation(yes, "the semester")?;
            session.remove_semester(id).await?;
            println!("Deleted semester {id}.");
            print_result(&session);
        }
        Commands::Course(CourseCommand::Add {
            semester,
            name,
            score,
            credits,
        }) => {
            let draft = CourseDraft {
                name,
                score: score.map(Score::new).transpose()?,
                credit_units: credits,
            };
            let id = session.add_course(semester, draft).await?;
            println!("Added course {id}.");
            print_result(&session);
        }
        Commands::Course(CourseCommand::Set {
            id,
            name,
            score,
            credits,
            grade,
        }) => {
            if let Some(name) = name {
                session.rename_course(id, &name).await?;
            }
            if let Some(score) = score {
                session.set_course_score(id, Score::new(score)?).await?;
            }
            if let Some(grade) = grade {
                let score = session.set_course_grade(id, grade).await?;
                println!("Score is now {:.2}.", score.value());
            }
            if let Some(credits) = credits {
                session.set_course_credit_units(id, credits).await?;
            }
            print_result(&session);
        }
        Commands::Course(CourseCommand::Delete { id }) => {
            session.remove_course(id).await?;
            println!("Deleted course {id}.");
            print_result(&session);
        }
        Commands::Scale { scale } => {
            session.set_point_scale(scale).await?;
            println!("Point scale is now {scale}.");
            print_result(&session);
        }
        Commands::Baseline { cgpa, credits } => {
            session.set_baseline(cgpa, credits).await?;
            print_result(&session);
        }
        Commands::Show { out } => {
            let report =
                report::build_report(session.profile(), session.semesters(), session.summary());
            match out {
                Some(path) => {
                    std::fs::write(&path, report)?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{report}"),
            }
        }
        Commands::Export { out } => {
            let profiles = export::export_to_file(session.store(), &out)
                .await
                .with_context(|| format!("failed to export to {}", out.display()))?;
            println!("Exported {profiles} profiles to {}.", out.display());
        }
    }

    session.into_store().close().await;
    Ok(())
}
