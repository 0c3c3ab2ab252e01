//! gainengine - rotating strength plan with automated progressive overload

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use gainengine::coach::{CoachingService, OfflineCoach};
use gainengine::db::{PersistenceGateway, SqliteGateway};
use gainengine::engine::{find_day_index_by_name, next_day, next_day_index, ProgressReport};
use gainengine::error::{Unsaved, WorkoutError};
use gainengine::manager::{RetryPolicy, WorkoutManager};
use gainengine::model::{format_weight, UserWorkoutData};
use gainengine::plan::{parse_weight, NewExercise};
use gainengine::settings::{Language, Settings};
use gainengine::transaction::{CompletedWorkout, Completion};
use gainengine::tui::App;

#[derive(Parser)]
#[command(name = "gainengine")]
#[command(author, version, about = "Rotating strength plan with automated progressive overload")]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "GAINENGINE_DB", default_value = "gainengine.db", global = true)]
    db: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open TUI dashboard
    Tui,

    /// Show today's workout
    Today,

    /// Complete today's workout and apply progression
    Complete,

    /// Make a day the next workout, by 0-based index or by exact name
    Select { day: String },

    /// List workout days with their exercises
    Days,

    /// Append a workout day
    AddDay { name: String },

    /// Delete a workout day by id
    DeleteDay { day_id: String },

    /// Add an exercise to a day
    AddExercise {
        day_id: String,

        name: String,

        /// Target reps, e.g. "3x10" or "8-12"
        #[arg(short, long)]
        reps: Option<String>,

        /// Starting weight in kg
        #[arg(short, long)]
        weight: Option<String>,
    },

    /// Delete an exercise from a day
    DeleteExercise { day_id: String, exercise_id: String },

    /// Set an exercise's working weight by hand
    SetWeight {
        day_id: String,
        exercise_id: String,
        weight: String,
    },

    /// Show progress per exercise
    Progress {
        /// Filter by exercise name
        exercise: Option<String>,
    },

    /// Coaching tips for today's workout
    Coach,

    /// Show or change progression settings
    Settings {
        /// Sessions at the same weight before increasing
        #[arg(long)]
        streak: Option<String>,

        /// Increment in kg above every tier
        #[arg(long)]
        increment: Option<String>,

        /// Increment tiers as "below:step,...", or "none"
        #[arg(long)]
        tiers: Option<String>,

        /// Language for coaching tips (en, fi)
        #[arg(long)]
        language: Option<String>,
    },

    /// Delete all workout data and start from the default plan
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let gateway = SqliteGateway::open(&cli.db)
        .with_context(|| format!("failed to open database {}", cli.db))?;
    let settings = Settings::load(&gateway).await;
    let manager = WorkoutManager::load(gateway, settings.progression(), RetryPolicy::default()).await;
    let coach = OfflineCoach::new();

    match cli.command {
        Some(Commands::Tui) | None => {
            let mut app = App::new(&manager, &coach, settings.language);
            app.run().await?;
        }

        Some(Commands::Today) => {
            let data = manager.snapshot();
            print_today(&data, &manager);
        }

        Some(Commands::Complete) => match manager.complete_workout().await {
            Ok(Completion::NothingToComplete) => println!("Nothing to complete: the plan has no days"),
            Ok(Completion::Completed(done)) => print_completion(&done),
            Err(e) => {
                if let Some(Unsaved::Completed(done)) = e.unsaved() {
                    print_completion(done);
                    warn!("Workout completed but not saved: {}", e);
                }
                return Err(e.into());
            }
        },

        Some(Commands::Select { day }) => {
            let data = manager.snapshot();
            let index = match day.trim().parse::<usize>() {
                Ok(index) => index,
                Err(_) => find_day_index_by_name(&data, &day)
                    .with_context(|| format!("no workout day named {:?}", day))?,
            };
            manager.set_manual_index(index).await?;
            print_today(&manager.snapshot(), &manager);
        }

        Some(Commands::Days) => {
            let data = manager.snapshot();
            let next = next_day_index(&data);
            for (i, day) in data.days.iter().enumerate() {
                let marker = if Some(i) == next { ">" } else { " " };
                println!("{} {} [{}] {}", marker, i, day.id, day.name);
                for ex in &day.exercises {
                    let last = ex
                        .last_entry()
                        .map(|e| e.date.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "never".to_string());
                    println!(
                        "      [{}] {:20} {:6} {:>8}  last: {}",
                        ex.id,
                        ex.name,
                        ex.target_reps,
                        format_weight(ex.weight),
                        last
                    );
                }
            }
        }

        Some(Commands::AddDay { name }) => {
            let id = manager
                .add_day(&name)
                .await
                .map_err(|e| created_but_unsaved(e, &name))?;
            println!("Added day: {} (id: {})", name, id);
        }

        Some(Commands::DeleteDay { day_id }) => {
            manager.delete_day(&day_id).await?;
            println!("Deleted day {}", day_id);
        }

        Some(Commands::AddExercise { day_id, name, reps, weight }) => {
            let spec = NewExercise {
                name: Some(name.clone()),
                target_reps: reps,
                weight,
            };
            let id = manager
                .add_exercise(&day_id, &spec)
                .await
                .map_err(|e| created_but_unsaved(e, &name))?;
            println!("Added: {} (id: {})", name, id);
        }

        Some(Commands::DeleteExercise { day_id, exercise_id }) => {
            manager.delete_exercise(&day_id, &exercise_id).await?;
            println!("Deleted exercise {}", exercise_id);
        }

        Some(Commands::SetWeight { day_id, exercise_id, weight }) => {
            manager.set_exercise_weight(&day_id, &exercise_id, &weight).await?;
            let data = manager.snapshot();
            if let Some(ex) = data
                .find_day(&day_id)
                .and_then(|d| d.find_exercise(&exercise_id))
            {
                println!("{}: {}", ex.name, format_weight(ex.weight));
            }
        }

        Some(Commands::Progress { exercise }) => {
            let report = ProgressReport::new(&manager.snapshot());

            println!("Progress");
            println!("{:-<60}", "");

            let selected: Vec<_> = match &exercise {
                Some(name) => report.find(name).into_iter().collect(),
                None => report.exercises().iter().collect(),
            };
            if selected.is_empty() {
                println!("No data");
            }
            let single = selected.len() == 1;
            for p in selected {
                println!(
                    "{:20} | start {:>8} | current {:>8} | best {:>8} | gain {:>+6.2}kg | {} sessions",
                    p.name,
                    format_weight(p.starting_weight),
                    format_weight(p.current_weight),
                    format_weight(p.best_weight),
                    p.gain(),
                    p.sessions
                );
                if single {
                    for (date, weight) in &p.series {
                        println!("  {}  {}", date.format("%Y-%m-%d"), format_weight(*weight));
                    }
                }
            }
            if exercise.is_none() {
                println!("{:-<60}", "");
                println!("Total sessions logged: {}", report.total_sessions());
            }
        }

        Some(Commands::Coach) => {
            let data = manager.snapshot();
            match next_day(&data) {
                Some(day) => println!("{}", coach.analyze(day, settings.language).await),
                None => println!("No workout days"),
            }
        }

        Some(Commands::Settings { streak, increment, tiers, language }) => {
            let mut settings = settings;
            let changed = streak.is_some() || increment.is_some() || tiers.is_some() || language.is_some();

            if let Some(raw) = streak {
                settings.set_frequency(&raw);
            }
            // tiers first: the increment is checked against them
            if let Some(raw) = tiers {
                settings.set_tiers(&raw);
            }
            if let Some(raw) = increment {
                let applied = settings.set_increment(&raw);
                if parse_weight(&raw).is_some_and(|w| w != applied) {
                    println!(
                        "Increment raised to {} to match the largest tier step",
                        format_weight(applied)
                    );
                }
            }
            if let Some(tag) = language {
                settings.language = Language::parse(&tag);
            }
            if changed {
                settings.save(manager.gateway()).await?;
            }

            println!("Sessions before increase: {}", settings.overload_frequency);
            for tier in &settings.increment_tiers {
                println!("Below {}: +{}", format_weight(tier.below), format_weight(tier.step));
            }
            println!("Otherwise: +{}", format_weight(settings.overload_increment));
            println!("Language: {}", settings.language.tag());
        }

        Some(Commands::Reset) => {
            manager.reset().await?;
            println!("Workout data reset to the default plan");
        }
    }

    Ok(())
}

fn print_today<G: PersistenceGateway>(data: &UserWorkoutData, manager: &WorkoutManager<G>) {
    let Some(day) = next_day(data) else {
        println!("No workout days. Add one with `gainengine add-day <name>`");
        return;
    };

    let engine = manager.engine();
    println!("Today: {}", day.name);
    println!("{:-<60}", "");
    for ex in &day.exercises {
        println!(
            "{:20} | {:6} | {:>8} | {} more at this weight",
            ex.name,
            ex.target_reps,
            format_weight(ex.weight),
            engine.sessions_until_overload(ex)
        );
    }
}

fn print_completion(done: &CompletedWorkout) {
    println!("Completed: {}", done.day_name);
    for update in &done.updates {
        match update.overload_message() {
            Some(msg) => println!(
                "  {:20} {} -> {}  {}",
                update.name,
                format_weight(update.previous_weight),
                format_weight(update.new_weight),
                msg
            ),
            None => println!("  {:20} {}", update.name, format_weight(update.new_weight)),
        }
    }
}

/// Report an id that exists in memory only, then hand the error on
fn created_but_unsaved(e: WorkoutError, name: &str) -> anyhow::Error {
    if let Some(Unsaved::Created { id }) = e.unsaved() {
        println!("Added {} (id: {}) but it is not saved yet", name, id);
    }
    e.into()
}
