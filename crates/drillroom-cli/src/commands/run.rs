use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use drillroom_core::{
    CompletionReporter, CompletionStore, Config, Database, Feedback, MemoryStore, PendingWrite,
    PersistenceFailure, Sequencer, SessionEvent, StepCatalog,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Args)]
pub struct RunArgs {
    /// Drill to run on its own
    #[arg(long, conflicts_with = "workout", required_unless_present = "workout")]
    drill: Option<String>,
    /// Workout to run, drill by drill
    #[arg(long)]
    workout: Option<String>,
    /// Seconds per tick (defaults to engine.tick_granularity_secs)
    #[arg(long)]
    granularity: Option<u64>,
    /// Wall-clock speed-up; 60 runs a minute of practice per second
    #[arg(long, default_value = "1")]
    speed: u64,
    /// Keep completions in memory instead of the database
    #[arg(long)]
    dry_run: bool,
    /// Ignore stdin commands
    #[arg(long)]
    no_input: bool,
}

/// Commands typed while a session runs.
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Pause,
    Resume,
    Skip,
    Stop,
    Status,
    Rate { rating: u8, note: Option<String> },
}

fn parse_input(line: &str) -> Option<Input> {
    let mut words = line.split_whitespace();
    let input = match words.next()? {
        "p" | "pause" => Input::Pause,
        "r" | "resume" => Input::Resume,
        "s" | "skip" => Input::Skip,
        "q" | "stop" => Input::Stop,
        "status" => Input::Status,
        "rate" => {
            let rating = words.next()?.parse().ok()?;
            let note = words.collect::<Vec<_>>().join(" ");
            Input::Rate {
                rating,
                note: (!note.is_empty()).then_some(note),
            }
        }
        _ => return None,
    };
    Some(input)
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(drive(args, config));
    // The stdin reader may still be parked on a blocking read.
    runtime.shutdown_background();
    result
}

async fn drive(args: RunArgs, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = config.catalog();
    let steps = match (&args.drill, &args.workout) {
        (Some(drill), _) => vec![catalog.drill(drill)?],
        (None, Some(workout)) => catalog.workout(workout)?,
        (None, None) => return Err("pass --drill or --workout".into()),
    };

    let store: Arc<dyn CompletionStore> = if args.dry_run {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(Database::open()?)
    };
    let (reporter, mut failures) = CompletionReporter::spawn(store);

    let mut seq = Sequencer::with_policy(config.engine.start_policy);
    seq.subscribe(reporter.clone());

    let granularity = args
        .granularity
        .unwrap_or(config.engine.tick_granularity_secs);
    print_events(&seq.start(steps, granularity)?)?;

    let period_ms = (granularity.saturating_mul(1000) / args.speed.max(1)).max(1);
    let mut ticker = tokio::time::interval(Duration::from_millis(period_ms));
    // The first interval tick fires immediately.
    ticker.tick().await;

    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    if !args.no_input {
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match parse_input(&line) {
                    Some(input) => {
                        if input_tx.send(input).is_err() {
                            break;
                        }
                    }
                    None => eprintln!("commands: pause | resume | skip | stop | status | rate <1-5> [note]"),
                }
            }
        });
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !seq.status().is_terminal() {
        tokio::select! {
            _ = ticker.tick() => {
                print_events(&seq.tick()?)?;
            }
            Some(input) = input_rx.recv() => {
                let result = match input {
                    Input::Pause => seq.pause(),
                    Input::Resume => seq.resume(),
                    Input::Skip => seq.skip(),
                    Input::Stop => seq.stop(),
                    Input::Status => {
                        let snapshot = seq.snapshot();
                        eprintln!(
                            "{} {} left, {:.0}% done",
                            snapshot.status,
                            snapshot.remaining_formatted(),
                            snapshot.progress_fraction * 100.0
                        );
                        Ok(Vec::new())
                    }
                    Input::Rate { rating, note } => {
                        rate(&seq, &reporter, Feedback::new(Some(rating), note));
                        Ok(Vec::new())
                    }
                };
                match result {
                    Ok(events) => print_events(&events)?,
                    Err(e) => eprintln!("{e}"),
                }
            }
            Some(failure) = failures.recv() => report_failure(&failure),
            _ = &mut ctrl_c => {
                print_events(&seq.stop()?)?;
            }
        }
    }

    reporter.flush().await;
    while let Ok(failure) = failures.try_recv() {
        report_failure(&failure);
    }
    println!("{}", serde_json::to_string(&seq.snapshot())?);
    Ok(())
}

/// Rate the step that finished last, or the current one if none has.
fn rate(seq: &Sequencer, reporter: &CompletionReporter, feedback: Feedback) {
    if let Some(last) = seq.records().last() {
        reporter.annotate(&last.step_id, feedback);
    } else if let Some(session) = seq.session() {
        reporter.queue_feedback(session.current_step().id.clone(), feedback);
    }
}

fn print_events(events: &[SessionEvent]) -> Result<(), serde_json::Error> {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

fn report_failure(failure: &PersistenceFailure) {
    let what = match &failure.write {
        PendingWrite::Step { record } => format!("step '{}'", record.step_id),
        PendingWrite::Session { .. } => "session summary".to_string(),
    };
    warn!(error = %failure.error, "persistence failure");
    eprintln!(
        "couldn't save {what}: {}; your progress is still counted locally",
        failure.error
    );
}
