use clap::Args;
use drillroom_core::storage::Database;

#[derive(Args)]
pub struct HistoryArgs {
    /// Number of entries to show
    #[arg(long, default_value = "10")]
    limit: usize,
    /// List individual step completions instead of sessions
    #[arg(long)]
    steps: bool,
}

pub fn run(args: HistoryArgs) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    if args.steps {
        let steps = db.step_history(args.limit)?;
        println!("{}", serde_json::to_string_pretty(&steps)?);
    } else {
        let sessions = db.history(args.limit)?;
        println!("{}", serde_json::to_string_pretty(&sessions)?);
    }
    Ok(())
}
