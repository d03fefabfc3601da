use clap::Subcommand;
use drillroom_core::session::format_clock;
use drillroom_core::Config;

#[derive(Subcommand)]
pub enum CatalogAction {
    /// List drills and workouts
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: CatalogAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let catalog = config.catalog();

    match action {
        CatalogAction::List { json: true } => {
            let value = serde_json::json!({
                "drills": catalog.drills().collect::<Vec<_>>(),
                "workouts": catalog.workouts().collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        CatalogAction::List { json: false } => {
            println!("Drills:");
            for drill in catalog.drills() {
                println!(
                    "  {:<20} {:>8}  {}",
                    drill.id,
                    format_clock(drill.duration_secs),
                    drill.name
                );
            }
            println!("Workouts:");
            for workout in catalog.workouts() {
                println!(
                    "  {:<20} {:>8}  {} ({})",
                    workout.id,
                    format_clock(catalog.workout_duration_secs(workout)),
                    workout.name,
                    workout.drills.join(", ")
                );
            }
        }
    }
    Ok(())
}
