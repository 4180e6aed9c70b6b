//! Step picker shown when no subcommand is given.

use crime_stats_artifact::Stage;
use dialoguer::{MultiSelect, Select};

/// What the user chose to do.
pub enum Selection {
    Run(Vec<Stage>),
    Status,
}

enum Action {
    RunAll,
    PickStages,
    Status,
}

impl Action {
    const ALL: &[Self] = &[Self::RunAll, Self::PickStages, Self::Status];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::RunAll => "Run the full pipeline",
            Self::PickStages => "Run selected stages",
            Self::Status => "Show artifact status",
        }
    }
}

/// Prompts for an action, and for the stages to run if needed.
///
/// # Errors
///
/// Returns an error if the terminal prompt fails.
pub fn select() -> Result<Selection, dialoguer::Error> {
    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::RunAll => Ok(Selection::Run(Stage::all().to_vec())),
        Action::Status => Ok(Selection::Status),
        Action::PickStages => {
            let stage_labels: Vec<String> = Stage::all()
                .iter()
                .map(|s| format!("{}. {}", s.number(), s.label()))
                .collect();
            let selected = MultiSelect::new()
                .with_prompt("Stages (space=toggle, a=all, enter=confirm)")
                .items(&stage_labels)
                .interact()?;
            Ok(Selection::Run(
                selected.into_iter().map(|i| Stage::all()[i]).collect(),
            ))
        }
    }
}
