//! Dataset command handlers.

use tabled::Tabled;

use pennsync_core::{Dataset, SyncService};

use crate::cli::{DatasetsArgs, DatasetsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct DatasetRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
}

impl From<&Dataset> for DatasetRow {
    fn from(d: &Dataset) -> Self {
        Self {
            name: d.name.clone(),
            id: d.id.clone(),
        }
    }
}

pub async fn handle(
    service: &SyncService,
    args: DatasetsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DatasetsCommand::List { filter } => {
            let datasets = service.datasets(filter.as_deref()).await?;
            let out = output::render_list(
                global.output,
                &datasets,
                |d| DatasetRow::from(d),
                |d| d.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
