use scrawl_core::store::StoredDraft;
use serde::Serialize;

use crate::cli::DraftCommands;
use crate::context::CliContext;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct DraftView {
    pub id: Option<String>,
    pub title: String,
    pub body: String,
    pub last_saved_at: Option<String>,
}

impl From<StoredDraft> for DraftView {
    fn from(draft: StoredDraft) -> Self {
        Self {
            id: draft.identity.map(|id| id.to_string()),
            title: draft.title.unwrap_or_default(),
            body: draft.body.unwrap_or_default(),
            last_saved_at: draft.last_saved_at.map(|at| at.to_rfc3339()),
        }
    }
}

pub fn run_draft(context: &CliContext, command: DraftCommands) -> Result<(), CliError> {
    let drafts = context.draft_store()?;
    match command {
        DraftCommands::Show { json } => {
            let Some(draft) = drafts.load()? else {
                println!("No local draft");
                return Ok(());
            };
            let view = DraftView::from(draft);
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("{}", format_draft(&view));
            }
            Ok(())
        }
        DraftCommands::Discard => {
            drafts.clear()?;
            println!("Local draft discarded");
            Ok(())
        }
    }
}

pub fn format_draft(view: &DraftView) -> String {
    let mut header = view.title.clone();
    if let Some(id) = &view.id {
        header.push_str(&format!(" ({id})"));
    } else {
        header.push_str(" (not yet created)");
    }
    if let Some(at) = &view.last_saved_at {
        header.push_str(&format!("\nsaved locally at {at}"));
    }
    format!("{header}\n\n{}", view.body)
}
