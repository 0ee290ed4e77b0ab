use crate::commands::common::{normalize_note_identifier, print_notes};
use crate::context::CliContext;
use crate::error::CliError;

pub async fn run_list(context: &CliContext, limit: usize, as_json: bool) -> Result<(), CliError> {
    let (session, _) = context.open_signed_in_session().await?;
    let notes = session.engine().list().await?;
    print_notes(&notes, limit, as_json)
}

pub async fn run_search(
    context: &CliContext,
    query: &str,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let (session, _) = context.open_signed_in_session().await?;
    let notes = session.engine().search(query).await?;
    if notes.is_empty() && !as_json {
        println!("No notes match '{}'", query.trim());
        return Ok(());
    }
    print_notes(&notes, limit, as_json)
}

pub async fn run_delete(context: &CliContext, id: &str) -> Result<(), CliError> {
    let note_id = normalize_note_identifier(id)?;
    let (session, _) = context.open_signed_in_session().await?;
    session.engine().delete_document(&note_id).await?;
    println!("{note_id}");
    Ok(())
}
