use scrawl_core::{FlushOutcome, Session};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::common::{
    capture_editor_input_with_initial, describe_outcome, normalize_content,
    normalize_note_identifier, read_piped_stdin,
};
use crate::context::CliContext;
use crate::error::CliError;
use crate::probe::{ReachabilityProbe, PROBE_INTERVAL};

pub async fn run_write(
    context: &CliContext,
    title: Option<String>,
    id: Option<&str>,
    stream: bool,
) -> Result<(), CliError> {
    let (session, start) = context.open_signed_in_session().await?;
    let probe = ReachabilityProbe::new(&context.config.api_base_url)?;
    session.connectivity().set(probe.check().await);
    let engine = session.engine();

    if let Some(id) = id {
        let note_id = normalize_note_identifier(id)?;
        let notes = engine.list().await?;
        let note = notes
            .iter()
            .find(|note| note.id == note_id)
            .ok_or_else(|| CliError::NoteNotFound(note_id.to_string()))?;
        let outgoing = engine.select_document(note).await.map_err(unsynced_draft)?;
        report_restored_draft(start.restored_draft, &outgoing);
    } else if start.restored_draft && title.is_some() {
        let outgoing = engine.new_document().await.map_err(unsynced_draft)?;
        report_restored_draft(true, &outgoing);
    }

    if let Some(title) = title {
        engine.on_edit_title(title);
    }
    if engine.document().title.trim().is_empty() {
        return Err(CliError::MissingTitle);
    }

    if stream {
        stream_body(&session, probe).await?;
    } else {
        let initial = engine.document().body;
        let content = match read_piped_stdin()? {
            Some(content) => Some(content),
            None => capture_editor_input_with_initial(&initial)?,
        };
        let content = content.ok_or(CliError::EmptyContent)?;
        if content != initial {
            engine.on_edit_body(content);
        }
    }

    engine.cancel_pending();
    let outcome = engine.flush().await;
    println!("{}", describe_outcome(outcome, &engine.document())?);
    Ok(())
}

/// Send the draft left by a previous run, if it still has changes.
pub async fn run_sync(context: &CliContext) -> Result<(), CliError> {
    let (session, start) = context.open_signed_in_session().await?;
    if !start.restored_draft {
        println!("No local draft");
        return Ok(());
    }

    let probe = ReachabilityProbe::new(&context.config.api_base_url)?;
    session.connectivity().set(probe.check().await);
    let engine = session.engine();
    let outcome = engine.flush().await;
    println!("{}", describe_outcome(outcome, &engine.document())?);
    Ok(())
}

fn unsynced_draft(error: scrawl_core::Error) -> CliError {
    CliError::UnsyncedDraft(error.to_string())
}

fn report_restored_draft(restored: bool, outgoing: &FlushOutcome) {
    if restored && outgoing.is_synced() {
        eprintln!("Sent the draft left by a previous run");
    }
}

/// Apply each stdin line as a body edit as it arrives; the debounce timer
/// saves between bursts and a return to online flushes right away.
async fn stream_body(session: &Session, probe: ReachabilityProbe) -> Result<(), CliError> {
    let engine = session.engine();
    let listener = engine.spawn_connectivity_listener();
    let prober = probe.spawn(session.connectivity().clone(), PROBE_INTERVAL);

    let mut body = engine.document().body;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result = async {
        while let Some(line) = lines.next_line().await? {
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(&line);
            engine.on_edit_body(body.clone());
        }
        Ok::<(), CliError>(())
    }
    .await;

    prober.abort();
    listener.abort();
    result?;

    if normalize_content(&engine.document().body).is_none() {
        return Err(CliError::EmptyContent);
    }
    Ok(())
}
