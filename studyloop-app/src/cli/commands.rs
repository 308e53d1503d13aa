use crate::api::server as api_server;
use crate::cli::opts::*;
use crate::content;
use crate::rewards::LogRewards;

use anyhow::Result;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::io::{stdin, stdout, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use studyloop_core::store::memory::{MemoryProgressStore, MemorySessionStore};
use studyloop_core::{
    CardId, ProgressStore, SessionInitializer, SessionPhase, SessionStore, SessionSummary,
    StartRequest, Step, StudySession, Verdict,
};
use studyloop_local::paths::default_db_file;
use studyloop_local::LocalCheckpoints;
use studyloop_sqlite::SqliteStores;

pub async fn run_cli(args: Cli) -> Result<()> {
    let (sessions, progress) = open_stores(&args.store, args.db_path.clone()).await?;
    match args.cmd.clone() {
        Command::Study(cmd) => study_cmd(sessions, progress, cmd).await,
        Command::Progress(cmd) => progress_cmd(progress, cmd).await,
        Command::Serve(cmd) => {
            let init =
                SessionInitializer::new(sessions, progress).with_rewards(Arc::new(LogRewards));
            let addr: std::net::SocketAddr = cmd.addr.parse()?;
            api_server::run(init, addr).await
        }
    }
}

pub async fn open_stores(
    store: &StoreKind,
    db_path: Option<PathBuf>,
) -> Result<(Arc<dyn SessionStore>, Arc<dyn ProgressStore>)> {
    match store {
        StoreKind::Sqlite => {
            let p = db_path.unwrap_or_else(default_db_file);
            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let s = Arc::new(SqliteStores::open_file(&p).await?);
            Ok((s.clone(), s))
        }
        StoreKind::Memory => Ok((
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryProgressStore::new()),
        )),
    }
}

async fn study_cmd(
    sessions: Arc<dyn SessionStore>,
    progress: Arc<dyn ProgressStore>,
    cmd: StudyCmd,
) -> Result<()> {
    let list_name = list_name_for(&cmd.file, &cmd.list);
    let list_id = content::list_id_from_name(&list_name);
    let cards = content::load_cards(&cmd.file, list_id)?;
    if cards.is_empty() {
        println!("no cards in {}", cmd.file.display());
        return Ok(());
    }
    let favorites = match &cmd.starred {
        Some(path) => Some(content::load_starred(path, &cards)?),
        None => None,
    };
    let user = cmd.profile.as_deref().map(content::profile_id);

    let mut init =
        SessionInitializer::new(sessions, progress).with_rewards(Arc::new(LogRewards));
    match LocalCheckpoints::open_default().await {
        Ok(local) => init = init.with_checkpoints(Arc::new(local)),
        Err(err) => warn!(%err, "local checkpoints unavailable"),
    }

    let mut session = init
        .start_or_resume(StartRequest {
            user,
            list_id: Some(list_id),
            mode: cmd.mode.to_mode(),
            cards,
            use_all_cards: cmd.use_all,
            favorites,
        })
        .await;

    if session.phase() == SessionPhase::Finished {
        println!("nothing to study");
        session.dispose().await;
        return Ok(());
    }
    let (i, n) = session.position();
    println!(
        "studying {} ({} card(s) up{})",
        list_name,
        n,
        if session.is_durable() { "" } else { "; progress not saved" }
    );
    if i > 0 {
        println!("picking up at card {}/{}", i + 1, n);
    }

    study_loop(&mut session).await?;
    session.dispose().await;
    Ok(())
}

async fn study_loop(session: &mut StudySession) -> Result<()> {
    'cards: loop {
        let Some(card) = session.current().cloned() else {
            break;
        };
        let (i, n) = session.position();
        println!("\n[round {} | {}/{}] {}", session.round(), i + 1, n, card.front);
        if let Some(h) = &card.hint {
            println!("hint: {}", h);
        }
        prompt_enter("[enter=show]")?;
        println!("A: {}", card.back);
        println!("[y=knew it, n=missed, s=skip, f=forward, b=back, q=quit]");
        let step = loop {
            let line = read_line("> ")?;
            match line.trim().to_lowercase().as_str() {
                "y" | "yes" => break session.submit(Verdict::Correct).await,
                "n" | "no" => break session.submit(Verdict::Incorrect).await,
                "s" | "skip" => break session.submit(Verdict::Skipped).await,
                "f" | "fwd" => break session.advance().await,
                "b" | "back" => {
                    session.back();
                    continue 'cards;
                }
                "q" | "quit" => return Ok(()),
                _ => println!("enter y/n/s, f, b, or q"),
            }
        };
        match step {
            Step::Card(_) => {}
            Step::RoundComplete(s) => {
                println!(
                    "\nround {}: {} studied, {} correct, {} missed, {} skipped",
                    s.round, s.studied, s.correct, s.missed, s.skipped
                );
                println!(
                    "{} missed and {} unseen card(s) remain",
                    s.missed_remaining, s.unseen_remaining
                );
                if !prompt_yes("another round? [y/n] ")? {
                    return Ok(());
                }
                if let Step::Finished(f) = session.next_round().await {
                    print_summary(&f);
                    break;
                }
            }
            Step::Finished(f) => {
                print_summary(&f);
                break;
            }
        }
    }
    Ok(())
}

async fn progress_cmd(progress: Arc<dyn ProgressStore>, cmd: ProgressCmd) -> Result<()> {
    let list_name = list_name_for(&cmd.file, &cmd.list);
    let list_id = content::list_id_from_name(&list_name);
    let cards = content::load_cards(&cmd.file, list_id)?;
    let user = content::profile_id(&cmd.profile);
    let ids: Vec<CardId> = cards.iter().map(|c| c.id).collect();
    let mut rows = progress.aggregates(user, list_id, &ids).await?;
    if rows.is_empty() {
        println!("no recorded progress for {}", list_name);
        return Ok(());
    }
    rows.sort_by_key(|a| Reverse(a.incorrect_count));
    let fronts: HashMap<CardId, &str> = cards.iter().map(|c| (c.id, c.front.as_str())).collect();
    println!("missed\tcorrect\tlast reviewed\tcard");
    for a in rows {
        println!(
            "{}\t{}\t{}\t{}",
            a.incorrect_count,
            a.correct_count,
            a.last_reviewed.format("%Y-%m-%d"),
            fronts.get(&a.flashcard_id).copied().unwrap_or("?")
        );
    }
    Ok(())
}

// ===== Helpers =====
fn list_name_for(file: &Path, list: &Option<String>) -> String {
    match list {
        Some(name) => name.clone(),
        None => file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("cards")
            .to_string(),
    }
}

fn print_summary(s: &SessionSummary) {
    println!(
        "\ndone: {} card(s) over {} round(s); {} correct, {} missed, {} skipped",
        s.cards_studied, s.rounds, s.correct, s.missed, s.skipped
    );
}

fn prompt_enter(label: &str) -> Result<()> { print!("{label}"); stdout().flush().ok(); let mut s = String::new(); stdin().read_line(&mut s)?; Ok(()) }
fn read_line(prompt: &str) -> Result<String> { print!("{prompt}"); stdout().flush().ok(); let mut s = String::new(); stdin().read_line(&mut s)?; Ok(s) }

fn prompt_yes(prompt: &str) -> Result<bool> {
    loop {
        let line = read_line(prompt)?;
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" | "q" | "quit" => return Ok(false),
            _ => println!("y or n"),
        }
    }
}
