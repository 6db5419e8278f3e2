//! `tracker board|column|issue`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracker::board::{BoardModel, BoardOrderingEngine, NewIssue, Settled};

use super::session::Session;
use crate::{BoardCommands, Cli, ColumnCommands, IssueCommands};

pub async fn cmd_board(cli: &Cli, project_dir: PathBuf, command: BoardCommands) -> Result<()> {
    let session = Session::open(cli, project_dir).await?;
    match command {
        BoardCommands::Show { key, json } => {
            let board = session.engine(&key).await?.board()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&board)?);
            } else {
                print_board(&board);
            }
        }
    }
    session.finish().await;
    Ok(())
}

pub async fn cmd_column(cli: &Cli, project_dir: PathBuf, command: ColumnCommands) -> Result<()> {
    let session = Session::open(cli, project_dir).await?;
    let actor = &session.actor;

    match command {
        ColumnCommands::Add { key, title } => {
            let engine = session.engine(&key).await?;
            let column = settled(engine.create_column(actor, &title).await?)?;
            println!("Added column {} (id {})", column.title, column.id);
        }
        ColumnCommands::Rename {
            key,
            column_id,
            title,
        } => {
            let engine = session.engine(&key).await?;
            let column = settled(engine.rename_column(actor, column_id, &title).await?)?;
            println!("Renamed column {} to {}", column.id, column.title);
        }
        ColumnCommands::Delete { key, column_id } => {
            let engine = session.engine(&key).await?;
            settled(engine.delete_column(actor, column_id).await?)?;
            println!("Deleted column {}", column_id);
        }
        ColumnCommands::Move { key, from, to } => {
            let engine = session.engine(&key).await?;
            settled(engine.move_column(actor, from, to).await?)?;
            print_columns(&engine)?;
        }
    }

    session.finish().await;
    Ok(())
}

pub async fn cmd_issue(cli: &Cli, project_dir: PathBuf, command: IssueCommands) -> Result<()> {
    let session = Session::open(cli, project_dir).await?;
    let actor = &session.actor;

    match command {
        IssueCommands::Add {
            key,
            column_id,
            title,
            start,
            end,
            assignee,
        } => {
            let engine = session.engine(&key).await?;
            let new = NewIssue {
                title,
                start_date: start,
                end_date: end,
                assignee_id: assignee,
            };
            let issue = settled(engine.create_issue(actor, column_id, new).await?)?;
            println!(
                "Created issue #{} in {} ({})",
                issue.id, column_title(&engine, issue.column_id)?, issue.status
            );
        }
        IssueCommands::Move {
            key,
            issue_id,
            column_id,
            index,
        } => {
            let engine = session.engine(&key).await?;
            let (source, _) = engine
                .board()?
                .locate_issue(issue_id)
                .with_context(|| format!("Issue {} is not on board {}", issue_id, key))?;
            settled(
                engine
                    .move_issue(actor, issue_id, source, column_id, index)
                    .await?,
            )?;
            println!(
                "Moved issue #{} to {} at position {}",
                issue_id,
                column_title(&engine, column_id)?,
                index
            );
        }
        IssueCommands::Delete { key, issue_id } => {
            let engine = session.engine(&key).await?;
            settled(engine.delete_issue(actor, issue_id).await?)?;
            println!("Deleted issue #{}", issue_id);
        }
    }

    session.finish().await;
    Ok(())
}

/// A one-shot CLI engine is never reloaded, so a discarded result means
/// something else replaced the board underneath us.
fn settled<T>(outcome: Settled<T>) -> Result<T> {
    outcome
        .committed()
        .context("Board was reloaded before the change was confirmed")
}

fn column_title(engine: &BoardOrderingEngine, column_id: i64) -> Result<String> {
    Ok(engine
        .board()?
        .column(column_id)
        .map(|c| c.title.clone())
        .unwrap_or_else(|| column_id.to_string()))
}

fn print_columns(engine: &BoardOrderingEngine) -> Result<()> {
    for column in engine.board()?.columns() {
        println!("{:>2}. {} (id {})", column.order, column.title, column.id);
    }
    Ok(())
}

fn print_board(board: &BoardModel) {
    let project = board.project();
    println!(
        "{} {}",
        console::style(project.key.as_str()).bold().cyan(),
        console::style(&project.name).bold()
    );
    for column in board.columns() {
        let issues = board.issues(column.id);
        println!();
        println!(
            "{} {}",
            console::style(format!("{} [{}]", column.title, column.id)).bold(),
            console::style(format!("({})", issues.len())).dim()
        );
        for issue in issues {
            let assignee = issue
                .assignee_id
                .map(|id| format!(" @{}", id))
                .unwrap_or_default();
            println!("  #{:<5} {}{}", issue.id, issue.title, assignee);
        }
    }
}
