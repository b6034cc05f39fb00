//! User directory commands: add, list.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use parley_types::identity::UserRecord;

use crate::state::AppState;

pub async fn add_user(state: &AppState, username: &str, json: bool) -> Result<()> {
    let username = username.trim();
    if username.is_empty() {
        anyhow::bail!("username must not be empty");
    }
    let user = state
        .users()
        .create_user(username)
        .await
        .with_context(|| format!("failed to create user '{username}'"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        println!(
            "  {} User '{}' created ({})",
            style("✓").green().bold(),
            style(&user.username).bold(),
            style(&user.id).dim()
        );
    }
    Ok(())
}

pub async fn list_users(state: &AppState, json: bool) -> Result<()> {
    let users = state.users().list_users().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
        return Ok(());
    }

    if users.is_empty() {
        println!();
        println!(
            "  {} No users yet. Add one with: {}",
            style("i").blue().bold(),
            style("parley user add <username>").yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("{}", user_table(&users));
    println!();
    println!(
        "  {} user{}",
        style(users.len()).bold(),
        if users.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

/// Resolve a username to its directory record.
pub async fn require_user(state: &AppState, username: &str) -> Result<UserRecord> {
    state
        .users()
        .find_by_username(username)
        .await?
        .with_context(|| format!("no user named '{username}'"))
}

fn user_table(users: &[UserRecord]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Username").fg(Color::White),
        Cell::new("ID").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);
    for user in users {
        table.add_row(vec![
            Cell::new(&user.username).fg(Color::Cyan),
            Cell::new(user.id.as_str()),
            Cell::new(user.created_at.format("%Y-%m-%d").to_string()).fg(Color::DarkGrey),
        ]);
    }
    table
}
