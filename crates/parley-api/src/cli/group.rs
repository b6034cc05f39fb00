//! Group directory commands: add, list, member-add, member-remove.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use parley_types::ids::GroupId;

use crate::cli::GroupCommand;
use crate::cli::user::require_user;
use crate::state::AppState;

pub async fn handle_group_command(cmd: GroupCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        GroupCommand::Add { name } => {
            let group = state
                .groups
                .create_group(name.trim())
                .await
                .with_context(|| format!("failed to create group '{name}'"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&group)?);
            } else {
                println!(
                    "  {} Group '{}' created ({})",
                    style("✓").green().bold(),
                    style(&group.name).bold(),
                    style(&group.id).dim()
                );
            }
        }

        GroupCommand::List => list_groups(state, json).await?,

        GroupCommand::MemberAdd { group, username } => {
            let user = require_user(state, &username).await?;
            let group_id = GroupId::new(group.as_str());
            state
                .groups
                .add_member(&group_id, &user.id)
                .await
                .with_context(|| format!("failed to add '{username}' to group {group_id}"))?;
            if json {
                println!("{}", serde_json::json!({"group": group_id, "added": user.id}));
            } else {
                println!(
                    "  {} '{}' is now a member of {}",
                    style("✓").green().bold(),
                    style(&username).bold(),
                    style(&group_id).cyan()
                );
                println!(
                    "  {}",
                    style("Connected clients pick this up on reload_groups").dim()
                );
            }
        }

        GroupCommand::MemberRemove { group, username } => {
            let user = require_user(state, &username).await?;
            let group_id = GroupId::new(group.as_str());
            let removed = state.groups.remove_member(&group_id, &user.id).await?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({"group": group_id, "user": user.id, "removed": removed})
                );
            } else if removed {
                println!(
                    "  {} '{}' removed from {}",
                    style("✓").green().bold(),
                    style(&username).bold(),
                    style(&group_id).cyan()
                );
            } else {
                println!(
                    "  {} '{}' was not a member of {}",
                    style("i").blue().bold(),
                    style(&username).bold(),
                    style(&group_id).cyan()
                );
            }
        }
    }
    Ok(())
}

async fn list_groups(state: &AppState, json: bool) -> Result<()> {
    let groups = state.groups.list_groups().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    if groups.is_empty() {
        println!();
        println!(
            "  {} No groups yet. Create one with: {}",
            style("i").blue().bold(),
            style("parley group add <name>").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("ID").fg(Color::White),
        Cell::new("Members").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);
    for group in &groups {
        table.add_row(vec![
            Cell::new(&group.name).fg(Color::Cyan),
            Cell::new(group.id.as_str()),
            Cell::new(group.member_count),
            Cell::new(group.created_at.format("%Y-%m-%d").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}
