//! Development credential issuance.

use anyhow::Result;
use console::style;

use crate::cli::user::require_user;
use crate::state::AppState;

/// Mint a bearer token for `username`, valid for `token_ttl_secs`.
pub async fn issue_token(state: &AppState, username: &str, json: bool) -> Result<()> {
    let user = require_user(state, username).await?;
    let token = state.identity.issue(&user)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "userId": user.id,
                "username": user.username,
                "token": token,
                "expiresIn": state.config.token_ttl_secs,
            })
        );
    } else {
        println!();
        println!(
            "  {} Token for '{}' (valid {}s):",
            style("🔑").bold(),
            style(&user.username).cyan(),
            state.config.token_ttl_secs
        );
        println!();
        println!("  {}", style(&token).yellow().bold());
        println!();
    }
    Ok(())
}
