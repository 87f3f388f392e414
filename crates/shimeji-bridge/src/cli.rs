//! Thin HTTP client commands against a running bridge server.

use anyhow::{Context, Result};
use serde_json::json;

fn session_url(server: &str, session: &str, tail: &str) -> String {
    format!("{}/sessions/{}{}", server.trim_end_matches('/'), session, tail)
}

async fn post_json(url: &str, body: serde_json::Value) -> Result<serde_json::Value> {
    let client = reqwest::Client::new();
    let response = client
        .post(url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;
    response.json().await.context("Invalid server response")
}

pub async fn cmd_exec(
    server: &str,
    session: &str,
    command: &str,
    shell: Option<String>,
    cwd: Option<String>,
) -> Result<()> {
    let url = session_url(server, session, "/execute");
    let body = json!({ "command": command, "shell": shell, "cwd": cwd });
    let result = post_json(&url, body).await?;

    if result["ok"] == true {
        let content = result["content"].as_str().unwrap_or_default();
        if !content.is_empty() {
            println!("{}", content);
        }
        let exit_code = result["exitCode"].as_i64().unwrap_or(0);
        if exit_code != 0 {
            std::process::exit(exit_code as i32);
        }
        Ok(())
    } else {
        anyhow::bail!(
            "{}",
            result["error"].as_str().unwrap_or("command failed")
        )
    }
}

pub async fn cmd_complete(
    server: &str,
    session: &str,
    fragment: &str,
    cwd: Option<String>,
) -> Result<()> {
    let url = session_url(server, session, "/complete");
    let body = json!({ "fragment": fragment, "cwd": cwd });
    let result = post_json(&url, body).await?;

    if result["ok"] == true {
        println!("{}", result["completion"].as_str().unwrap_or_default());
        if let Some(candidates) = result["candidates"].as_array() {
            for candidate in candidates {
                if let Some(text) = candidate.as_str() {
                    println!("  {}", text);
                }
            }
        }
        Ok(())
    } else {
        anyhow::bail!(
            "{}",
            result["error"].as_str().unwrap_or("completion failed")
        )
    }
}

pub async fn cmd_close(server: &str, session: &str) -> Result<()> {
    let url = session_url(server, session, "");
    let client = reqwest::Client::new();
    let result: serde_json::Value = client
        .delete(&url)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?
        .json()
        .await
        .context("Invalid server response")?;

    if result["closed"] == true {
        println!("closed {}", session);
    } else {
        println!("no such session: {}", session);
    }
    Ok(())
}

pub async fn cmd_close_all(server: &str) -> Result<()> {
    let url = format!("{}/sessions", server.trim_end_matches('/'));
    let client = reqwest::Client::new();
    client
        .delete(&url)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?
        .error_for_status()
        .context("Server rejected close-all")?;
    println!("closed all sessions");
    Ok(())
}
