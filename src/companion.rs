//! Token lookup in the companion playlist plugin's configuration
//!
//! The playlist generator keeps provider playlist URLs in square brackets inside
//! its `config.xml`; the bcumedia playlist file name is the account token.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

const CONFIG_FILE: &str = "config.xml";

static BCUMEDIA_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(https://bcumedia\.pro.+?)\]").expect("valid regex"));

/// Read the bcumedia token; missing file or no match just means no token
pub fn bcumedia_token(config_dir: &Path) -> Option<String> {
    let path = config_dir.join(CONFIG_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "companion config not readable");
            return None;
        }
    };
    token_from_config(&content)
}

fn token_from_config(content: &str) -> Option<String> {
    let url = BCUMEDIA_URL.captures(content)?.get(1)?.as_str();
    let file_name = url.rsplit('/').next()?;
    // Only the last extension goes
    let token = match file_name.rfind('.') {
        Some(pos) if pos > 0 => &file_name[..pos],
        _ => file_name,
    };
    (!token.is_empty()).then(|| token.to_string())
}
