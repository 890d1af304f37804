//! Forge mirror-list handling for libraries with the `forge-pack-xz` hint.
//! Each such library is fetched by trying every advertised mirror base in
//! order inside the stage's batched job.

use super::download::fetch_text;
use reqwest::Client;

/// Parse a mirror list document. Each non-empty line advertises one mirror;
/// the download base URL is the last `!`-separated field (the leading fields
/// carry branding). Lines without a usable URL are skipped.
pub fn parse_mirror_list(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let candidate = line.rsplit('!').next().unwrap_or(line).trim();
            if !candidate.starts_with("http") {
                return None;
            }
            let mut base = candidate.to_string();
            if !base.ends_with('/') {
                base.push('/');
            }
            Some(base)
        })
        .collect()
}

/// Fetch the mirror list, falling back to the given base when the list is
/// unreachable or empty. Never fails; the worst case is a single-mirror set.
pub async fn mirror_bases(client: &Client, list_url: &str, fallback_base: &str) -> Vec<String> {
    match fetch_text(client, list_url).await {
        Ok(text) => {
            let mirrors = parse_mirror_list(&text);
            if mirrors.is_empty() {
                log::warn!("mirror list at {} was empty, using the default base", list_url);
                vec![fallback_base.to_string()]
            } else {
                log::debug!("using {} forge mirrors", mirrors.len());
                mirrors
            }
        }
        Err(e) => {
            log::warn!("failed to fetch the forge mirror list: {:#}", e);
            vec![fallback_base.to_string()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_branded_lines_and_bare_urls() {
        let text = "\
Forge!https://example.org/logo.png!https://example.org!https://mirror.example.org/maven
https://files.example.net/maven/

not-a-url
";
        let mirrors = parse_mirror_list(text);
        assert_eq!(
            mirrors,
            vec![
                "https://mirror.example.org/maven/".to_string(),
                "https://files.example.net/maven/".to_string(),
            ]
        );
    }
}
