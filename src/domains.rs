use anyhow::{anyhow, Result};

/// Return the built-in list of popular domains to query.
pub fn default_domains() -> Vec<String> {
	vec![
		"google.com",
		"youtube.com",
		"facebook.com",
		"apple.com",
		"microsoft.com",
		"cloudflare.com",
		"amazon.com",
		"github.com",
		"wikipedia.org",
		"archlinux.org",
	].into_iter().map(String::from).collect()
}

/// Read domains from a file, one per line.
///
/// Blank lines and lines starting with '#' are skipped.
pub fn read_domain_file(path: &str) -> Result<Vec<String>> {
	let content = std::fs::read_to_string(path)
		.map_err(|e| anyhow!("failed to read domain file '{}': {}", path, e))?;
	Ok(parse_domain_lines(&content))
}

fn parse_domain_lines(content: &str) -> Vec<String> {
	content.lines()
		.map(|line| line.trim().to_string())
		.filter(|line| !line.is_empty() && !line.starts_with('#'))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_domains() {
		let domains = default_domains();
		assert_eq!(domains.len(), 10);
		assert!(domains.iter().all(|d| d.contains('.')));
	}

	#[test]
	fn test_parse_lines() {
		let domains = parse_domain_lines("# list\nexample.com\n\n  example.org \n#skip.me\n");
		assert_eq!(domains, ["example.com", "example.org"]);
	}

	#[test]
	fn test_comment_only_file_is_empty() {
		assert!(parse_domain_lines("# nothing here\n\n").is_empty());
	}
}
