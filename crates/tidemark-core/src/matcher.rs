//! Page path normalization and wildcard matching for funnel steps.

/// Canonical form of a page URL: path only, no query or fragment, no trailing
/// slash (except the root), lowercased.
pub fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let path = match url::Url::parse(trimmed) {
        Ok(parsed) if parsed.has_host() => parsed.path().to_string(),
        _ => {
            let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
            without_fragment
                .split('?')
                .next()
                .unwrap_or(without_fragment)
                .trim()
                .to_string()
        }
    };

    let mut normalized = path;
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    if normalized.is_empty() {
        "/".to_string()
    } else {
        normalized.to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`: exactly one segment.
    One,
    /// `**`: zero or more segments.
    Rest,
}

/// A compiled page pattern such as `/blog/*` or `/docs/**`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        let normalized = normalize_path(pattern);
        let mut segments: Vec<Segment> = Vec::new();
        for part in split_segments(&normalized) {
            let segment = match part {
                "*" => Segment::One,
                "**" => Segment::Rest,
                literal => Segment::Literal(literal.to_string()),
            };
            // `**/**` matches exactly what `**` does.
            if segment == Segment::Rest && segments.last() == Some(&Segment::Rest) {
                continue;
            }
            segments.push(segment);
        }
        Self { segments }
    }

    pub fn has_wildcards(&self) -> bool {
        self.segments
            .iter()
            .any(|s| !matches!(s, Segment::Literal(_)))
    }

    /// Matches a raw page URL; the URL is normalized first.
    pub fn matches(&self, url: &str) -> bool {
        let normalized = normalize_path(url);
        if normalized.is_empty() {
            return false;
        }
        let parts = split_segments(&normalized);
        match_segments(&self.segments, &parts)
    }
}

/// Glob match in `O(pattern × parts)`. `reachable[j]` holds when the pattern
/// consumed so far matches exactly `parts[..j]`.
fn match_segments(pattern: &[Segment], parts: &[&str]) -> bool {
    let mut reachable = vec![false; parts.len() + 1];
    reachable[0] = true;

    for segment in pattern {
        let mut next = vec![false; parts.len() + 1];
        match segment {
            Segment::Rest => {
                let mut seen = false;
                for (j, slot) in next.iter_mut().enumerate() {
                    seen |= reachable[j];
                    *slot = seen;
                }
            }
            Segment::One => {
                for j in 1..=parts.len() {
                    next[j] = reachable[j - 1];
                }
            }
            Segment::Literal(lit) => {
                for j in 1..=parts.len() {
                    next[j] = reachable[j - 1] && parts[j - 1] == lit.as_str();
                }
            }
        }
        if !next.iter().any(|&r| r) {
            return false;
        }
        reachable = next;
    }
    reachable[parts.len()]
}
