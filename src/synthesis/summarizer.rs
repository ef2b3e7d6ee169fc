// src/synthesis/summarizer.rs
// The worker's external summarization collaborator. A real implementation
// calls out to a language model; this ships the trait seam plus a
// deterministic local fallback that guarantees exactly three non-empty
// bullets, as the worker's contract requires regardless of which summarizer
// is wired in.

pub trait Summarizer: Send + Sync {
    /// Returns `(bullets, free_form_summary)`. Implementations are not
    /// required to return exactly three bullets — [`ensure_three_bullets`]
    /// normalizes whatever comes back.
    fn summarize(&self, text: &str) -> (Vec<String>, String);
}

/// Pads or truncates to exactly three non-empty bullets.
pub fn ensure_three_bullets(mut bullets: Vec<String>) -> Vec<String> {
    bullets.retain(|b| !b.trim().is_empty());
    bullets.truncate(3);
    while bullets.len() < 3 {
        bullets.push("(no further activity recorded)".to_string());
    }
    bullets
}

/// Truncate-and-split fallback: no network call, fully deterministic.
pub struct LocalFallbackSummarizer;

impl Summarizer for LocalFallbackSummarizer {
    fn summarize(&self, text: &str) -> (Vec<String>, String) {
        let bullets: Vec<String> = text
            .split(['.', '\n'])
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .take(3)
            .map(|s| s.to_string())
            .collect();

        let summary = if text.trim().is_empty() {
            "No activity recorded for this session.".to_string()
        } else {
            text.chars().take(280).collect()
        };

        (ensure_three_bullets(bullets), summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_input_to_three_bullets() {
        let summarizer = LocalFallbackSummarizer;
        let (bullets, _) = summarizer.summarize("Only one sentence here");
        assert_eq!(bullets.len(), 3);
        assert!(bullets.iter().all(|b| !b.trim().is_empty()));
    }

    #[test]
    fn truncates_long_input_to_three_bullets() {
        let summarizer = LocalFallbackSummarizer;
        let text = "First thing happened. Second thing happened. Third thing happened. Fourth thing happened.";
        let (bullets, _) = summarizer.summarize(text);
        assert_eq!(bullets.len(), 3);
    }

    #[test]
    fn empty_text_still_yields_three_bullets() {
        let (bullets, summary) = LocalFallbackSummarizer.summarize("");
        assert_eq!(bullets.len(), 3);
        assert_eq!(summary, "No activity recorded for this session.");
    }
}
