use crate::entity::experience_tier::ExperienceTier;
use crate::entity::issue_type::IssueType;

/// Labels that mark an issue as suitable for newcomers. Union of the
/// vocabularies used by GitHub and GitLab projects.
const EASY_LABELS: &[&str] = &[
    "easy",
    "beginner",
    "good first bug",
    "starter",
    "newbie",
    "easyfix",
    "easy-fix",
    "beginner friendly",
    "easy-pick",
    "new contributors",
    "first-timers-only",
    "contribution-starter",
    "good first issue",
    "good for beginner",
    "starter bug",
    "good-for-beginner",
    "first timers only",
    "first time contributor",
    "help-wanted",
    "help_wanted",
    "help wanted",
];

/// Characters labels are split on when no label matches as a whole.
const LABEL_DELIMITERS: &[char] = &[' ', ':', '.', ';', ',', '(', ')', '<', '>'];

fn tier_for(term: &str) -> Option<ExperienceTier> {
    let term = term.to_lowercase();
    if EASY_LABELS.contains(&term.as_str()) {
        return Some(ExperienceTier::Easy);
    }
    match term.as_str() {
        "moderate" => Some(ExperienceTier::Moderate),
        "senior" => Some(ExperienceTier::Senior),
        _ => None,
    }
}

fn type_for(term: &str) -> Option<IssueType> {
    match term.to_lowercase().as_str() {
        "enhancement" => Some(IssueType::Enhancement),
        "bug" | "bugfix" => Some(IssueType::Bugfix),
        _ => None,
    }
}

/// Split a label on the label delimiters, dropping empty pieces.
pub fn label_tokens(label: &str) -> impl Iterator<Item = &str> {
    label
        .split(|c: char| LABEL_DELIMITERS.contains(&c))
        .filter(|token| !token.is_empty())
}

/// Whole labels first, then every token of every label.
fn scan_terms(labels: &[String]) -> impl Iterator<Item = &str> {
    labels
        .iter()
        .map(String::as_str)
        .chain(labels.iter().flat_map(|label| label_tokens(label)))
}

/// Difficulty tier for a label set.
///
/// An easy-vocabulary match anywhere in the scan wins. Otherwise the first
/// explicit `moderate`/`senior` term wins. With no match at all the issue
/// defaults to [`ExperienceTier::Moderate`].
pub fn classify_difficulty(labels: &[String]) -> ExperienceTier {
    let mut first_match = None;
    for term in scan_terms(labels) {
        match tier_for(term) {
            Some(ExperienceTier::Easy) => return ExperienceTier::Easy,
            Some(tier) if first_match.is_none() => first_match = Some(tier),
            _ => {}
        }
    }
    first_match.unwrap_or_default()
}

/// Issue type for a label set; first match in scan order, `None` if nothing
/// matches.
pub fn classify_type(labels: &[String]) -> Option<IssueType> {
    scan_terms(labels).find_map(type_for)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_good_first_issue_is_easy_any_case() {
        for label in ["good first issue", "Good First Issue", "GOOD FIRST ISSUE"] {
            assert_eq!(
                classify_difficulty(&labels(&[label])),
                ExperienceTier::Easy,
                "{label}"
            );
        }
    }

    #[test]
    fn test_good_first_issue_wins_over_other_tiers() {
        let set = labels(&["senior", "moderate", "Good first issue", "bug"]);
        assert_eq!(classify_difficulty(&set), ExperienceTier::Easy);
    }

    #[test]
    fn test_unknown_labels_default_to_moderate() {
        assert_eq!(
            classify_difficulty(&labels(&["wontfix", "question", "area/docs"])),
            ExperienceTier::Moderate
        );
        assert_eq!(classify_difficulty(&[]), ExperienceTier::Moderate);
    }

    #[test]
    fn test_explicit_senior() {
        assert_eq!(
            classify_difficulty(&labels(&["Senior"])),
            ExperienceTier::Senior
        );
    }

    #[test]
    fn test_tokenized_label_matches() {
        assert_eq!(
            classify_difficulty(&labels(&["difficulty: senior"])),
            ExperienceTier::Senior
        );
        assert_eq!(
            classify_difficulty(&labels(&["level(easy)"])),
            ExperienceTier::Easy
        );
        assert_eq!(
            classify_difficulty(&labels(&["exp<beginner>"])),
            ExperienceTier::Easy
        );
    }

    #[test]
    fn test_whole_label_checked_before_tokens() {
        // "moderate" appears as a token of the first label, "senior" as a
        // whole second label; whole labels are scanned first.
        let set = labels(&["level: moderate", "senior"]);
        assert_eq!(classify_difficulty(&set), ExperienceTier::Senior);
    }

    #[test]
    fn test_classify_type() {
        assert_eq!(
            classify_type(&labels(&["Enhancement"])),
            Some(IssueType::Enhancement)
        );
        assert_eq!(classify_type(&labels(&["bug"])), Some(IssueType::Bugfix));
        assert_eq!(
            classify_type(&labels(&["type: bugfix"])),
            Some(IssueType::Bugfix)
        );
        assert_eq!(classify_type(&labels(&["documentation"])), None);
    }

    #[test]
    fn test_classify_type_first_match_wins() {
        let set = labels(&["bug", "enhancement"]);
        assert_eq!(classify_type(&set), Some(IssueType::Bugfix));
    }

    #[test]
    fn test_label_tokens_skips_empty() {
        let tokens: Vec<_> = label_tokens("a::b (c)").collect();
        assert_eq!(tokens, vec!["a", "b", "c"]);
    }
}
