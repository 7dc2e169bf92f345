//! Thread title heuristics. A thread keeps its default title until its first
//! exchange completes, then takes its title from the first user message.

use crate::models::chat::DEFAULT_THREAD_TITLE;

const TITLE_MAX_CHARS: usize = 50;
const TITLE_TRUNCATE_AT: usize = 47;

/// First 50 characters of the message, ellipsized as `...` when truncated.
pub fn derive_thread_title(content: &str) -> String {
    let head = content
        .chars()
        .take(TITLE_MAX_CHARS)
        .collect::<String>()
        .trim()
        .to_string();

    if head.chars().count() >= TITLE_MAX_CHARS {
        let mut title: String = head.chars().take(TITLE_TRUNCATE_AT).collect();
        title.push_str("...");
        title
    } else {
        head
    }
}

/// Re-titling fires exactly once: when the thread's true total message count
/// is 2 (the first user/assistant exchange) and nobody renamed it yet. The
/// count comes from the table, not from a capped context window, so it
/// cannot drift with pagination.
pub fn should_retitle(total_messages: i64, current_title: &str) -> bool {
    total_messages == 2 && current_title == DEFAULT_THREAD_TITLE
}

/// Plain-text note appended to a user message referencing uploaded
/// attachments.
pub fn attachment_note(names: &[String]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    Some(format!("\n\n[Pièces jointes: {}]", names.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_becomes_the_title_verbatim() {
        assert_eq!(
            derive_thread_title("Bonjour, je commence ma biographie"),
            "Bonjour, je commence ma biographie"
        );
    }

    #[test]
    fn long_message_is_truncated_with_ellipsis() {
        let content = "a".repeat(80);
        let title = derive_thread_title(&content);
        assert_eq!(title.chars().count(), TITLE_TRUNCATE_AT + 3);
        assert!(title.ends_with("..."));
        assert!(title.starts_with(&"a".repeat(47)));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let content = "é".repeat(80);
        let title = derive_thread_title(&content);
        assert_eq!(title.chars().count(), TITLE_TRUNCATE_AT + 3);
    }

    #[test]
    fn retitle_only_on_the_first_exchange_with_default_title() {
        assert!(should_retitle(2, DEFAULT_THREAD_TITLE));
        assert!(!should_retitle(2, "Chapitre 1"));
        assert!(!should_retitle(4, DEFAULT_THREAD_TITLE)); // third message
        assert!(!should_retitle(1, DEFAULT_THREAD_TITLE));
    }

    #[test]
    fn attachment_note_lists_names() {
        let names = vec!["photo.jpg".to_string(), "lettre.pdf".to_string()];
        assert_eq!(
            attachment_note(&names).unwrap(),
            "\n\n[Pièces jointes: photo.jpg, lettre.pdf]"
        );
        assert!(attachment_note(&[]).is_none());
    }
}
