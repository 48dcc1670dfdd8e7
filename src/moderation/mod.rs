//! Keyword flagging of comments.

use crate::youtube::CommentThread;
use serde::Serialize;

/// Comment as returned to the front end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub comment_id: String,
    pub text: String,
    pub author: String,
    /// True when the text contains one of the requested keywords
    pub spam: bool,
}

/// Case-insensitive substring matcher over a keyword list.
pub struct KeywordMatcher {
    keywords: Vec<String>,
}

impl KeywordMatcher {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// True iff some keyword occurs in `text`. An empty list never matches.
    pub fn matches(&self, text: &str) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        let text = text.to_lowercase();
        self.keywords.iter().any(|keyword| text.contains(keyword.as_str()))
    }
}

/// Flag a single text against a keyword list.
pub fn is_flagged(text: &str, keywords: &[String]) -> bool {
    KeywordMatcher::new(keywords).matches(text)
}

/// Convert a page of comment threads into flagged records, keeping the
/// provider's order.
pub fn annotate(threads: &[CommentThread], keywords: &[String]) -> Vec<CommentRecord> {
    let matcher = KeywordMatcher::new(keywords);

    threads
        .iter()
        .map(|thread| {
            let comment = &thread.snippet.top_level_comment.snippet;
            CommentRecord {
                comment_id: thread.id.clone(),
                text: comment.text_display.clone(),
                author: comment.author_display_name.clone(),
                spam: matcher.matches(&comment.text_display),
            }
        })
        .collect()
}
