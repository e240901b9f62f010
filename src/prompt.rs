use crate::error::GenerationError;
use regex::Regex;
use std::sync::LazyLock;

static HASHTAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#[A-Za-z0-9_]+").unwrap_or_else(|e| panic!("invalid hashtag pattern: {e}"))
});

/// Build the post instruction. The style clause is left out entirely when no
/// style is selected.
pub fn build_text_prompt(topic: &str, style: &str) -> Result<String, GenerationError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(GenerationError::EmptyTopic);
    }

    let style = style.trim();
    let style_clause = if style.is_empty() {
        String::new()
    } else {
        format!("{} ", style)
    };

    Ok(format!(
        "Write a {}LinkedIn Post about the Snowflake data platform feature {}: \
         include the hashtags datasuperhero and masteringsnowflake",
        style_clause, topic
    ))
}

/// Build the instruction asking the model to describe an image for a post.
/// Hashtags are stripped from the post first.
pub fn build_image_prompt(post_text: &str) -> String {
    let without_hashtags = strip_hashtags(post_text);
    format!(
        "In less than 300 words create a detailed but brief description of an image that captures \
         the essence of the following text:\n{}\n\n",
        without_hashtags
    )
}

pub fn strip_hashtags(text: &str) -> String {
    HASHTAG.replace_all(text, "").into_owned()
}

/// Tidy a completion into post text.
pub fn clean_post(reply: &str) -> String {
    reply.trim().replace('"', "")
}

/// Reduce an image description to its first sentence.
pub fn first_sentence(reply: &str) -> String {
    let cleaned = clean_post(reply);
    let head = cleaned.split('.').next().unwrap_or_default();
    format!("{}.", head)
}
