//! Reading-time estimate for a post body

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use super::Section;

/// Reading rate used when none is configured
pub const DEFAULT_WORDS_PER_MINUTE: usize = 150;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"\S+").unwrap();
}

/// Whole minutes needed to read a post, never less than one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingTime {
    pub words: usize,
    pub minutes: usize,
}

impl fmt::Display for ReadingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.minutes)
    }
}

/// Count whitespace-delimited tokens in a piece of text
///
/// Empty or whitespace-only text counts as zero.
pub fn count_words(text: &str) -> usize {
    WORD.find_iter(text).count()
}

/// Count the words across every body block of every section
///
/// Blocks without text (images, embeds) contribute nothing.
pub fn count_body_words(sections: &[Section]) -> usize {
    sections
        .iter()
        .flat_map(|s| s.body.iter())
        .filter_map(|block| block.text.as_deref())
        .map(count_words)
        .sum()
}

/// Estimate the reading time of a body
///
/// Up to one minute's worth of words reads as "1 min"; beyond that every
/// started minute counts.
pub fn estimate(sections: &[Section], words_per_minute: usize) -> ReadingTime {
    let words = count_body_words(sections);
    ReadingTime {
        words,
        minutes: minutes_for(words, words_per_minute),
    }
}

fn minutes_for(words: usize, words_per_minute: usize) -> usize {
    let rate = if words_per_minute == 0 {
        DEFAULT_WORDS_PER_MINUTE
    } else {
        words_per_minute
    };

    if words <= rate {
        1
    } else {
        words.div_ceil(rate)
    }
}
