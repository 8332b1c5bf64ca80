//! Lexical emotion scorer
//!
//! Maps a message list to an emotion distribution and an average intensity
//! using fixed English keyword sets. Pure and deterministic: no I/O, no model.
//!
//! Intensity per analyzable user message:
//!   5.0 base, +1.0 for `!`, +0.5 for `?`, +1.0 for an intensifier word,
//!   +0.5 for text longer than 100 characters, capped at 10.0.
//!
//! Emotion detection is substring-based and case-insensitive; one message can
//! count towards several categories.

use std::collections::BTreeMap;

use crate::models::emotion::{default_distribution, normalize_distribution, EmotionDistribution};
use crate::models::{Emotion, EmotionProfile, Message, MessageAnalysis};

pub const BASE_INTENSITY: f64 = 5.0;
pub const MAX_INTENSITY: f64 = 10.0;

const LONG_MESSAGE_CHARS: usize = 100;

const INTENSIFIERS: &[&str] = &[
    "very",
    "really",
    "extremely",
    "so",
    "totally",
    "absolutely",
    "completely",
    "incredibly",
    "super",
    "deeply",
    "utterly",
];

/// Keyword set for one emotion category.
pub fn keywords(emotion: Emotion) -> &'static [&'static str] {
    match emotion {
        Emotion::Happy => &["happy", "glad", "joy", "great", "wonderful", "delighted", "cheerful", "smile"],
        Emotion::Sad => &["sad", "down", "depressed", "unhappy", "cry", "crying", "miserable", "grief", "hopeless"],
        Emotion::Anxious => &["anxious", "anxiety", "worried", "worry", "nervous", "panic", "afraid", "scared", "fear"],
        Emotion::Angry => &["angry", "mad", "furious", "rage", "hate", "resent", "irritated"],
        Emotion::Content => &["content", "calm", "peaceful", "relaxed", "okay", "fine", "at ease", "settled"],
        Emotion::Stressed => &["stress", "stressed", "pressure", "overwhelmed", "burnout", "exhausted", "deadline", "tense"],
        Emotion::Excited => &["excited", "thrilled", "can't wait", "eager", "pumped", "looking forward"],
        Emotion::Frustrated => &["frustrated", "frustrating", "annoyed", "stuck", "fed up", "annoying"],
        Emotion::Hopeful => &["hope", "hopeful", "optimistic", "better", "improve", "progress", "looking up"],
        Emotion::Lonely => &["lonely", "alone", "isolated", "left out", "nobody", "no one"],
    }
}

/// Intensity of a single message. Blank text scores the base value.
pub fn message_intensity(text: &str) -> f64 {
    let mut intensity = BASE_INTENSITY;
    if text.contains('!') {
        intensity += 1.0;
    }
    if text.contains('?') {
        intensity += 0.5;
    }
    if has_intensifier(text) {
        intensity += 1.0;
    }
    if text.chars().count() > LONG_MESSAGE_CHARS {
        intensity += 0.5;
    }
    intensity.min(MAX_INTENSITY)
}

fn has_intensifier(text: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .any(|w| INTENSIFIERS.contains(&w.to_lowercase().as_str()))
}

/// Categories whose keywords appear in the text.
pub fn detect_emotions(text: &str) -> Vec<Emotion> {
    let lower = text.to_lowercase();
    Emotion::ALL
        .iter()
        .copied()
        .filter(|e| keywords(*e).iter().any(|k| lower.contains(k)))
        .collect()
}

/// Score a message list. Only `user` messages with non-blank text count.
pub fn score(messages: &[Message]) -> EmotionProfile {
    let user_messages: Vec<&Message> = messages.iter().filter(|m| m.is_user()).collect();

    let mut counts: BTreeMap<Emotion, usize> = Emotion::ALL.iter().map(|e| (*e, 0)).collect();
    let mut intensities = Vec::new();
    let mut total_length = 0usize;

    for message in &user_messages {
        let text = message.text.trim();
        if text.is_empty() {
            continue;
        }
        intensities.push(message_intensity(text));
        total_length += text.chars().count();
        for emotion in detect_emotions(text) {
            *counts.entry(emotion).or_insert(0) += 1;
        }
    }

    let analyzable = intensities.len();
    let avg_intensity = if analyzable == 0 {
        BASE_INTENSITY
    } else {
        intensities.iter().sum::<f64>() / analyzable as f64
    };

    EmotionProfile {
        emotion_percentages: to_distribution(&counts),
        avg_intensity,
        message_analysis: MessageAnalysis {
            total_messages: messages.len(),
            user_messages: user_messages.len(),
            analyzable_messages: analyzable,
            avg_message_length: if analyzable == 0 {
                0.0
            } else {
                total_length as f64 / analyzable as f64
            },
        },
    }
}

fn to_distribution(counts: &BTreeMap<Emotion, usize>) -> EmotionDistribution {
    let total: usize = counts.values().sum();
    if total == 0 {
        return default_distribution();
    }

    let mut distribution: EmotionDistribution = Emotion::ALL
        .iter()
        .map(|e| (*e, counts.get(e).copied().unwrap_or(0) as f64 / total as f64))
        .collect();
    normalize_distribution(&mut distribution);
    distribution
}

// ============================================================================
// TESTS
// ============================================================================
