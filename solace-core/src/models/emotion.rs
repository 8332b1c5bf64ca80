use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fixed emotion vocabulary. Every distribution reports all ten keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Anxious,
    Angry,
    Content,
    Stressed,
    Excited,
    Frustrated,
    Hopeful,
    Lonely,
}

impl Emotion {
    pub const ALL: [Emotion; 10] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Anxious,
        Emotion::Angry,
        Emotion::Content,
        Emotion::Stressed,
        Emotion::Excited,
        Emotion::Frustrated,
        Emotion::Hopeful,
        Emotion::Lonely,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Anxious => "anxious",
            Emotion::Angry => "angry",
            Emotion::Content => "content",
            Emotion::Stressed => "stressed",
            Emotion::Excited => "excited",
            Emotion::Frustrated => "frustrated",
            Emotion::Hopeful => "hopeful",
            Emotion::Lonely => "lonely",
        }
    }
}

pub type EmotionDistribution = BTreeMap<Emotion, f64>;

/// Distribution reported when no emotion keyword was seen.
pub fn default_distribution() -> EmotionDistribution {
    Emotion::ALL
        .iter()
        .map(|e| {
            let share = match e {
                Emotion::Content => 0.50,
                Emotion::Happy => 0.10,
                _ => 0.05,
            };
            (*e, share)
        })
        .collect()
}

/// All ten categories at zero.
pub fn zero_distribution() -> EmotionDistribution {
    Emotion::ALL.iter().map(|e| (*e, 0.0)).collect()
}

/// Round every share to three decimals and push the rounding residual into
/// the largest share so the total is exactly one. Ties go to the category
/// listed first in [`Emotion::ALL`]. An all-zero distribution is left alone.
pub fn normalize_distribution(distribution: &mut EmotionDistribution) {
    let mut thousandths: Vec<(Emotion, i64)> = Emotion::ALL
        .iter()
        .map(|e| {
            let share = distribution.get(e).copied().unwrap_or(0.0).max(0.0);
            (*e, (share * 1000.0).round() as i64)
        })
        .collect();

    let total: i64 = thousandths.iter().map(|(_, t)| t).sum();
    if total == 0 {
        for e in Emotion::ALL {
            distribution.entry(e).or_insert(0.0);
        }
        return;
    }

    let residual = 1000 - total;
    if residual != 0 {
        let mut largest = 0;
        for (i, (_, t)) in thousandths.iter().enumerate() {
            if *t > thousandths[largest].1 {
                largest = i;
            }
        }
        thousandths[largest].1 += residual;
    }

    for (emotion, t) in thousandths {
        distribution.insert(emotion, t as f64 / 1000.0);
    }
}

/// Fill in missing categories and, when the shares do not already sum to one,
/// add the residual to the largest share (first in [`Emotion::ALL`] on ties).
/// Shares are not rounded. An all-zero distribution is left alone.
pub fn renormalize_distribution(distribution: &mut EmotionDistribution) {
    for e in Emotion::ALL {
        distribution.entry(e).or_insert(0.0);
    }

    let total: f64 = distribution.values().sum();
    let residual = 1.0 - total;
    if total <= 0.0 || residual.abs() < 1e-9 {
        return;
    }

    let largest = dominant(distribution);
    if let Some(share) = distribution.get_mut(&largest) {
        *share += residual;
    }
}

/// Message counts behind an [`EmotionProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MessageAnalysis {
    pub total_messages: usize,
    pub user_messages: usize,
    pub analyzable_messages: usize,
    pub avg_message_length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionProfile {
    pub emotion_percentages: EmotionDistribution,
    pub avg_intensity: f64,
    pub message_analysis: MessageAnalysis,
}

impl EmotionProfile {
    /// Category with the largest share; first in vocabulary order on ties.
    pub fn dominant_emotion(&self) -> Emotion {
        dominant(&self.emotion_percentages)
    }
}

pub fn dominant(distribution: &EmotionDistribution) -> Emotion {
    let mut best = Emotion::ALL[0];
    let mut best_share = f64::MIN;
    for e in Emotion::ALL {
        let share = distribution.get(&e).copied().unwrap_or(0.0);
        if share > best_share {
            best = e;
            best_share = share;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(d: &EmotionDistribution) -> f64 {
        d.values().sum()
    }

    #[test]
    fn test_default_distribution_sums_to_one() {
        let d = default_distribution();
        assert_eq!(d.len(), 10);
        assert!((sum(&d) - 1.0).abs() < 1e-9);
        assert_eq!(d[&Emotion::Content], 0.50);
        assert_eq!(d[&Emotion::Happy], 0.10);
        assert_eq!(d[&Emotion::Lonely], 0.05);
    }

    #[test]
    fn test_normalize_pushes_residual_into_largest() {
        // Thirds round to 0.333 each, leaving 0.001 for the largest (first) share.
        let mut d = zero_distribution();
        d.insert(Emotion::Sad, 1.0 / 3.0);
        d.insert(Emotion::Anxious, 1.0 / 3.0);
        d.insert(Emotion::Stressed, 1.0 / 3.0);
        normalize_distribution(&mut d);

        assert!((sum(&d) - 1.0).abs() < 1e-9);
        assert_eq!(d[&Emotion::Sad], 0.334);
        assert_eq!(d[&Emotion::Anxious], 0.333);
        assert_eq!(d[&Emotion::Stressed], 0.333);
    }

    #[test]
    fn test_renormalize_keeps_precision() {
        let mut d = zero_distribution();
        d.insert(Emotion::Sad, 0.5835);
        d.insert(Emotion::Anxious, 0.1665);
        d.insert(Emotion::Happy, 0.25);
        renormalize_distribution(&mut d);
        assert!((d[&Emotion::Sad] - 0.5835).abs() < 1e-12);
        assert!((d[&Emotion::Anxious] - 0.1665).abs() < 1e-12);

        // Short by 0.1: the whole residual lands on the largest share.
        let mut d = zero_distribution();
        d.insert(Emotion::Angry, 0.6);
        d.insert(Emotion::Lonely, 0.3);
        renormalize_distribution(&mut d);
        assert!((d[&Emotion::Angry] - 0.7).abs() < 1e-12);
        assert!((d[&Emotion::Lonely] - 0.3).abs() < 1e-12);

        let mut d = EmotionDistribution::new();
        renormalize_distribution(&mut d);
        assert_eq!(d.len(), 10);
        assert_eq!(sum(&d), 0.0);
    }

    #[test]
    fn test_normalize_leaves_zero_distribution() {
        let mut d = EmotionDistribution::new();
        normalize_distribution(&mut d);
        assert_eq!(d.len(), 10);
        assert_eq!(sum(&d), 0.0);
    }

    #[test]
    fn test_emotion_keys_serialize_as_names() {
        let value = serde_json::to_value(default_distribution()).unwrap();
        assert_eq!(value["content"], 0.5);
        assert_eq!(value.as_object().unwrap().len(), 10);
    }

    #[test]
    fn test_dominant_prefers_first_on_tie() {
        let mut d = zero_distribution();
        d.insert(Emotion::Angry, 0.5);
        d.insert(Emotion::Sad, 0.5);
        assert_eq!(dominant(&d), Emotion::Sad);
        assert_eq!(dominant(&default_distribution()), Emotion::Content);
    }
}
