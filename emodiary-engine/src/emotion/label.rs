//! Emotion label table and score types

use serde::{Serialize, Serializer};

/// Number of emotion classes produced by the classifier head
pub const NUM_CLASSES: usize = 7;

/// Emotion classes in the classifier's canonical output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Anger,
    Sadness,
    Anxiety,
    Happiness,
    Disgust,
    /// Surprise / embarrassment (당황)
    Embarrassment,
    Neutral,
}

impl Emotion {
    /// All classes, indexed by classifier output position
    pub const ALL: [Emotion; NUM_CLASSES] = [
        Emotion::Anger,
        Emotion::Sadness,
        Emotion::Anxiety,
        Emotion::Happiness,
        Emotion::Disgust,
        Emotion::Embarrassment,
        Emotion::Neutral,
    ];

    pub fn from_index(index: usize) -> Option<Emotion> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Korean label, as returned in response payloads
    pub fn label(self) -> &'static str {
        match self {
            Emotion::Anger => "분노",
            Emotion::Sadness => "슬픔",
            Emotion::Anxiety => "불안",
            Emotion::Happiness => "행복",
            Emotion::Disgust => "혐오",
            Emotion::Embarrassment => "당황",
            Emotion::Neutral => "중립",
        }
    }

    /// English identifier
    pub fn name(self) -> &'static str {
        match self {
            Emotion::Anger => "anger",
            Emotion::Sadness => "sadness",
            Emotion::Anxiety => "anxiety",
            Emotion::Happiness => "happiness",
            Emotion::Disgust => "disgust",
            Emotion::Embarrassment => "embarrassment",
            Emotion::Neutral => "neutral",
        }
    }

    /// Parse either the Korean label or the English identifier.
    pub fn parse(s: &str) -> Option<Emotion> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|e| e.label() == s || e.name().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Emotion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Softmax probabilities, one per emotion class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScores([f64; NUM_CLASSES]);

impl ClassScores {
    /// Numerically stable softmax over exactly [`NUM_CLASSES`] logits.
    pub fn from_logits(logits: &[f32; NUM_CLASSES]) -> Self {
        let max = logits
            .iter()
            .map(|&x| x as f64)
            .fold(f64::NEG_INFINITY, f64::max);
        let mut probs = [0.0f64; NUM_CLASSES];
        for (p, &x) in probs.iter_mut().zip(logits) {
            *p = (x as f64 - max).exp();
        }
        let sum: f64 = probs.iter().sum();
        for p in &mut probs {
            *p /= sum;
        }
        Self(probs)
    }

    pub fn get(&self, emotion: Emotion) -> f64 {
        self.0[emotion.index()]
    }

    pub fn as_array(&self) -> &[f64; NUM_CLASSES] {
        &self.0
    }

    /// `(emotion, probability)` pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        Emotion::ALL.into_iter().zip(self.0.iter().copied())
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

impl Serialize for ClassScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(NUM_CLASSES))?;
        for (emotion, p) in self.iter() {
            map.serialize_entry(emotion.label(), &p)?;
        }
        map.end()
    }
}

/// Arg-max of raw logits. Ties resolve to the lowest index.
pub fn argmax(logits: &[f32; NUM_CLASSES]) -> Emotion {
    let mut best = 0;
    for (i, &x) in logits.iter().enumerate().skip(1) {
        if x > logits[best] {
            best = i;
        }
    }
    Emotion::ALL[best]
}

/// Classification output for one diary text
#[derive(Debug, Clone, Serialize)]
pub struct EmotionResult {
    pub emotion: Emotion,
    /// Softmax probability of `emotion`, as a percentage in [0, 100]
    pub confidence: f64,
    pub probabilities: ClassScores,
}

impl EmotionResult {
    /// Apply the decision rule to raw classifier logits.
    pub fn from_logits(logits: &[f32; NUM_CLASSES]) -> Self {
        let emotion = argmax(logits);
        let probabilities = ClassScores::from_logits(logits);
        Self {
            emotion,
            confidence: probabilities.get(emotion) * 100.0,
            probabilities,
        }
    }
}
