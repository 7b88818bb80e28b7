//! Rule-based responder, the last-resort backend.
//!
//! Each rule pairs a pattern with a canned reply. A rule scores 1.0 when
//! its pattern occurs in the input (case-insensitively) and otherwise half
//! the fraction of its characters found anywhere in the input; the score is
//! then weighted by the rule's priority. The best rule answers if it beats
//! [`MATCH_THRESHOLD`], else a random generic acknowledgement is returned.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A best score must exceed this to use the rule's reply.
pub const MATCH_THRESHOLD: f32 = 0.3;

/// Replies used when no rule matches well enough.
pub const DEFAULT_ACKNOWLEDGEMENTS: [&str; 5] = [
    "ふむふむ、なるほどね! 😊",
    "へー、それで? 🤔",
    "わかったよ! ✨",
    "そうなんだ! 面白いね! 🌟",
    "もっと教えて! 👂",
];

const DEFAULT_RULES: &[(&str, &str)] = &[
    // greetings
    ("こんにちは", "やっほー! 元気だよ! 🎀"),
    ("おはよう", "おはよー! いい朝だね! ☀️"),
    ("こんばんは", "こんばんは! 今日はどうだった? 🌙"),
    ("hello", "Hello! Nice to meet you! 👋"),
    // feelings
    ("元気", "うん! とっても元気だよ! ✨"),
    ("嬉しい", "わーい! 一緒に嬉しいよ! 💕"),
    ("悲しい", "大丈夫だよ! そばにいるからね 🤗"),
    ("疲れ", "お疲れ様! ゆっくり休んでね 😊"),
    // questions
    ("名前", "ぼくはカビちゃんだよ! 🌸"),
    ("誰", "かわいいキャラクターだよ! ピンク色なの! 💗"),
    ("何", "楽しくおしゃべりするのが好きなんだ! 🎵"),
    ("どこ", "この画面の中にいるよ! 👀"),
    // likes
    ("好き", "わーい! ぼくも大好きだよ! 💖"),
    ("嫌い", "そっか... でも仲良くしてね 😢"),
    ("かわいい", "えへへ、ありがとう! (*´▽`*) 💗"),
    ("すごい", "そんなことないよー! 照れちゃう! ☺️"),
    // actions
    ("遊", "遊ぼう遊ぼう! 何して遊ぶ? 🎮"),
    ("歌", "らんらんらーん♪ どう? 🎤"),
    ("踊", "くるくる~♪ 一緒に踊ろう! 💃"),
    ("食べ", "おいしいもの大好き! 何食べる? 🍰"),
    // thanks and apologies
    ("ありがとう", "どういたしまして! 💕"),
    ("ごめん", "気にしないで! 大丈夫だよ! 😊"),
    ("すみません", "いいのいいの! 気にしないでね! ✨"),
    // farewells
    ("さようなら", "またね! バイバイ! 👋✨"),
    ("バイバイ", "またねー! 楽しかったよ! 💖"),
    ("おやすみ", "おやすみー! いい夢見てね! 🌟"),
    // weather
    ("天気", "いい天気だといいね! ☀️"),
    ("雨", "雨かぁ... でも雨も好きだよ! ☔"),
    // misc
    ("時間", "今を楽しもう! ⏰"),
];

/// One pattern/reply pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub pattern: String,
    pub response: String,
    pub priority: f32,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, response: impl Into<String>, priority: f32) -> Self {
        Self {
            pattern: pattern.into(),
            response: response.into(),
            priority,
        }
    }
}

/// Assembles a rule table before it is frozen into a responder.
#[derive(Debug, Clone)]
pub struct RuleSetBuilder {
    rules: Vec<Rule>,
    acknowledgements: Vec<String>,
    seed: Option<u64>,
}

impl Default for RuleSetBuilder {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            acknowledgements: DEFAULT_ACKNOWLEDGEMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            seed: None,
        }
    }
}

impl RuleSetBuilder {
    /// Start from the built-in table.
    pub fn with_defaults() -> Self {
        let mut builder = Self::default();
        for (pattern, response) in DEFAULT_RULES {
            builder = builder.add_rule(*pattern, *response, 1.0);
        }
        builder
    }

    /// Append a rule. Rules with an empty pattern are ignored.
    pub fn add_rule(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
        priority: f32,
    ) -> Self {
        let rule = Rule::new(pattern, response, priority);
        if !rule.pattern.is_empty() {
            self.rules.push(rule);
        }
        self
    }

    /// Replace the generic acknowledgements. An empty list keeps the
    /// current ones.
    pub fn acknowledgements<I, S>(mut self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let replies: Vec<String> = replies.into_iter().map(Into::into).collect();
        if !replies.is_empty() {
            self.acknowledgements = replies;
        }
        self
    }

    /// Fix the RNG used to pick acknowledgements.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> RuleBasedResponder {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        RuleBasedResponder {
            rules: self.rules,
            acknowledgements: self.acknowledgements,
            rng,
        }
    }
}

/// Pattern table with fuzzy substring matching.
#[derive(Debug, Clone)]
pub struct RuleBasedResponder {
    rules: Vec<Rule>,
    acknowledgements: Vec<String>,
    rng: StdRng,
}

impl Default for RuleBasedResponder {
    fn default() -> Self {
        RuleSetBuilder::with_defaults().build()
    }
}

impl RuleBasedResponder {
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::default()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn acknowledgements(&self) -> &[String] {
        &self.acknowledgements
    }

    /// Highest-scoring rule and its weighted score. Ties keep the earlier
    /// rule; a zero score never matches.
    pub fn best_match(&self, input: &str) -> Option<(&Rule, f32)> {
        let input = input.to_lowercase();
        let mut best: Option<(&Rule, f32)> = None;
        for rule in &self.rules {
            let score = match_score(&input, &rule.pattern) * rule.priority;
            let best_score = best.map_or(0.0, |(_, s)| s);
            if score > best_score {
                best = Some((rule, score));
            }
        }
        best
    }

    /// Reply to `input`. Never fails.
    pub fn respond(&mut self, input: &str) -> String {
        if let Some((rule, score)) = self.best_match(input) {
            if score > MATCH_THRESHOLD {
                return rule.response.clone();
            }
        }
        self.acknowledgements
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default()
    }
}

/// Score `pattern` against an already lower-cased `input`.
pub fn match_score(input: &str, pattern: &str) -> f32 {
    let pattern = pattern.to_lowercase();
    if pattern.is_empty() {
        return 0.0;
    }
    if input.contains(&pattern) {
        return 1.0;
    }

    let mut total = 0usize;
    let mut found = 0usize;
    for c in pattern.chars() {
        total += 1;
        if input.contains(c) {
            found += 1;
        }
    }
    found as f32 / total as f32 * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_substring_wins() {
        let responder = RuleBasedResponder::builder()
            .add_rule("こんにちは", "R1", 1.0)
            .add_rule("さようなら", "R2", 1.0)
            .seed(1)
            .build();

        let (rule, score) = responder.best_match("こんにちは").unwrap();
        assert_eq!(rule.response, "R1");
        assert_eq!(score, 1.0);
        assert_eq!(responder.clone().respond("こんにちは"), "R1");
    }

    #[test]
    fn test_case_insensitive() {
        let mut responder = RuleBasedResponder::default();
        assert_eq!(responder.respond("HELLO there"), "Hello! Nice to meet you! 👋");
    }

    #[test]
    fn test_partial_score() {
        // 2 of 4 pattern characters present.
        assert_eq!(match_score("ab", "abcd"), 0.25);
        assert_eq!(match_score("xyz", "abcd"), 0.0);
        assert_eq!(match_score("zzabcdzz", "abcd"), 1.0);
    }

    #[test]
    fn test_no_match_returns_acknowledgement() {
        let mut responder = RuleBasedResponder::builder()
            .add_rule("こんにちは", "R1", 1.0)
            .seed(7)
            .build();
        for _ in 0..20 {
            let reply = responder.respond("xyz");
            assert!(DEFAULT_ACKNOWLEDGEMENTS.contains(&reply.as_str()));
        }
    }

    #[test]
    fn test_weak_partial_match_is_rejected() {
        // Half the characters present scores 0.25, below the threshold.
        let mut responder = RuleBasedResponder::builder()
            .add_rule("abcd", "R1", 1.0)
            .acknowledgements(["ack"])
            .build();
        assert_eq!(responder.respond("ab"), "ack");
    }

    #[test]
    fn test_priority_scales_score() {
        let mut responder = RuleBasedResponder::builder()
            .add_rule("cat", "low", 0.5)
            .add_rule("cat", "high", 2.0)
            .build();
        assert_eq!(responder.respond("a cat"), "high");
    }

    #[test]
    fn test_tie_keeps_first_rule() {
        let mut responder = RuleBasedResponder::builder()
            .add_rule("dog", "first", 1.0)
            .add_rule("dog", "second", 1.0)
            .build();
        assert_eq!(responder.respond("dog"), "first");
    }

    #[test]
    fn test_empty_pattern_ignored() {
        let responder = RuleBasedResponder::builder()
            .add_rule("", "never", 1.0)
            .build();
        assert!(responder.rules().is_empty());
    }

    #[test]
    fn test_same_seed_same_acknowledgements() {
        let mut a = RuleBasedResponder::builder().seed(42).build();
        let mut b = RuleBasedResponder::builder().seed(42).build();
        for _ in 0..10 {
            assert_eq!(a.respond("???"), b.respond("???"));
        }
    }

    #[test]
    fn test_default_table() {
        let responder = RuleBasedResponder::default();
        assert_eq!(responder.rules().len(), 29);
        assert_eq!(responder.acknowledgements().len(), 5);
    }
}
