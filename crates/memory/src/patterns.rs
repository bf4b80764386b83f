//! Pattern memory: two bounded, score-sorted rule collections.
//!
//! Observations of the same rule are folded together with exponential
//! decay, so recent evidence outweighs history without erasing it. Both
//! collections are hard-capped and re-sorted after every mutation; a
//! periodic consolidation pass replaces a whole collection with a few
//! distilled rules.

use designloop_core::error::MemoryError;
use designloop_core::pattern::{LearnedPatterns, Pattern, PatternKind, Summarizer};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Size and weighting parameters for [`PatternMemory`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryLimits {
    /// Maximum patterns per collection.
    pub capacity: usize,
    /// Weight kept by the old score on a repeat observation.
    pub decay: f64,
    /// Score assigned to every rule produced by consolidation.
    pub consolidated_score: f64,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            capacity: 15,
            decay: 0.7,
            consolidated_score: 0.95,
        }
    }
}

/// The agent's learned rules. Owned by one agent; outlives individual runs.
#[derive(Debug, Clone, Default)]
pub struct PatternMemory {
    limits: MemoryLimits,
    patterns: LearnedPatterns,
}

impl PatternMemory {
    /// Create an empty memory with the given limits.
    pub fn new(limits: MemoryLimits) -> Self {
        Self {
            limits,
            patterns: LearnedPatterns::default(),
        }
    }

    /// Seed memory with patterns carried over from an earlier agent.
    ///
    /// Collections are re-sorted and cropped to the configured capacity.
    pub fn from_patterns(limits: MemoryLimits, mut patterns: LearnedPatterns) -> Self {
        for list in [&mut patterns.execution, &mut patterns.style] {
            sort_desc(list);
            list.truncate(limits.capacity);
        }
        Self { limits, patterns }
    }

    pub fn limits(&self) -> &MemoryLimits {
        &self.limits
    }

    fn list_mut(&mut self, kind: PatternKind) -> &mut Vec<Pattern> {
        match kind {
            PatternKind::Execution => &mut self.patterns.execution,
            PatternKind::Style => &mut self.patterns.style,
        }
    }

    /// Record one observation of `content` with the given score.
    ///
    /// A repeat observation blends `old * decay + new * (1 - decay)` and
    /// bumps the frequency; novel content is inserted, the collection
    /// re-sorted, and anything past capacity truncated. Callers never see
    /// an over-full collection.
    pub fn observe(&mut self, kind: PatternKind, content: &str, score: f64, iteration: u32) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        let score = score.clamp(0.0, 1.0);
        let MemoryLimits { capacity, decay, .. } = self.limits;
        let list = self.list_mut(kind);

        if let Some(existing) = list.iter_mut().find(|p| p.content == content) {
            existing.score = (existing.score * decay + score * (1.0 - decay)).clamp(0.0, 1.0);
            existing.frequency += 1;
            existing.last_iteration = iteration;
            debug!(%kind, content, score = existing.score, frequency = existing.frequency, "Pattern reinforced");
            sort_desc(list);
        } else {
            list.push(Pattern::new(content, score, iteration));
            sort_desc(list);
            if list.len() > capacity {
                let evicted = list.split_off(capacity);
                debug!(%kind, content, score, evicted = evicted.len(), "Pattern learned, collection cropped");
            } else {
                debug!(%kind, content, score, "Pattern learned");
            }
        }
    }

    /// The highest-scoring patterns with `score > min_score`, best first.
    pub fn top_by_score(&self, kind: PatternKind, min_score: f64, limit: usize) -> Vec<Pattern> {
        // Collections are kept sorted, so a filtered prefix is already ordered.
        self.patterns
            .get(kind)
            .iter()
            .filter(|p| p.score > min_score)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Render the top patterns as a numbered prompt block.
    pub fn render(&self, kind: PatternKind, min_score: f64, limit: usize) -> String {
        let top = self.top_by_score(kind, min_score, limit);
        if top.is_empty() {
            return "(none yet)".into();
        }
        top.iter()
            .enumerate()
            .map(|(i, p)| format!("{}. [score={:.2}] {}", i + 1, p.score, p.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Replace a whole collection with distilled rules.
    ///
    /// Sends every rule in the collection to the summarizer and installs the
    /// returned rules at the consolidated score. This is a destructive
    /// compaction: frequency and history of the old rules are dropped.
    /// An empty collection is left alone and the summarizer is not called.
    /// Returns the number of rules installed.
    pub async fn consolidate(
        &mut self,
        kind: PatternKind,
        summarizer: &dyn Summarizer,
        iteration: u32,
    ) -> Result<usize, MemoryError> {
        let raw: Vec<String> = self.patterns.get(kind).iter().map(|p| p.content.clone()).collect();
        if raw.is_empty() {
            return Ok(0);
        }

        let rules = summarizer.summarize(kind, &raw).await?;

        let mut distilled: Vec<String> = Vec::new();
        for rule in rules {
            let rule = rule.trim();
            if !rule.is_empty() && !distilled.iter().any(|r| r == rule) {
                distilled.push(rule.to_string());
            }
        }
        if distilled.is_empty() {
            return Err(MemoryError::EmptySummary);
        }

        let MemoryLimits { capacity, consolidated_score, .. } = self.limits;
        let replacement: Vec<Pattern> = distilled
            .into_iter()
            .take(capacity)
            .map(|rule| Pattern::new(rule, consolidated_score, iteration))
            .collect();
        let installed = replacement.len();

        info!(%kind, before = raw.len(), after = installed, "Patterns consolidated");
        *self.list_mut(kind) = replacement;
        Ok(installed)
    }

    /// Copy of both collections.
    pub fn snapshot(&self) -> LearnedPatterns {
        self.patterns.clone()
    }

    pub fn len(&self, kind: PatternKind) -> usize {
        self.patterns.get(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.patterns = LearnedPatterns::default();
    }
}

/// Descending by score; ties favour the more frequent, then the more recent rule.
fn sort_desc(list: &mut [Pattern]) {
    list.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.frequency.cmp(&a.frequency))
            .then(b.last_iteration.cmp(&a.last_iteration))
    });
}
