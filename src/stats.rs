//! Episode outcomes and their accumulation across many episodes.
use serde::Serialize;

/// Why an episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    /// The drone left the flight volume
    OutOfBounds,
    /// The drone hit a ring or crossed one backwards
    Collision,
    /// The move budget ran out
    Timeout,
    /// Every ring was passed with moves to spare
    CourseComplete,
}

impl Termination {
    /// Outcome flags `(oob, collision, timeout)`, at most one of them is set
    pub fn flags(&self) -> (f32, f32, f32) {
        match self {
            Termination::OutOfBounds => (1.0, 0.0, 0.0),
            Termination::Collision => (0.0, 1.0, 0.0),
            Termination::Timeout => (0.0, 0.0, 1.0),
            Termination::CourseComplete => (0.0, 0.0, 0.0),
        }
    }
}

/// Summary of one finished episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeSummary {
    /// Rings passed
    pub score: u32,
    /// Sum of every reward of the episode
    pub episode_return: f32,
    /// Ticks since the last reset
    pub length: u32,
    /// Fraction of the course completed
    pub progress: f32,
    pub termination: Termination,
}

/// Running sums over finished episodes, `n` counts the episodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Log {
    pub perf: f32,
    pub score: f32,
    pub collision_rate: f32,
    pub oob: f32,
    pub timeout: f32,
    pub episode_return: f32,
    pub episode_length: f32,
    pub n: f32,
}

impl Log {
    /// Names of the fields in the order they are reported
    pub const FIELD_NAMES: [&'static str; 8] = [
        "perf",
        "score",
        "collision_rate",
        "oob",
        "timeout",
        "episode_return",
        "episode_length",
        "n",
    ];
    /// Adds one finished episode
    pub fn record(&mut self, episode: &EpisodeSummary) {
        let (oob, collision, timeout) = episode.termination.flags();
        self.perf += episode.progress;
        self.score += episode.score as f32;
        self.collision_rate += collision;
        self.oob += oob;
        self.timeout += timeout;
        self.episode_return += episode.episode_return;
        self.episode_length += episode.length as f32;
        self.n += 1.0;
    }
    /// Adds the sums of another log
    pub fn merge(&mut self, other: &Log) {
        self.perf += other.perf;
        self.score += other.score;
        self.collision_rate += other.collision_rate;
        self.oob += other.oob;
        self.timeout += other.timeout;
        self.episode_return += other.episode_return;
        self.episode_length += other.episode_length;
        self.n += other.n;
    }
    /// Per-episode averages, `n` is kept as the episode count
    /// # Returns
    /// * A zero log if no episode was recorded
    pub fn mean(&self) -> Log {
        if self.n <= 0.0 {
            return Log::default();
        }
        let n = self.n;
        Log {
            perf: self.perf / n,
            score: self.score / n,
            collision_rate: self.collision_rate / n,
            oob: self.oob / n,
            timeout: self.timeout / n,
            episode_return: self.episode_return / n,
            episode_length: self.episode_length / n,
            n,
        }
    }
    pub fn clear(&mut self) {
        *self = Log::default();
    }
    /// Named fields in report order
    pub fn fields(&self) -> [(&'static str, f32); 8] {
        let values = [
            self.perf,
            self.score,
            self.collision_rate,
            self.oob,
            self.timeout,
            self.episode_return,
            self.episode_length,
            self.n,
        ];
        std::array::from_fn(|i| (Self::FIELD_NAMES[i], values[i]))
    }
}
