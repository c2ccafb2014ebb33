use std::fmt;

/// A region is reported as clean only when its clean share is strictly above this.
pub const PCT_CLEAN_THRESHOLD: f64 = 0.5;

pub const CLEAN_TOPIC: &str = "clean-power";
pub const DIRTY_TOPIC: &str = "dirty-power";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Clean,
    Fossil,
}

impl Classification {
    pub fn topic(self) -> &'static str {
        match self {
            Self::Clean => CLEAN_TOPIC,
            Self::Fossil => DIRTY_TOPIC,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => f.write_str("clean"),
            Self::Fossil => f.write_str("fossil"),
        }
    }
}

pub fn classify(clean_fraction: f64) -> Classification {
    if clean_fraction > PCT_CLEAN_THRESHOLD {
        Classification::Clean
    } else {
        Classification::Fossil
    }
}

/// Status word carried by a topic name: everything before the first `-`.
pub fn status_from_topic(topic: &str) -> &str {
    topic.split('-').next().unwrap_or(topic)
}
