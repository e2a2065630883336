use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TraceError;

// ── Role ─────────────────────────────────────────────────────────────────────

/// Platform role of an actor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Producer,
    Processor,
    Inspector,
    Seller,
    Consumer,
}

impl Role {
    /// The workflow stage this role records against. Consumers only read.
    pub fn stage(self) -> Option<Stage> {
        match self {
            Role::Producer => Some(Stage::Producer),
            Role::Processor => Some(Stage::Processor),
            Role::Inspector => Some(Stage::Inspector),
            Role::Seller => Some(Stage::Seller),
            Role::Consumer => None,
        }
    }
}

// ── Stage ────────────────────────────────────────────────────────────────────

/// Step of the product workflow a chain currently sits at.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Producer,
    Processor,
    Inspector,
    Seller,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Producer, Stage::Processor, Stage::Inspector, Stage::Seller];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Producer => "producer",
            Stage::Processor => "processor",
            Stage::Inspector => "inspector",
            Stage::Seller => "seller",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| TraceError::UnknownStage(s.to_string()))
    }
}

// ── ActorRef ─────────────────────────────────────────────────────────────────

/// The party performing an action, or the target of an assignment.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct ActorRef {
    pub id: u64,
    pub name: String,
    pub role: Role,
}

impl ActorRef {
    pub fn new(id: u64, name: impl Into<String>, role: Role) -> Self {
        Self { id, name: name.into(), role }
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
