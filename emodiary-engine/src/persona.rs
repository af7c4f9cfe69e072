//! Persona selection for the feedback instruction
//!
//! Each persona maps to a fixed system instruction shipped with the crate
//! (`prompts/*.txt`). Lookup never fails: unknown identifiers resolve to
//! [`PersonaResolution::Invalid`].

use serde::{Deserialize, Serialize};

/// Response style requested by the diary author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Persona {
    BestFriend,
    Parents,
    Expert,
    Mentor,
    Counselor,
    Poet,
}

impl Persona {
    pub const ALL: [Persona; 6] = [
        Persona::BestFriend,
        Persona::Parents,
        Persona::Expert,
        Persona::Mentor,
        Persona::Counselor,
        Persona::Poet,
    ];

    /// Wire identifier, e.g. `BEST_FRIEND`
    pub fn id(self) -> &'static str {
        match self {
            Persona::BestFriend => "BEST_FRIEND",
            Persona::Parents => "PARENTS",
            Persona::Expert => "EXPERT",
            Persona::Mentor => "MENTOR",
            Persona::Counselor => "COUNSELOR",
            Persona::Poet => "POET",
        }
    }

    /// Korean label shown in the diary app
    pub fn display_label(self) -> &'static str {
        match self {
            Persona::BestFriend => "베프",
            Persona::Parents => "부모님",
            Persona::Expert => "전문가",
            Persona::Mentor => "멘토",
            Persona::Counselor => "상담사",
            Persona::Poet => "시인",
        }
    }

    /// System instruction for the text generator
    pub fn instruction(self) -> &'static str {
        match self {
            Persona::BestFriend => include_str!("../prompts/best_friend.txt"),
            Persona::Parents => include_str!("../prompts/parents.txt"),
            Persona::Expert => include_str!("../prompts/expert.txt"),
            Persona::Mentor => include_str!("../prompts/mentor.txt"),
            Persona::Counselor => include_str!("../prompts/counselor.txt"),
            Persona::Poet => include_str!("../prompts/poet.txt"),
        }
    }

    /// Exact-match lookup; `BEST FRIEND` is accepted as a spelling of `BEST_FRIEND`.
    pub fn from_id(id: &str) -> Option<Persona> {
        Persona::ALL
            .into_iter()
            .find(|p| p.id() == id || p.id().replace('_', " ") == id)
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Outcome of resolving a persona identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonaResolution {
    Instruction(Persona, &'static str),
    Invalid,
}

/// Resolve a persona identifier to its instruction.
pub fn resolve(id: &str) -> PersonaResolution {
    match Persona::from_id(id) {
        Some(persona) => PersonaResolution::Instruction(persona, persona.instruction()),
        None => {
            tracing::warn!("Invalid persona: {id:?}");
            PersonaResolution::Invalid
        }
    }
}
