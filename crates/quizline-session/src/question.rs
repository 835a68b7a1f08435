//! Questions and the fixed per-theme question bank.

use std::fmt;
use std::str::FromStr;

use crate::SessionError;

/// One multiple-choice question. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Question {
    pub prompt: String,
    pub choices: Vec<String>,
    pub correct_index: usize,
}

/// Returned by [`Session::current_question`](crate::Session::current_question)
/// when the cursor is out of range.
pub(crate) static EMPTY_QUESTION: Question = Question::empty();

impl Question {
    pub fn new(
        prompt: impl Into<String>,
        choices: impl IntoIterator<Item = impl Into<String>>,
        correct_index: usize,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            choices: choices.into_iter().map(Into::into).collect(),
            correct_index,
        }
    }

    /// A question with no prompt and no choices.
    pub const fn empty() -> Self {
        Self {
            prompt: String::new(),
            choices: Vec::new(),
            correct_index: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prompt.is_empty() && self.choices.is_empty()
    }

    /// Whether `choice` is the correct answer.
    pub fn is_correct(&self, choice: usize) -> bool {
        !self.choices.is_empty() && choice == self.correct_index
    }
}

// ---------------------------------------------------------------------------
// Theme
// ---------------------------------------------------------------------------

/// The question set a game is played with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Theme {
    #[default]
    Science,
    Sport,
    Culture,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Science, Theme::Sport, Theme::Culture];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Science => "Science",
            Self::Sport => "Sport",
            Self::Culture => "Culture",
        }
    }

    /// The fixed, ordered questions for this theme.
    pub fn questions(&self) -> Vec<Question> {
        let table: &[(&str, [&str; 4], usize)] = match self {
            Self::Science => &[
                ("What is the chemical symbol for gold?", ["Ag", "Au", "Gd", "Go"], 1),
                ("Which planet is closest to the Sun?", ["Venus", "Mars", "Mercury", "Earth"], 2),
                ("What gas do plants absorb for photosynthesis?", ["Carbon dioxide", "Oxygen", "Nitrogen", "Helium"], 0),
                ("How many bones are in the adult human body?", ["186", "212", "198", "206"], 3),
                ("What is the speed of light in vacuum, roughly?", ["300,000 km/s", "150,000 km/s", "30,000 km/s", "3,000 km/s"], 0),
            ],
            Self::Sport => &[
                ("How many players does a football team field?", ["9", "10", "11", "12"], 2),
                ("Which country hosted the 2016 Summer Olympics?", ["China", "Brazil", "UK", "Japan"], 1),
                ("In tennis, what is a score of zero called?", ["Nil", "Love", "Duck", "Zero"], 1),
                ("How long is a marathon?", ["42.195 km", "40 km", "26 km", "50 km"], 0),
                ("Which sport uses a shuttlecock?", ["Squash", "Tennis", "Padel", "Badminton"], 3),
            ],
            Self::Culture => &[
                ("What is the capital of France?", ["Lyon", "Paris", "Nice", "Toulouse"], 1),
                ("Who painted the Mona Lisa?", ["Leonardo da Vinci", "Michelangelo", "Raphael", "Donatello"], 0),
                ("Who wrote 'Les Misérables'?", ["Émile Zola", "Gustave Flaubert", "Victor Hugo", "Albert Camus"], 2),
                ("Which instrument has 88 keys?", ["Organ", "Harpsichord", "Accordion", "Piano"], 3),
                ("In which city is the Colosseum?", ["Athens", "Rome", "Istanbul", "Naples"], 1),
            ],
        };
        table
            .iter()
            .map(|(prompt, choices, correct)| {
                Question::new(*prompt, *choices, *correct)
            })
            .collect()
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = SessionError;

    /// Case-insensitive: `"science"`, `"SCIENCE"` and `"Science"` all parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|theme| theme.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SessionError::UnknownTheme(s.to_string()))
    }
}
