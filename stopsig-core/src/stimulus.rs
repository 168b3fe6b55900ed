use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of shapes in the catalog.
pub const STIMULUS_COUNT: usize = 4;

/// Shapes shown as primary stimuli
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Circle,
    LShape,
    Rhombus,
    Triangle,
}

impl Shape {
    pub const ALL: [Shape; STIMULUS_COUNT] =
        [Shape::Circle, Shape::LShape, Shape::Rhombus, Shape::Triangle];

    pub fn name(&self) -> &'static str {
        match self {
            Shape::Circle => "circle",
            Shape::LShape => "L shape",
            Shape::Rhombus => "rhombus",
            Shape::Triangle => "triangle",
        }
    }
}

/// Index into the 4-member catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct StimulusId(u8);

impl StimulusId {
    pub const ALL: [StimulusId; STIMULUS_COUNT] =
        [StimulusId(0), StimulusId(1), StimulusId(2), StimulusId(3)];

    pub fn new(id: u8) -> Option<Self> {
        ((id as usize) < STIMULUS_COUNT).then_some(Self(id))
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Shapes 0 and 1 are answered with the stop hand.
    pub fn is_stop_hand(&self) -> bool {
        self.0 < 2
    }
}

impl TryFrom<u8> for StimulusId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("stimulus id {value} out of range"))
    }
}

impl From<StimulusId> for u8 {
    fn from(id: StimulusId) -> u8 {
        id.0
    }
}

impl fmt::Display for StimulusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Browser-style key code of a response key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u32);

impl KeyCode {
    pub const LEFT_ARROW: KeyCode = KeyCode(37);
    pub const DOWN_ARROW: KeyCode = KeyCode(40);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finger {
    Index,
    Middle,
}

impl fmt::Display for Finger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finger::Index => f.write_str("index finger"),
            Finger::Middle => f.write_str("middle finger"),
        }
    }
}

/// A finger together with the key it presses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseOption {
    pub finger: Finger,
    pub key: KeyCode,
}

impl ResponseOption {
    pub const INDEX: ResponseOption = ResponseOption {
        finger: Finger::Index,
        key: KeyCode::LEFT_ARROW,
    };
    pub const MIDDLE: ResponseOption = ResponseOption {
        finger: Finger::Middle,
        key: KeyCode::DOWN_ARROW,
    };
}

/// Shape to response mapping for one session.
///
/// Stimuli 0 and 1 are answered with the stop response, stimuli 2 and 3 with
/// the ignore response. Which shape sits behind each id and which finger is
/// the stop finger are counterbalanced per subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusCatalog {
    shapes: [Shape; STIMULUS_COUNT],
    stop_response: ResponseOption,
    ignore_response: ResponseOption,
}

impl StimulusCatalog {
    pub fn new(
        shapes: [Shape; STIMULUS_COUNT],
        stop_response: ResponseOption,
        ignore_response: ResponseOption,
    ) -> Self {
        Self {
            shapes,
            stop_response,
            ignore_response,
        }
    }

    /// Random shape permutation and random finger order.
    pub fn randomized<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut shapes = Shape::ALL;
        shapes.shuffle(rng);
        let (stop_response, ignore_response) = if rng.random_bool(0.5) {
            (ResponseOption::MIDDLE, ResponseOption::INDEX)
        } else {
            (ResponseOption::INDEX, ResponseOption::MIDDLE)
        };
        Self::new(shapes, stop_response, ignore_response)
    }

    pub fn shape(&self, id: StimulusId) -> Shape {
        self.shapes[id.index()]
    }

    pub fn response_for(&self, id: StimulusId) -> ResponseOption {
        if id.is_stop_hand() {
            self.stop_response
        } else {
            self.ignore_response
        }
    }

    pub fn correct_response(&self, id: StimulusId) -> KeyCode {
        self.response_for(id).key
    }

    pub fn stop_response(&self) -> ResponseOption {
        self.stop_response
    }

    pub fn ignore_response(&self) -> ResponseOption {
        self.ignore_response
    }

    /// Both response keys, stop key first.
    pub fn choices(&self) -> [KeyCode; 2] {
        [self.stop_response.key, self.ignore_response.key]
    }

    /// One line per shape naming the finger that answers it.
    pub fn key_mapping(&self) -> String {
        StimulusId::ALL
            .iter()
            .map(|&id| format!("{}: {}", self.shape(id).name(), self.response_for(id).finger))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl Default for StimulusCatalog {
    fn default() -> Self {
        Self::new(Shape::ALL, ResponseOption::INDEX, ResponseOption::MIDDLE)
    }
}
