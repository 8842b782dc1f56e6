use serde::{Deserialize, Serialize};

/// Number of angle images in every generation result: front, back, left, right.
pub const ANGLE_COUNT: usize = 4;

pub const ANGLE_LABELS: [&str; ANGLE_COUNT] = [
    "Front (Original)",
    "Back (Original)",
    "Left Side (AI)",
    "Right Side (AI)",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Generating,
    Complete,
    Error,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Error)
    }

    pub fn accepts_start(self) -> bool {
        matches!(self, Phase::Idle | Phase::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSlot {
    Front,
    Back,
}

impl ImageSlot {
    /// Multipart field name expected by the generation endpoint.
    pub fn form_field(self) -> &'static str {
        match self {
            ImageSlot::Front => "frontImage",
            ImageSlot::Back => "backImage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageMime {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
}

impl ImageMime {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Png => "image/png",
        }
    }

    pub fn from_mime_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageMime::Jpeg),
            "image/png" => Some(ImageMime::Png),
            _ => None,
        }
    }
}

/// Named sub-stages of a generation, in the order the backend runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStep {
    Uploading = 1,
    Enhancing = 2,
    SideAngles = 3,
    CreatingVideo = 4,
    Finalizing = 5,
}

impl GenerationStep {
    pub const ALL: [GenerationStep; 5] = [
        GenerationStep::Uploading,
        GenerationStep::Enhancing,
        GenerationStep::SideAngles,
        GenerationStep::CreatingVideo,
        GenerationStep::Finalizing,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.ordinal() == ordinal)
    }

    pub fn label(self) -> &'static str {
        match self {
            GenerationStep::Uploading => "Uploading images",
            GenerationStep::Enhancing => "Enhancing quality",
            GenerationStep::SideAngles => "Generating side angles",
            GenerationStep::CreatingVideo => "Creating video",
            GenerationStep::Finalizing => "Finalizing",
        }
    }

    /// Progress percentage reached once this step is underway.
    pub fn nominal_progress(self) -> u8 {
        match self {
            GenerationStep::Uploading => 10,
            GenerationStep::Enhancing => 25,
            GenerationStep::SideAngles => 50,
            GenerationStep::CreatingVideo => 80,
            GenerationStep::Finalizing => 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub enhancement: f64,
    pub side_angles: f64,
    pub video_creation: f64,
    pub total: f64,
}

impl CostBreakdown {
    pub fn fields(&self) -> [(&'static str, f64); 4] {
        [
            ("enhancement", self.enhancement),
            ("sideAngles", self.side_angles),
            ("videoCreation", self.video_creation),
            ("total", self.total),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub video_url: String,
    pub images: [String; ANGLE_COUNT],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub costs: Option<CostBreakdown>,
}

impl GenerationResult {
    pub fn labelled_images(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        ANGLE_LABELS
            .into_iter()
            .zip(self.images.iter().map(String::as_str))
    }
}
