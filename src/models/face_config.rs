//! Target faces for each tutorial scenario.
//!
//! The user's face is swapped onto a prepared still or video. Each target
//! carries the landmark string the provider expects (`x1,y1:x2,y2:x3,y3:x4,y4`).

use serde::Deserialize;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Display, EnumString)]
pub enum Section {
    #[serde(rename = "FAKE_NEWS")]
    #[strum(serialize = "FAKE_NEWS")]
    FakeNews,
    #[serde(rename = "IDENTITY_THEFT")]
    #[strum(serialize = "IDENTITY_THEFT")]
    IdentityTheft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Display, EnumString)]
pub enum Scenario {
    #[serde(rename = "SCENARIO1")]
    #[strum(serialize = "SCENARIO1")]
    Scenario1,
    #[serde(rename = "SCENARIO2")]
    #[strum(serialize = "SCENARIO2")]
    Scenario2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// A face the provider should replace, with its landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceTarget {
    pub path: &'static str,
    pub opts: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapTarget {
    Image {
        target: FaceTarget,
    },
    Video {
        video_url: &'static str,
        faces: &'static [FaceTarget],
    },
}

macro_rules! asset {
    ($name:literal) => {
        concat!(
            "https://deepfake-videomaking.s3.us-east-1.amazonaws.com/video-url/",
            $name
        )
    };
}

const IDENTITY_THEFT_FACES: &[FaceTarget] = &[FaceTarget {
    path: asset!("identitytheft_scenario2_man.png"),
    opts: "354,475:561,455:465,576:396,708",
}];

/// Swap target for a scenario, or `None` when the combination is not offered.
pub fn lookup(section: Section, scenario: Scenario, gender: Gender) -> Option<SwapTarget> {
    use Gender::*;
    use Scenario::*;
    use Section::*;

    let target = match (section, scenario, gender) {
        (FakeNews, Scenario1, Male) => SwapTarget::Image {
            target: FaceTarget {
                path: asset!("deepfake_scenario1_man.png"),
                opts: "916,187:1012,192:962,250:916,289",
            },
        },
        (FakeNews, Scenario1, Female) => SwapTarget::Image {
            target: FaceTarget {
                path: asset!("deepfake_scenario1_female.png"),
                opts: "1026,220:1138,223:1080,285:1023,326",
            },
        },
        (FakeNews, Scenario2, Male) => SwapTarget::Image {
            target: FaceTarget {
                path: asset!("deepfake_scenario2_man.png"),
                opts: "775,222:873,221:819,285:790,336",
            },
        },
        (FakeNews, Scenario2, Female) => SwapTarget::Image {
            target: FaceTarget {
                path: asset!("deepfake_scenario2_female.png"),
                opts: "980,489:1103,483:1034,571:1007,629",
            },
        },
        // Both genders share the same source video and face.
        (IdentityTheft, Scenario1, _) => SwapTarget::Video {
            video_url: asset!("identitytheft_scenario2.mov"),
            faces: IDENTITY_THEFT_FACES,
        },
        (IdentityTheft, Scenario2, _) => return None,
    };
    Some(target)
}
