use crate::types::Age;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An out-of-band checkpoint enabling a consumer to resume simulation at
/// `frame` without replaying every prior tick.
///
/// The zeroth start point (`frame == 0`) always exists and seeds the
/// session's random generator and global arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartPoint {
    pub frame: Age,
    pub timestamp: f64,
    pub data: StartPointData,
}

/// Payload of a start point. The zeroth start point carries the session
/// seed; later ones carry a serialized random generator plus the simulation
/// snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartPointData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(
        rename = "globalArgs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub global_args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(rename = "startedAt", default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<f64>,
    #[serde(
        rename = "randGenSer",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rand_gen_ser: Option<Value>,
    #[serde(
        rename = "gameSnapshot",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub game_snapshot: Option<Value>,
}

impl StartPoint {
    /// The zeroth start point written once by the authoritative instance.
    pub fn zeroth(seed: i64, started_at: f64, fps: f64, global_args: Option<Value>) -> Self {
        Self {
            frame: 0,
            timestamp: started_at,
            data: StartPointData {
                seed: Some(seed),
                global_args,
                fps: Some(fps),
                started_at: Some(started_at),
                rand_gen_ser: None,
                game_snapshot: None,
            },
        }
    }
}
