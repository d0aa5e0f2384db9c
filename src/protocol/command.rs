//! Configuration payload sent to the rig.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Number of rows in a character or obstacle sprite.
pub const SPRITE_ROWS: usize = 8;

/// What the player has to reach to win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    /// Survive for `goal_value` seconds.
    Time,
    /// Avoid `goal_value` obstacles.
    Obstacles,
}

/// Game configuration, already validated by the HTTP layer.
///
/// Each sprite row is a 5-bit pixel mask, most significant bit leftmost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    /// Player sprite, one mask per row.
    pub character: [u8; SPRITE_ROWS],
    /// Obstacle sprite, one mask per row.
    pub obstacle: [u8; SPRITE_ROWS],
    /// Win condition.
    pub goal_type: GoalType,
    /// Seconds or obstacles needed to win, depending on `goal_type`.
    pub goal_value: u32,
}

/// Encodes a configuration as compact JSON, exactly as written to the wire.
pub fn encode(config: &GameConfig) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_compact() {
        let config = GameConfig {
            character: [0; 8],
            obstacle: [31, 17, 17, 17, 17, 17, 17, 31],
            goal_type: GoalType::Time,
            goal_value: 30,
        };
        let wire = encode(&config).unwrap();
        assert_eq!(
            &wire[..],
            br#"{"character":[0,0,0,0,0,0,0,0],"obstacle":[31,17,17,17,17,17,17,31],"goalType":"time","goalValue":30}"#
        );
    }

    #[test]
    fn test_decode_from_client_json() {
        let json = r#"{"character":[1,2,3,4,5,6,7,8],"obstacle":[0,0,0,0,0,0,0,0],"goalType":"obstacles","goalValue":12}"#;
        let config: GameConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.goal_type, GoalType::Obstacles);
        assert_eq!(config.character[7], 8);
        assert_eq!(config.goal_value, 12);
    }
}
