use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle within which edits are refused.
///
/// Identity is the `(x1, y1, x2, y2)` tuple — there is no separate surrogate
/// key, matching the source system's `lock_id = f"{x1},{y1},{x2},{y2}"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionLock {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub locked_by: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RegionLock {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.x1 <= x && x <= self.x2 && self.y1 <= y && y <= self.y2
    }

    pub fn key(&self) -> (u32, u32, u32, u32) {
        (self.x1, self.y1, self.x2, self.y2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock(x1: u32, y1: u32, x2: u32, y2: u32) -> RegionLock {
        RegionLock {
            x1,
            y1,
            x2,
            y2,
            locked_by: "tester".to_string(),
            reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn contains_treats_corners_as_inclusive() {
        let region = lock(10, 10, 20, 20);
        assert!(region.contains(10, 10));
        assert!(region.contains(20, 20));
        assert!(region.contains(15, 15));
        assert!(!region.contains(9, 15));
        assert!(!region.contains(21, 15));
    }

    #[test]
    fn key_is_the_rectangle_tuple() {
        let region = lock(1, 2, 3, 4);
        assert_eq!(region.key(), (1, 2, 3, 4));
    }
}
