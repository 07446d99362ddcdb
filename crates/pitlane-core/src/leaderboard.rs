//! Leaderboard calculator
//!
//! Pure function of a session: best lap per driver, laps completed, car
//! number. Ranked by best lap ascending; drivers without a lap go last.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{DriverId, Session};

/// Car number shown for a driver without an assignment
pub const UNASSIGNED_CAR: u32 = 0;

/// One row of the leaderboard
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub driver_id: DriverId,
    pub name: String,
    pub car_number: u32,
    /// Fastest lap in seconds, `None` before the first crossing
    pub fastest_lap: Option<f64>,
    /// Number of laps recorded
    pub current_lap: u32,
}

/// Rank the drivers of a session
pub fn leaderboard(session: &Session) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = session
        .drivers
        .iter()
        .map(|driver| {
            let mut fastest: Option<f64> = None;
            let mut count = 0u32;
            for lap in session.laps_for(driver.id) {
                count += 1;
                fastest = Some(match fastest {
                    Some(best) if best <= lap.lap_time => best,
                    _ => lap.lap_time,
                });
            }
            LeaderboardEntry {
                driver_id: driver.id,
                name: driver.name.clone(),
                car_number: session
                    .car_for(driver.id)
                    .map(|c| c.car_number)
                    .unwrap_or(UNASSIGNED_CAR),
                fastest_lap: fastest,
                current_lap: count,
            }
        })
        .collect();

    // Stable: equal times and lap-less drivers keep roster order
    entries.sort_by(|a, b| compare_fastest(a.fastest_lap, b.fastest_lap));
    entries
}

fn compare_fastest(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Lap, LapId, SessionId, Timestamp};

    fn lap(id: u64, driver: DriverId, lap_time: f64) -> Lap {
        Lap {
            id: LapId(id),
            driver_id: driver,
            lap_time,
            timestamp: Timestamp::from_secs(id),
        }
    }

    #[test]
    fn test_leaderboard_ordering() {
        let mut session = Session::new(SessionId(1));
        let a = session.add_driver(DriverId(1), "A", 8).unwrap().id;
        let b = session.add_driver(DriverId(2), "B", 8).unwrap().id;
        let c = session.add_driver(DriverId(3), "C", 8).unwrap().id;
        session.laps.push(lap(10, a, 33.0));
        session.laps.push(lap(11, a, 31.2));
        session.laps.push(lap(12, c, 29.8));

        let board = leaderboard(&session);
        let order: Vec<&str> = board.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);

        assert_eq!(board[0].fastest_lap, Some(29.8));
        assert_eq!(board[1].fastest_lap, Some(31.2));
        assert_eq!(board[1].current_lap, 2);
        assert_eq!(board[2].driver_id, b);
        assert_eq!(board[2].fastest_lap, None);
        assert_eq!(board[2].current_lap, 0);
    }

    #[test]
    fn test_leaderboard_stable_for_lapless_drivers() {
        let mut session = Session::new(SessionId(1));
        for (i, name) in ["Al", "Bo", "Cy"].iter().enumerate() {
            session.add_driver(DriverId(i as u64 + 1), name, 8).unwrap();
        }
        let names: Vec<String> = leaderboard(&session).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Al", "Bo", "Cy"]);
    }

    #[test]
    fn test_leaderboard_unassigned_car_sentinel() {
        let mut session = Session::new(SessionId(1));
        let al = session.add_driver(DriverId(1), "Al", 8).unwrap().id;
        session.cars.clear();
        let board = leaderboard(&session);
        assert_eq!(board[0].driver_id, al);
        assert_eq!(board[0].car_number, UNASSIGNED_CAR);
    }

    #[test]
    fn test_leaderboard_empty_session() {
        assert!(leaderboard(&Session::new(SessionId(1))).is_empty());
    }
}
