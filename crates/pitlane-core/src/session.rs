//! Race session data model
//!
//! A session owns its drivers, car assignments and laps outright.
//! INVARIANT: roster mutations only while pending, laps only under the safe flag.

use serde::{Deserialize, Serialize};

use crate::{DriverId, LapId, RaceError, RaceMode, RaceResult, SessionId, Timestamp};

/// A participant in one session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    /// Seconds since session start at the driver's last line crossing
    #[serde(default)]
    pub last_lap_mark: f64,
}

/// Driver-to-number assignment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub driver_id: DriverId,
    pub car_number: u32,
}

/// A recorded line crossing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lap {
    pub id: LapId,
    pub driver_id: DriverId,
    /// Server-derived lap duration in seconds
    pub lap_time: f64,
    pub timestamp: Timestamp,
}

/// One scheduled, running or completed race
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub mode: RaceMode,
    pub drivers: Vec<Driver>,
    pub cars: Vec<Car>,
    pub laps: Vec<Lap>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    /// Set by `end_session`; the mode stays `danger` on the wire
    #[serde(default)]
    pub archived: bool,
}

impl Session {
    /// Create an empty pending session
    pub fn new(id: SessionId) -> Self {
        Session {
            id,
            mode: RaceMode::Pending,
            drivers: Vec::new(),
            cars: Vec::new(),
            laps: Vec::new(),
            start_time: None,
            end_time: None,
            archived: false,
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.mode == RaceMode::Pending
    }

    /// Started, flag still out, not yet finished or ended
    #[inline]
    pub fn is_live(&self) -> bool {
        self.mode.is_flag() && !self.archived
    }

    pub fn driver(&self, id: DriverId) -> Option<&Driver> {
        self.drivers.iter().find(|d| d.id == id)
    }

    pub fn driver_by_name(&self, name: &str) -> Option<&Driver> {
        self.drivers.iter().find(|d| d.name == name)
    }

    pub fn car_for(&self, driver: DriverId) -> Option<&Car> {
        self.cars.iter().find(|c| c.driver_id == driver)
    }

    pub fn laps_for(&self, driver: DriverId) -> impl Iterator<Item = &Lap> {
        self.laps.iter().filter(move |l| l.driver_id == driver)
    }

    /// Add a driver and give them the next free sequential car number
    pub fn add_driver(
        &mut self,
        id: DriverId,
        name: &str,
        max_drivers: usize,
    ) -> RaceResult<&Driver> {
        self.ensure_roster_open(RaceError::RosterLocked)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(RaceError::EmptyDriverName);
        }
        if self.drivers.len() >= max_drivers {
            return Err(RaceError::SessionFull(max_drivers));
        }
        if self.driver_by_name(name).is_some() {
            return Err(RaceError::DuplicateDriver);
        }

        let car_number = self.next_car_number();
        self.drivers.push(Driver {
            id,
            name: name.to_string(),
            last_lap_mark: 0.0,
        });
        self.cars.push(Car {
            driver_id: id,
            car_number,
        });
        Ok(&self.drivers[self.drivers.len() - 1])
    }

    /// Remove a driver by name along with their car.
    /// An unknown name is not an error.
    pub fn remove_driver(&mut self, name: &str) -> RaceResult<Option<Driver>> {
        self.ensure_roster_open(RaceError::RosterLocked)?;
        let name = name.trim();
        let Some(index) = self.drivers.iter().position(|d| d.name == name) else {
            return Ok(None);
        };
        let removed = self.drivers.remove(index);
        self.cars.retain(|c| c.driver_id != removed.id);
        Ok(Some(removed))
    }

    pub fn rename_driver(&mut self, id: DriverId, new_name: &str) -> RaceResult<&Driver> {
        self.ensure_roster_open(RaceError::RosterLocked)?;
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(RaceError::EmptyDriverName);
        }
        if self.drivers.iter().any(|d| d.name == new_name) {
            return Err(RaceError::DuplicateDriver);
        }
        let driver = self
            .drivers
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(RaceError::DriverNotFound(id))?;
        driver.name = new_name.to_string();
        Ok(&*driver)
    }

    pub fn assign_car(&mut self, driver_id: DriverId, car_number: u32) -> RaceResult<Car> {
        self.ensure_roster_open(RaceError::CarsLocked)?;
        if car_number == 0 {
            return Err(RaceError::InvalidCarNumber);
        }
        if self
            .cars
            .iter()
            .any(|c| c.car_number == car_number && c.driver_id != driver_id)
        {
            return Err(RaceError::CarNumberTaken);
        }
        if self.driver(driver_id).is_none() {
            return Err(RaceError::DriverNotFound(driver_id));
        }

        match self.cars.iter_mut().find(|c| c.driver_id == driver_id) {
            Some(car) => {
                car.car_number = car_number;
                Ok(*car)
            }
            None => {
                let car = Car {
                    driver_id,
                    car_number,
                };
                self.cars.push(car);
                Ok(car)
            }
        }
    }

    /// Record a line crossing at `now`.
    ///
    /// The lap time is `elapsed - last_lap_mark`, where elapsed is measured
    /// from the session start. Negative values (clock skew) are kept.
    pub fn record_lap(&mut self, id: LapId, driver_id: DriverId, now: Timestamp) -> RaceResult<&Lap> {
        if self.mode != RaceMode::Safe || self.archived {
            return Err(RaceError::RaceNotStarted);
        }
        let start = self.start_time.ok_or(RaceError::RaceNotStarted)?;
        let driver = self
            .drivers
            .iter_mut()
            .find(|d| d.id == driver_id)
            .ok_or(RaceError::DriverNotFound(driver_id))?;

        let elapsed = now.seconds_since(start);
        let lap_time = elapsed - driver.last_lap_mark;
        driver.last_lap_mark = elapsed;

        self.laps.push(Lap {
            id,
            driver_id,
            lap_time,
            timestamp: now,
        });
        Ok(&self.laps[self.laps.len() - 1])
    }

    fn ensure_roster_open(&self, locked: RaceError) -> RaceResult<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(locked)
        }
    }

    fn next_car_number(&self) -> u32 {
        let mut number = self.cars.len() as u32 + 1;
        while self.cars.iter().any(|c| c.car_number == number) {
            number += 1;
        }
        number
    }
}
