use std::time::SystemTime;

use tagshelf_application::Clock;

use super::scanner::epoch_seconds;

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        epoch_seconds(SystemTime::now())
    }
}
