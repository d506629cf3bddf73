//! Banner carousel driving the primary display.
//!
//! Each banner holds the screen for its own duration, looping forever.
//! Completing the final slide is the signal the cycle machine uses to
//! hand off to the secondary pages; with zero or one banner there is no
//! rotation and the handoff never fires.

use chrono::{Duration, NaiveDateTime};

/// Outcome of a carousel poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselTick {
    /// Nothing due
    Idle,
    /// Advanced to the next banner mid-cycle
    Advanced,
    /// Advanced past the final banner, wrapping to the first
    CycleCompleted,
}

/// Rotates through banners by per-banner deadline.
#[derive(Debug)]
pub struct BannerCarousel {
    index: usize,
    deadline: Option<NaiveDateTime>,
    durations: Vec<u64>,
}

impl BannerCarousel {
    pub fn new() -> Self {
        Self {
            index: 0,
            deadline: None,
            durations: Vec::new(),
        }
    }

    /// Restart from the first banner with fresh effective durations.
    pub fn restart(&mut self, now: NaiveDateTime, durations: Vec<u64>) {
        self.index = 0;
        self.durations = durations;
        self.deadline = self.arm(now);
    }

    /// Return to the first banner keeping the current durations.
    pub fn rewind(&mut self, now: NaiveDateTime) {
        self.index = 0;
        self.deadline = self.arm(now);
    }

    /// Stop rotating until the next restart.
    pub fn suspend(&mut self) {
        self.deadline = None;
    }

    fn arm(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.durations.len() <= 1 {
            return None;
        }
        self.durations
            .get(self.index)
            .map(|secs| now + Duration::seconds(*secs as i64))
    }

    /// Advance if the current banner's deadline has passed.
    pub fn tick(&mut self, now: NaiveDateTime) -> CarouselTick {
        let Some(deadline) = self.deadline else {
            return CarouselTick::Idle;
        };
        if now < deadline {
            return CarouselTick::Idle;
        }

        let wrapped = self.index + 1 == self.durations.len();
        self.index = (self.index + 1) % self.durations.len();
        self.deadline = self.arm(now);

        if wrapped {
            CarouselTick::CycleCompleted
        } else {
            CarouselTick::Advanced
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }
}

impl Default for BannerCarousel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            + Duration::seconds(secs)
    }

    #[test]
    fn rotates_with_per_banner_durations() {
        let mut carousel = BannerCarousel::new();
        carousel.restart(at(0), vec![5, 10, 15]);
        assert_eq!(carousel.tick(at(4)), CarouselTick::Idle);
        assert_eq!(carousel.tick(at(5)), CarouselTick::Advanced);
        assert_eq!(carousel.index(), 1);
        // Second banner holds for 10s from the advance
        assert_eq!(carousel.tick(at(14)), CarouselTick::Idle);
        assert_eq!(carousel.tick(at(15)), CarouselTick::Advanced);
        assert_eq!(carousel.index(), 2);
        assert_eq!(carousel.tick(at(30)), CarouselTick::CycleCompleted);
        assert_eq!(carousel.index(), 0);
    }

    #[test]
    fn single_banner_never_rotates() {
        let mut carousel = BannerCarousel::new();
        carousel.restart(at(0), vec![5]);
        assert_eq!(carousel.tick(at(60)), CarouselTick::Idle);
        assert_eq!(carousel.index(), 0);
    }

    #[test]
    fn empty_carousel_stays_idle() {
        let mut carousel = BannerCarousel::new();
        carousel.restart(at(0), vec![]);
        assert_eq!(carousel.tick(at(60)), CarouselTick::Idle);
    }

    #[test]
    fn suspend_cancels_pending_rotation() {
        let mut carousel = BannerCarousel::new();
        carousel.restart(at(0), vec![5, 5]);
        carousel.suspend();
        assert_eq!(carousel.tick(at(60)), CarouselTick::Idle);
    }
}
