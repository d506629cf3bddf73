//! Content-cycling state machine.
//!
//! Governs what occupies the main display area: the primary screen
//! (banner carousel plus prayer cards) or one of the ordered secondary
//! pages. Every transition is deadline-driven; the engine polls the
//! machine once per tick with the current time, so cancellation is just
//! clearing a deadline field. A reload resets the machine outright,
//! superseding any pending transition.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod carousel;

pub use carousel::{BannerCarousel, CarouselTick};

/// What occupies the main display area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// Banner carousel and prayer cards
    Primary,
    /// One secondary page by index
    Secondary { index: usize },
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclePhase::Primary => write!(f, "Primary"),
            CyclePhase::Secondary { index } => write!(f, "Secondary page {}", index + 1),
        }
    }
}

/// Which panel the primary screen's lower half shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticePanel {
    ScheduleGrid,
    ChangeNotice,
}

/// Transitions produced by one poll, in occurrence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEvent {
    BannerAdvanced(usize),
    EnteredSecondary(usize),
    AdvancedSecondary(usize),
    ReturnedToPrimary,
    PanelToggled(NoticePanel),
}

/// The cycling machine: explicit phase plus pending deadlines.
pub struct ContentCycle {
    phase: CyclePhase,
    page_deadline: Option<NaiveDateTime>,
    panel: NoticePanel,
    panel_deadline: Option<NaiveDateTime>,
    carousel: BannerCarousel,
    page_durations: Vec<u64>,
    notice_toggle_secs: u64,
}

impl ContentCycle {
    pub fn new(notice_toggle_secs: u64) -> Self {
        Self {
            phase: CyclePhase::Primary,
            page_deadline: None,
            panel: NoticePanel::ScheduleGrid,
            panel_deadline: None,
            carousel: BannerCarousel::new(),
            page_durations: Vec::new(),
            notice_toggle_secs,
        }
    }

    /// Reset to the initial state: primary screen, first banner, schedule
    /// grid. Cancels every pending deadline.
    pub fn reset(
        &mut self,
        now: NaiveDateTime,
        banner_durations: Vec<u64>,
        page_durations: Vec<u64>,
        notice_toggle_secs: u64,
    ) {
        self.phase = CyclePhase::Primary;
        self.page_deadline = None;
        self.panel = NoticePanel::ScheduleGrid;
        self.panel_deadline = None;
        self.page_durations = page_durations;
        self.notice_toggle_secs = notice_toggle_secs;
        self.carousel.restart(now, banner_durations);
    }

    /// Poll all deadlines against `now`.
    ///
    /// `notice_eligible` is the display policy verdict for the change
    /// notice; while false the panel is pinned to the schedule grid.
    pub fn tick(&mut self, now: NaiveDateTime, notice_eligible: bool) -> Vec<CycleEvent> {
        let mut events = Vec::new();

        match self.phase {
            CyclePhase::Primary => match self.carousel.tick(now) {
                CarouselTick::Idle => {}
                CarouselTick::Advanced => {
                    events.push(CycleEvent::BannerAdvanced(self.carousel.index()));
                }
                CarouselTick::CycleCompleted => {
                    if self.page_durations.is_empty() {
                        // No pages to show; the carousel just keeps looping
                        events.push(CycleEvent::BannerAdvanced(self.carousel.index()));
                    } else {
                        self.phase = CyclePhase::Secondary { index: 0 };
                        self.page_deadline = self.arm_page(now, 0);
                        self.carousel.suspend();
                        events.push(CycleEvent::EnteredSecondary(0));
                    }
                }
            },
            CyclePhase::Secondary { index } => {
                if self.page_deadline.is_some_and(|d| now >= d) {
                    let next = index + 1;
                    if next < self.page_durations.len() {
                        self.phase = CyclePhase::Secondary { index: next };
                        self.page_deadline = self.arm_page(now, next);
                        events.push(CycleEvent::AdvancedSecondary(next));
                    } else {
                        self.return_to_primary(now);
                        events.push(CycleEvent::ReturnedToPrimary);
                    }
                }
            }
        }

        // Panel alternation only runs on the primary screen while the
        // change notice is eligible; otherwise pinned to the grid
        if self.phase == CyclePhase::Primary && notice_eligible {
            match self.panel_deadline {
                None => {
                    self.panel_deadline =
                        Some(now + Duration::seconds(self.notice_toggle_secs as i64));
                }
                Some(deadline) if now >= deadline => {
                    self.panel = match self.panel {
                        NoticePanel::ScheduleGrid => NoticePanel::ChangeNotice,
                        NoticePanel::ChangeNotice => NoticePanel::ScheduleGrid,
                    };
                    self.panel_deadline =
                        Some(now + Duration::seconds(self.notice_toggle_secs as i64));
                    events.push(CycleEvent::PanelToggled(self.panel));
                }
                Some(_) => {}
            }
        } else if self.panel != NoticePanel::ScheduleGrid || self.panel_deadline.is_some() {
            self.panel = NoticePanel::ScheduleGrid;
            self.panel_deadline = None;
        }

        events
    }

    fn return_to_primary(&mut self, now: NaiveDateTime) {
        self.phase = CyclePhase::Primary;
        self.page_deadline = None;
        self.carousel.rewind(now);
    }

    fn arm_page(&self, now: NaiveDateTime, index: usize) -> Option<NaiveDateTime> {
        self.page_durations
            .get(index)
            .map(|secs| now + Duration::seconds(*secs as i64))
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn panel(&self) -> NoticePanel {
        self.panel
    }

    pub fn banner_index(&self) -> usize {
        self.carousel.index()
    }

    pub fn banner_count(&self) -> usize {
        self.carousel.len()
    }

    pub fn page_count(&self) -> usize {
        self.page_durations.len()
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

    fn machine(banners: Vec<u64>, pages: Vec<u64>) -> ContentCycle {
        let mut cycle = ContentCycle::new(10);
        cycle.reset(at(0), banners, pages, 10);
        cycle
    }

    #[test]
    fn hands_off_to_first_page_after_final_banner() {
        let mut cycle = machine(vec![5, 5], vec![10, 20]);
        assert_eq!(cycle.tick(at(5), false), vec![CycleEvent::BannerAdvanced(1)]);
        assert_eq!(
            cycle.tick(at(10), false),
            vec![CycleEvent::EnteredSecondary(0)]
        );
        assert_eq!(cycle.phase(), CyclePhase::Secondary { index: 0 });
    }

    #[test]
    fn carousel_loops_forever_without_pages() {
        let mut cycle = machine(vec![5, 5], vec![]);
        cycle.tick(at(5), false);
        assert_eq!(
            cycle.tick(at(10), false),
            vec![CycleEvent::BannerAdvanced(0)]
        );
        assert_eq!(cycle.phase(), CyclePhase::Primary);
    }

    #[test]
    fn pages_advance_on_their_own_durations_then_return() {
        let mut cycle = machine(vec![5, 5], vec![10, 20]);
        cycle.tick(at(5), false);
        cycle.tick(at(10), false); // enters page 0 at t=10
        assert_eq!(cycle.tick(at(19), false), vec![]);
        assert_eq!(
            cycle.tick(at(20), false),
            vec![CycleEvent::AdvancedSecondary(1)]
        );
        assert_eq!(cycle.tick(at(39), false), vec![]);
        assert_eq!(
            cycle.tick(at(40), false),
            vec![CycleEvent::ReturnedToPrimary]
        );
        assert_eq!(cycle.phase(), CyclePhase::Primary);
        assert_eq!(cycle.banner_index(), 0);
        // Carousel resumes from the first banner
        assert_eq!(
            cycle.tick(at(45), false),
            vec![CycleEvent::BannerAdvanced(1)]
        );
    }

    #[test]
    fn single_banner_never_leaves_primary() {
        let mut cycle = machine(vec![5], vec![10]);
        assert_eq!(cycle.tick(at(300), false), vec![]);
        assert_eq!(cycle.phase(), CyclePhase::Primary);
    }

    #[test]
    fn reset_supersedes_pending_page_deadline() {
        let mut cycle = machine(vec![5, 5], vec![10]);
        cycle.tick(at(5), false);
        cycle.tick(at(10), false);
        assert_eq!(cycle.phase(), CyclePhase::Secondary { index: 0 });
        cycle.reset(at(12), vec![5], vec![10], 10);
        assert_eq!(cycle.phase(), CyclePhase::Primary);
        // The old page deadline (t=20) must not fire after the reset
        assert_eq!(cycle.tick(at(20), false), vec![]);
        assert_eq!(cycle.phase(), CyclePhase::Primary);
    }

    #[test]
    fn panel_alternates_only_while_eligible() {
        let mut cycle = machine(vec![], vec![]);
        assert_eq!(cycle.panel(), NoticePanel::ScheduleGrid);
        // First eligible tick arms the deadline
        assert_eq!(cycle.tick(at(0), true), vec![]);
        assert_eq!(cycle.tick(at(9), true), vec![]);
        assert_eq!(
            cycle.tick(at(10), true),
            vec![CycleEvent::PanelToggled(NoticePanel::ChangeNotice)]
        );
        assert_eq!(
            cycle.tick(at(20), true),
            vec![CycleEvent::PanelToggled(NoticePanel::ScheduleGrid)]
        );
        // Losing eligibility pins the grid and cancels the deadline
        cycle.tick(at(25), true);
        cycle.tick(at(26), false);
        assert_eq!(cycle.panel(), NoticePanel::ScheduleGrid);
        assert_eq!(cycle.tick(at(40), false), vec![]);
    }

    #[test]
    fn panel_pinned_to_grid_on_secondary_pages() {
        let mut cycle = machine(vec![5, 5], vec![30]);
        cycle.tick(at(5), true);
        cycle.tick(at(10), true); // now on page 0
        assert_eq!(cycle.phase(), CyclePhase::Secondary { index: 0 });
        // Notice stays eligible but the panel must not alternate here
        assert_eq!(cycle.tick(at(25), true), vec![]);
        assert_eq!(cycle.panel(), NoticePanel::ScheduleGrid);
    }
}
