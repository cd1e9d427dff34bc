//! Page-turn state machine: `Idle` until a turn is requested, `Turning` while the
//! fold slope is driven towards `k_interp_end`, then back to `Idle` with the spread
//! moved by two pages.

use crate::fold::FoldState;
use crate::layout::BookLayout;

/// Which on-screen page is lifted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSide {
    /// The left page lifts and travels to the right.
    Left,
    /// The right page lifts and travels to the left.
    Right,
}

/// Where a finished turn moved the spread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Next,
    Previous,
}

/// Initial fold-line intercept of a fresh turn.
const START_INTERCEPT: f32 = -1.0;
/// Angular rate (radians per second at speed 1.0) at the very start of a turn.
const START_RATE: f32 = 0.7;
/// Angular rate once the page is almost down.
const END_RATE: f32 = 0.1;

#[derive(Clone, Debug)]
pub struct PageTurner {
    leading: i32,
    fold: FoldState,
    /// Turn speed multiplier.
    pub speed: f32,
    /// Pages travel right to left when moving forward through the book.
    pub flow_rtl: bool,
}

impl Default for PageTurner {
    fn default() -> Self {
        Self::new(true, 1.0)
    }
}

impl PageTurner {
    pub fn new(flow_rtl: bool, speed: f32) -> Self {
        Self {
            leading: -1,
            fold: FoldState::default(),
            speed,
            flow_rtl,
        }
    }

    /// Display index of the left-most page of the current spread.
    pub fn leading(&self) -> i32 {
        self.leading
    }

    pub fn fold(&self) -> &FoldState {
        &self.fold
    }

    pub fn is_turning(&self) -> bool {
        self.fold.auto_turn
    }

    /// The page in flight moves forward through the book.
    pub fn turning_to_next(&self) -> bool {
        self.fold.from_right_to_left == self.flow_rtl
    }

    /// Back to the cover with no turn in flight.
    pub fn reset(&mut self) {
        self.leading = -1;
        self.fold = FoldState::default();
    }

    fn side_goes_next(&self, side: PageSide) -> bool {
        (side == PageSide::Right) == self.flow_rtl
    }

    pub fn can_turn(&self, side: PageSide, layout: &BookLayout) -> bool {
        if self.is_turning() {
            return false;
        }
        if self.side_goes_next(side) {
            !layout.is_last_spread(self.leading)
        } else {
            !layout.is_first_spread(self.leading)
        }
    }

    /// Starts a turn lifting `side`. Returns `false` (and changes nothing) while a turn
    /// is already running or when the turn would leave the book.
    pub fn request_turn(&mut self, side: PageSide, layout: &BookLayout, page_width: f32) -> bool {
        if !self.can_turn(side, layout) {
            log::debug!(
                "turn {:?} suppressed at leading page {} of {}",
                side,
                self.leading,
                layout.display_count()
            );
            return false;
        }
        let width = page_width.max(f32::EPSILON);
        self.fold.from_right_to_left = side == PageSide::Right;
        self.fold.auto_turn = true;
        self.fold.b = START_INTERCEPT;
        self.fold.k = match side {
            PageSide::Left => START_INTERCEPT / width,
            PageSide::Right => -START_INTERCEPT / width,
        };
        true
    }

    /// Advances the animation by `dt` seconds.
    ///
    /// The leading index is clamped into the layout first. A turn that reached
    /// `k_interp_end` on the previous step settles here and reports its outcome.
    pub fn advance(&mut self, dt: f32, layout: &BookLayout) -> Option<TurnOutcome> {
        self.leading = layout.clamp_leading(self.leading);
        if !self.fold.auto_turn {
            return None;
        }

        let end = self.fold.k_interp_end;
        if self.fold.is_complete() {
            self.fold.auto_turn = false;
            let outcome = if self.turning_to_next() {
                self.leading += 2;
                TurnOutcome::Next
            } else {
                self.leading -= 2;
                TurnOutcome::Previous
            };
            log::debug!("turn settled {:?}, leading page {}", outcome, self.leading);
            return Some(outcome);
        }

        let direction = if self.fold.from_right_to_left { 1.0 } else { -1.0 };
        let alpha = (self.fold.k.abs() / end).clamp(0.0, 1.0 - 1e-3);
        let rate = alpha * END_RATE + (1.0 - alpha) * START_RATE;
        let delta = rate * self.speed * dt * direction;

        // Rotate the fold line by `delta`: tan(a + d) = (tan a + tan d) / (1 - tan a tan d).
        let k = self.fold.k;
        let t = delta.tan();
        let next = (k + t) / (1.0 - k * t);
        // Passing vertical flips the sign; treat that as fully turned.
        self.fold.k = if next * k > 0.0 {
            next
        } else {
            (end + 1e-3) * direction
        };
        log::trace!("turn progress {:.3}", self.fold.progress());
        None
    }

    /// Shows the spread containing 1-based display page `number`.
    pub fn jump_to(&mut self, number: i32, layout: &BookLayout) {
        self.leading = layout.leading_for_page_number(number);
        self.fold.auto_turn = false;
    }

    /// A curling page is drawn only while turning away from a boundary.
    pub fn renders_curl(&self, layout: &BookLayout) -> bool {
        let next = self.turning_to_next();
        self.fold.auto_turn
            && !(layout.is_last_spread(self.leading) && next)
            && !(layout.is_first_spread(self.leading) && !next)
    }
}
