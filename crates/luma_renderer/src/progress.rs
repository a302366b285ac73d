//! Render progress shared between passes.
//!
//! Each pass owns one slot. Workers report row progress into the board, and
//! redraws are serialized through a console flag so that only one worker
//! writes a progress line at a time. Reporting never influences the image.

use parking_lot::{Condvar, Mutex, MutexGuard};

/// Progress is redrawn each time a slot crosses one of this many steps.
const REDRAW_STEPS: f32 = 10.0;

#[derive(Debug, Default)]
struct BoardState {
    progress: Vec<f32>,
    done: Vec<bool>,
    /// Last step drawn for each slot
    drawn: Vec<u32>,
    combine: f32,
}

/// Per-pass progress and completion status.
#[derive(Debug, Default)]
pub struct ProgressBoard {
    state: Mutex<BoardState>,
    console_busy: Mutex<bool>,
    console_free: Condvar,
}

impl ProgressBoard {
    pub fn new(slots: usize) -> Self {
        Self {
            state: Mutex::new(BoardState {
                progress: vec![0.0; slots],
                done: vec![false; slots],
                drawn: vec![0; slots],
                combine: 0.0,
            }),
            console_busy: Mutex::new(false),
            console_free: Condvar::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock()
    }

    /// Record `progress` in `[0, 1]` for pass `slot`. Reaching 1 marks the
    /// slot done.
    pub fn update_pass(&self, slot: usize, progress: f32) {
        let progress = progress.clamp(0.0, 1.0);
        let redraw = {
            let mut state = self.state();
            let Some(entry) = state.progress.get_mut(slot) else {
                return;
            };
            *entry = progress;
            if progress >= 1.0 {
                state.done[slot] = true;
            }

            let step = (progress * REDRAW_STEPS) as u32;
            if step > state.drawn[slot] {
                state.drawn[slot] = step;
                true
            } else {
                false
            }
        };

        if redraw {
            self.redraw();
        }
    }

    /// Record progress of the final averaging step.
    pub fn update_combine(&self, progress: f32) {
        self.state().combine = progress.clamp(0.0, 1.0);
    }

    /// Current progress of every slot.
    pub fn snapshot(&self) -> Vec<f32> {
        self.state().progress.clone()
    }

    pub fn is_done(&self, slot: usize) -> bool {
        self.state().done.get(slot).copied().unwrap_or(false)
    }

    pub fn completed(&self) -> usize {
        self.state().done.iter().filter(|&&d| d).count()
    }

    pub fn combine_progress(&self) -> f32 {
        self.state().combine
    }

    /// Write one progress line, waiting for any other worker to finish its own.
    fn redraw(&self) {
        {
            let mut busy = self.console_busy.lock();
            while *busy {
                self.console_free.wait(&mut busy);
            }
            *busy = true;
        }

        let line = {
            let state = self.state();
            state
                .progress
                .iter()
                .zip(&state.done)
                .map(|(p, &done)| {
                    if done {
                        "done".to_string()
                    } else {
                        format!("{:3.0}%", p * 100.0)
                    }
                })
                .collect::<Vec<_>>()
                .join(" | ")
        };
        log::debug!("Passes: {}", line);

        *self.console_busy.lock() = false;
        self.console_free.notify_one();
    }
}
