//! Wall-clock playback schedule for an [`Animation`]

use std::time::Duration;

use gp_core::config::PlaybackConfig;
use gp_core::Result;
use tracing::{debug, trace};

use crate::animation::Animation;

/// What a call to [`Playback::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The current frame is still due
    Hold,
    /// The animation moved on; `frame` is now on the canvas
    Advanced { frame: usize },
    /// Playback reached the end and is not looping
    Finished,
}

/// Drives an animation from elapsed time.
///
/// Frame deadlines accumulate from the start of each pass, so a late tick
/// catches up by skipping frames instead of drifting.
#[derive(Debug, Clone)]
pub struct Playback {
    looping: bool,
    speed: f32,
    /// Scaled time since the current pass started
    elapsed: Duration,
    /// Scaled time at which the next frame is due
    deadline: Duration,
    finished: bool,
}

impl Playback {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            looping: config.looping,
            speed: config.clamped_speed(),
            elapsed: Duration::ZERO,
            deadline: Duration::ZERO,
            finished: false,
        }
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        let config = PlaybackConfig {
            looping: self.looping,
            speed,
        };
        self.speed = config.clamped_speed();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Begin a pass with the animation's current frame on screen
    pub fn start(&mut self, animation: &Animation<'_>) {
        self.elapsed = Duration::ZERO;
        self.deadline = animation.current_delay();
        self.finished = animation.frame_count() <= 1;
        debug!(
            "playback start: {} frames, looping {}, speed {}",
            animation.frame_count(),
            self.looping,
            self.speed
        );
    }

    /// Time left until the next frame is due, in unscaled wall time
    pub fn until_next(&self) -> Option<Duration> {
        if self.finished || self.speed == 0.0 {
            return None;
        }
        let remaining = self.deadline.saturating_sub(self.elapsed);
        Some(scale(remaining, 1.0 / self.speed as f64))
    }

    /// Advance the schedule by `dt` of wall time
    pub fn tick(&mut self, animation: &mut Animation<'_>, dt: Duration) -> Result<Tick> {
        if self.finished {
            return Ok(Tick::Finished);
        }
        self.elapsed += scale(dt, self.speed as f64);

        let mut tick = Tick::Hold;
        // One full pass at most, so all-zero delays cannot spin forever
        for _ in 0..animation.frame_count() {
            if self.elapsed < self.deadline {
                break;
            }
            let delay = animation.decode_next_frame()?;
            let frame = animation.frame_index();
            trace!("frame {} due, next delay {:?}", frame, delay);

            if frame == 0 {
                if !self.looping {
                    debug!("playback finished");
                    self.finished = true;
                    return Ok(Tick::Finished);
                }
                self.elapsed = Duration::ZERO;
                self.deadline = delay;
            } else {
                self.deadline += delay;
            }
            tick = Tick::Advanced { frame };
        }
        Ok(tick)
    }
}

/// Multiply `duration` by `factor`, rounding to whole nanoseconds
fn scale(duration: Duration, factor: f64) -> Duration {
    let nanos = duration.as_nanos() as f64 * factor;
    Duration::from_nanos(nanos.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gp_engine::fixtures::{FrameSpec, GifBuilder};

    fn animation(delays: &[u16]) -> Animation<'static> {
        let mut builder = GifBuilder::new(1, 1);
        for &delay in delays {
            builder = builder.frame(FrameSpec::new(1, 1, vec![0]).delay(delay));
        }
        Animation::from_bytes(builder.build()).unwrap()
    }

    fn playback(looping: bool, speed: f32) -> Playback {
        Playback::new(&PlaybackConfig { looping, speed })
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_holds_until_delay_elapses() {
        let mut anim = animation(&[10, 10]);
        let mut player = playback(false, 1.0);
        player.start(&anim);

        assert_eq!(player.tick(&mut anim, ms(50)).unwrap(), Tick::Hold);
        assert_eq!(player.until_next(), Some(ms(50)));
        assert_eq!(
            player.tick(&mut anim, ms(50)).unwrap(),
            Tick::Advanced { frame: 1 }
        );
    }

    #[test]
    fn test_finishes_without_loop() {
        let mut anim = animation(&[10, 10]);
        let mut player = playback(false, 1.0);
        player.start(&anim);

        player.tick(&mut anim, ms(100)).unwrap();
        assert_eq!(player.tick(&mut anim, ms(100)).unwrap(), Tick::Finished);
        assert!(player.is_finished());
        assert_eq!(player.tick(&mut anim, ms(100)).unwrap(), Tick::Finished);
    }

    #[test]
    fn test_loops_back_to_start() {
        let mut anim = animation(&[10, 10]);
        let mut player = playback(true, 1.0);
        player.start(&anim);

        assert_eq!(
            player.tick(&mut anim, ms(100)).unwrap(),
            Tick::Advanced { frame: 1 }
        );
        assert_eq!(
            player.tick(&mut anim, ms(100)).unwrap(),
            Tick::Advanced { frame: 0 }
        );
        assert!(!player.is_finished());
    }

    #[test]
    fn test_speed_scales_time() {
        let mut anim = animation(&[10, 10, 10]);
        let mut player = playback(false, 2.0);
        player.start(&anim);

        assert_eq!(
            player.tick(&mut anim, ms(50)).unwrap(),
            Tick::Advanced { frame: 1 }
        );
        assert_eq!(player.until_next(), Some(ms(50)));
    }

    #[test]
    fn test_late_tick_skips_frames() {
        let mut anim = animation(&[10, 10, 10, 10]);
        let mut player = playback(false, 1.0);
        player.start(&anim);

        assert_eq!(
            player.tick(&mut anim, ms(250)).unwrap(),
            Tick::Advanced { frame: 2 }
        );
    }

    #[test]
    fn test_single_frame_finishes_immediately() {
        let mut anim = animation(&[10]);
        let mut player = playback(true, 1.0);
        player.start(&anim);
        assert!(player.is_finished());
        assert_eq!(player.until_next(), None);
        assert_eq!(player.tick(&mut anim, ms(1000)).unwrap(), Tick::Finished);
    }

    #[test]
    fn test_zero_delays_do_not_spin() {
        let mut anim = animation(&[0, 0, 0]);
        let mut player = playback(true, 1.0);
        player.start(&anim);
        assert!(matches!(
            player.tick(&mut anim, ms(1)).unwrap(),
            Tick::Advanced { .. }
        ));
    }

    #[test]
    fn test_speed_clamped() {
        let mut player = playback(false, 50.0);
        assert_eq!(player.speed(), PlaybackConfig::MAX_SPEED);
        player.set_speed(-3.0);
        assert_eq!(player.speed(), 0.0);
        assert_eq!(player.until_next(), None);
    }
}
