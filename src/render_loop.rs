//! The top-level driver: one acquisition window, one drawn frame, per tick.

use crate::acquisition::{AcquisitionLoop, AcquisitionStats};
use crate::baseline::BaselineTracker;
use crate::chip_layout::ChipLayout;
use crate::config::VizConfig;
use crate::frame_handoff::FrameHandoff;
use crate::gui::RenderError;
use crate::link::{Connection, ConnectionError};
use crate::projector::{Projector, VizMode};
use crate::recorder::Recorder;
use crate::surface::{InputEvent, Surface};

use log::{info, warn};
use std::{
    borrow::Cow,
    fmt, io,
    time::{Duration, Instant},
};

/// What the loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep going.
    Continue,
    /// The user asked to quit.
    Quit,
}

/// How a session went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Ticks run.
    pub ticks: u64,
    /// Ticks that drew a frame.
    pub frames_drawn: u64,
    /// Acquisition totals.
    pub acquisition: AcquisitionStats,
}

/// Why a session ended early.
#[derive(Debug)]
pub enum SessionError {
    /// The sensor link failed.
    Connection(ConnectionError),
    /// Drawing or input failed.
    Render(RenderError),
    /// The recording could not be written.
    Record(io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            SessionError::Connection(error) => Cow::from(format!("sensor link failed: {}", error)),
            SessionError::Render(error) => Cow::from(format!("rendering failed: {}", error)),
            SessionError::Record(error) => {
                Cow::from(format!("could not write recording: {}", error))
            }
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Connection(error) => Some(error),
            SessionError::Render(error) => Some(error),
            SessionError::Record(error) => Some(error),
        }
    }
}

impl From<ConnectionError> for SessionError {
    fn from(error: ConnectionError) -> Self {
        SessionError::Connection(error)
    }
}

impl From<RenderError> for SessionError {
    fn from(error: RenderError) -> Self {
        SessionError::Render(error)
    }
}

/// Drives acquisition and drawing at a fixed frame rate.
pub struct RenderLoop<C: Connection, S: Surface> {
    acquisition: AcquisitionLoop<C>,
    surface: S,
    handoff: FrameHandoff,
    baseline: BaselineTracker,
    projector: Projector,
    layout: ChipLayout,
    recorder: Option<Recorder>,
    rebaseline_key: char,
    frame_budget: Duration,
    ticks: u64,
    frames_drawn: u64,
    quit: bool,
}

impl<C: Connection, S: Surface> RenderLoop<C, S> {
    /// Set up a session. `config` should already be validated.
    pub fn new(acquisition: AcquisitionLoop<C>, surface: S, config: &VizConfig) -> Self {
        Self {
            acquisition,
            surface,
            handoff: FrameHandoff::new(),
            baseline: BaselineTracker::new(),
            projector: Projector::new(config.mode, config.scaling),
            layout: ChipLayout::five_chip(),
            recorder: config.record.as_ref().map(Recorder::new),
            rebaseline_key: config.rebaseline_key,
            frame_budget: config.frame_budget(),
            ticks: 0,
            frames_drawn: 0,
            quit: false,
        }
    }

    /// Run one tick.
    pub fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        let started = Instant::now();

        self.surface.blit_background()?;

        for event in self.surface.poll_events()? {
            match event {
                InputEvent::Quit => {
                    info!("Quit requested");
                    self.quit = true;
                }
                InputEvent::KeyPress(key) if key == self.rebaseline_key => {
                    self.baseline.reset();
                    info!("baseline updated");
                }
                InputEvent::KeyPress(_) => {}
                InputEvent::MouseDown(position) => info!("Click at {}", position),
            }
        }

        self.acquisition
            .run_window(&mut self.handoff, &mut self.baseline)?;

        if let Some(frame) = self.handoff.take_latest() {
            let calibrated = self.baseline.calibrate(&frame);
            if let Some(recorder) = &mut self.recorder {
                recorder.add(&calibrated);
            }
            let commands = self.projector.project(&calibrated, &self.layout);
            self.surface.submit(&commands);
            self.frames_drawn += 1;
        }

        let status = self.status();
        self.surface.set_status(&status);
        self.surface.present()?;
        self.ticks += 1;

        if let Some(rest) = self.frame_budget.checked_sub(started.elapsed()) {
            spin_sleep::sleep(rest);
        }

        Ok(if self.quit {
            TickOutcome::Quit
        } else {
            TickOutcome::Continue
        })
    }

    /// Run ticks until the user quits or something fails. The connection is
    /// closed either way; the recording is only written after a quit.
    pub fn run(&mut self) -> Result<SessionSummary, SessionError> {
        info!("Session started");
        let result = loop {
            match self.tick() {
                Ok(TickOutcome::Continue) => {}
                Ok(TickOutcome::Quit) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        let shutdown = self.acquisition.shutdown();
        if let Err(e) = result {
            if let Err(shutdown_error) = shutdown {
                warn!("Disconnect after failure also failed: {}", shutdown_error);
            }
            return Err(e);
        }
        shutdown?;

        if let Some(recorder) = &self.recorder {
            recorder.save().map_err(SessionError::Record)?;
        }

        let summary = self.summary();
        info!(
            "Session ended after {} ticks, {} frames drawn",
            summary.ticks, summary.frames_drawn
        );
        Ok(summary)
    }

    /// Totals so far.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            ticks: self.ticks,
            frames_drawn: self.frames_drawn,
            acquisition: *self.acquisition.stats(),
        }
    }

    /// The acquisition loop.
    pub fn acquisition(&self) -> &AcquisitionLoop<C> {
        &self.acquisition
    }

    /// The baseline in use.
    pub fn baseline(&self) -> &BaselineTracker {
        &self.baseline
    }

    /// The surface being drawn on.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    fn status(&self) -> String {
        let mode = match self.projector.mode() {
            VizMode::Magnitude => "magnitude",
            VizMode::ThreeAxis => "3axis",
        };
        let stats = self.acquisition.stats();
        format!(
            "{} | scaling {} | frames {} | parse errors {} | [{}] rebaseline [q] quit",
            mode,
            self.projector.scaling(),
            self.frames_drawn,
            stats.parse_errors,
            self.rebaseline_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::ConnectionState;
    use crate::link::replay::ReplayConnection;
    use crate::projector::{DrawCommand, Rgb, Stroke};
    use crate::sensor_frame::SensorFrame;
    use crate::Point;
    use std::{collections::VecDeque, fs};

    #[derive(Default)]
    struct RecordingSurface {
        events: VecDeque<Vec<InputEvent>>,
        frame: Vec<DrawCommand>,
        presented: Vec<Vec<DrawCommand>>,
        status: String,
    }

    impl RecordingSurface {
        fn scripted(events: Vec<Vec<InputEvent>>) -> Self {
            Self {
                events: events.into(),
                ..Self::default()
            }
        }
    }

    impl Surface for RecordingSurface {
        fn blit_background(&mut self) -> Result<(), RenderError> {
            self.frame.clear();
            Ok(())
        }

        fn draw_circle(&mut self, center: Point, radius: f64, stroke: Stroke, color: Rgb) {
            self.frame.push(DrawCommand::Circle {
                center,
                radius,
                stroke,
                color,
            });
        }

        fn draw_line(&mut self, start: Point, end: Point, width: f64, color: Rgb) {
            self.frame.push(DrawCommand::Line {
                start,
                end,
                width,
                color,
            });
        }

        fn set_status(&mut self, status: &str) {
            self.status = status.to_owned();
        }

        fn present(&mut self) -> Result<(), RenderError> {
            self.presented.push(self.frame.clone());
            Ok(())
        }

        fn poll_events(&mut self) -> Result<Vec<InputEvent>, RenderError> {
            Ok(self.events.pop_front().unwrap_or_default())
        }
    }

    // 30 values with the center chip at (x, y, z) and everything else zero.
    fn payload(x: f64, y: f64, z: f64) -> Vec<u8> {
        let mut s = format!("{},{},{},", x, y, z);
        s.push_str(&"0,".repeat(27));
        s.into_bytes()
    }

    fn quick_config(mode: VizMode) -> VizConfig {
        VizConfig {
            mode,
            frame_rate: 1000.0,
            dwell_ms: 0,
            ..VizConfig::default()
        }
    }

    fn session(
        payloads: Vec<Vec<u8>>,
        events: Vec<Vec<InputEvent>>,
        config: &VizConfig,
    ) -> RenderLoop<ReplayConnection, RecordingSurface> {
        let acquisition =
            AcquisitionLoop::new(ReplayConnection::new(payloads, 1), config.dwell());
        RenderLoop::new(acquisition, RecordingSurface::scripted(events), config)
    }

    fn center_radius(frame: &[DrawCommand]) -> f64 {
        match frame.first() {
            Some(DrawCommand::Circle { radius, .. }) => *radius,
            other => panic!("expected a circle, got {:?}", other),
        }
    }

    #[test]
    fn unit_z_field_draws_a_seventh_radius_on_the_center_chip() {
        let config = quick_config(VizMode::Magnitude);
        let raw = "0,0,1, 0,0,0, 0,0,0, 0,0,0, 0,0,0, 0,0,0,0,0,0,0,0,0,0,0,0,0,0,0";
        // Rebaselining before the first window keeps the zero baseline, so the
        // payload is drawn as is.
        let mut session = session(
            vec![raw.as_bytes().to_vec()],
            vec![vec![InputEvent::KeyPress('b')]],
            &config,
        );

        session.tick().unwrap();

        let radii: Vec<f64> = session.surface().presented[0]
            .iter()
            .map(|command| match command {
                DrawCommand::Circle { radius, .. } => *radius,
                other => panic!("expected only circles, got {:?}", other),
            })
            .collect();
        assert_eq!(radii.len(), 5);
        assert!((radii[0] - 1.0 / 7.0).abs() < 1e-9);
        assert_eq!(&radii[1..], &[0.0; 4]);
    }

    #[test]
    fn quit_ends_the_loop_after_the_current_tick() {
        let config = quick_config(VizMode::ThreeAxis);
        let mut session = session(
            vec![payload(1.0, 2.0, 3.0), payload(4.0, 5.0, 6.0)],
            vec![vec![InputEvent::Quit]],
            &config,
        );

        let summary = session.run().unwrap();
        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.frames_drawn, 1);
        assert_eq!(summary.acquisition.windows, 1);
        assert_eq!(session.surface().presented.len(), 1);
        assert_eq!(session.acquisition().state(), ConnectionState::Disconnected);
        assert!(!session.acquisition().connection().is_connected());
    }

    #[test]
    fn first_frame_draws_zero_sized_marks() {
        let config = quick_config(VizMode::ThreeAxis);
        let mut session = session(vec![payload(1.0, 2.0, 3.0)], vec![], &config);

        assert_eq!(session.tick().unwrap(), TickOutcome::Continue);
        let frame = &session.surface().presented[0];
        assert_eq!(frame.len(), 10);
        assert_eq!(center_radius(frame), 0.0);
    }

    #[test]
    fn magnitude_circles_follow_the_calibrated_field() {
        let config = quick_config(VizMode::Magnitude);
        let mut session = session(
            vec![payload(1.0, 1.0, 1.0), payload(4.0, 5.0, 1.0)],
            vec![],
            &config,
        );

        session.tick().unwrap();
        session.tick().unwrap();

        let frame = &session.surface().presented[1];
        assert_eq!(frame.len(), 5);
        assert!((center_radius(frame) - 5.0 / 7.0).abs() < 1e-9);
        assert!(session.surface().status.starts_with("magnitude"));
    }

    #[test]
    fn empty_windows_draw_only_the_background() {
        let config = quick_config(VizMode::Magnitude);
        let mut session = session(vec![payload(1.0, 1.0, 1.0)], vec![], &config);

        session.tick().unwrap();
        session.tick().unwrap();

        assert_eq!(session.surface().presented[0].len(), 5);
        assert!(session.surface().presented[1].is_empty());
        assert_eq!(session.summary().frames_drawn, 1);
    }

    #[test]
    fn rebaseline_key_resets_to_zero() {
        let config = quick_config(VizMode::Magnitude);
        let mut session = session(
            vec![payload(3.0, 0.0, 0.0), payload(0.0, 0.0, 14.0)],
            vec![vec![], vec![InputEvent::KeyPress('b')]],
            &config,
        );

        session.tick().unwrap();
        assert_eq!(
            session.baseline().baseline().unwrap().primary()[0],
            [3.0, 0.0, 0.0]
        );

        session.tick().unwrap();
        assert_eq!(session.baseline().baseline(), Some(&SensorFrame::zero()));
        // Raw field, nothing subtracted: 14 / 7.
        assert!((center_radius(&session.surface().presented[1]) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn other_keys_do_nothing() {
        let config = quick_config(VizMode::Magnitude);
        let mut session = session(
            vec![payload(3.0, 0.0, 0.0)],
            vec![vec![InputEvent::KeyPress('x'), InputEvent::MouseDown(Point::default())]],
            &config,
        );

        assert_eq!(session.tick().unwrap(), TickOutcome::Continue);
        assert_eq!(
            session.baseline().baseline().unwrap().primary()[0],
            [3.0, 0.0, 0.0]
        );
    }

    #[test]
    fn recording_is_written_on_quit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.txt");
        let config = VizConfig {
            record: Some(path.clone()),
            ..quick_config(VizMode::Magnitude)
        };
        let mut session = session(
            vec![payload(1.0, 0.0, 0.0), payload(2.0, 0.0, 0.0)],
            vec![vec![], vec![], vec![InputEvent::Quit]],
            &config,
        );

        let summary = session.run().unwrap();
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.frames_drawn, 2);

        let text = fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 2);
        let second: Vec<f64> = rows[1].split(' ').map(|v| v.parse().unwrap()).collect();
        assert_eq!(second.len(), 30);
        assert_eq!(second[0], 1.0);
    }

    struct DroppingConnection {
        disconnects: usize,
    }

    impl Connection for DroppingConnection {
        fn subscribe(&mut self, _: &str) -> Result<(), ConnectionError> {
            Ok(())
        }
        fn listen(&mut self, _: Duration, _: &mut dyn FnMut(&[u8])) -> Result<(), ConnectionError> {
            Err(ConnectionError::ListenFailed(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "peer went away",
            )))
        }
        fn unsubscribe(&mut self, _: &str) -> Result<(), ConnectionError> {
            Ok(())
        }
        fn disconnect(&mut self) -> Result<(), ConnectionError> {
            self.disconnects += 1;
            Ok(())
        }
    }

    #[test]
    fn link_failures_shut_the_session_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.txt");
        let config = VizConfig {
            record: Some(path.clone()),
            ..quick_config(VizMode::ThreeAxis)
        };
        let acquisition =
            AcquisitionLoop::new(DroppingConnection { disconnects: 0 }, Duration::ZERO);
        let mut session = RenderLoop::new(acquisition, RecordingSurface::default(), &config);

        assert!(matches!(
            session.run(),
            Err(SessionError::Connection(ConnectionError::ListenFailed(_)))
        ));
        assert_eq!(session.acquisition().connection().disconnects, 1);
        assert_eq!(session.acquisition().state(), ConnectionState::Disconnected);
        assert!(!path.exists());
    }
}
