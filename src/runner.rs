//! Live capture loop.
//!
//! One blocking reader thread per device normalizes its own event stream and
//! feeds a single bounded channel. A tokio task owns the [`InkEngine`] and is
//! the only consumer, so strokes and history are never shared across threads.
//! SIGINT/SIGTERM end the loop; the page is flushed and saved on the way out.

use crate::config::Config;
use crate::device::{DeviceError, DeviceId, DeviceKind, EventStream, InputDevice, InputSource};
use crate::engine::{EngineEvent, EngineSettings, InkEngine};
use crate::input::{ArbiterStats, CanvasSize, EventNormalizer, InputEvent, NormalizerStats};
use crate::session::{PageOptions, SaveOutcome, load_page, save_page};
use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use nix::time::{ClockId, clock_gettime};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Messages from producer threads to the engine task.
#[derive(Debug)]
pub enum Intake {
    /// Normalized events from one hardware frame, in order
    Events {
        device: DeviceId,
        events: Vec<InputEvent>,
    },
    /// The device stream ended or failed
    Disconnected { device: DeviceId },
    Shutdown,
}

/// Totals reported when a capture session ends.
#[derive(Debug, Clone)]
pub struct CaptureSummary {
    pub devices: usize,
    pub strokes: usize,
    pub arbiter: ArbiterStats,
    pub malformed_records: u64,
    pub dropped_frames: u64,
    pub saved: SaveOutcome,
}

/// Wires devices, the engine and page persistence together for one session.
pub struct Runner {
    config: Config,
    source: Arc<dyn InputSource>,
    page: PageOptions,
}

struct Reader {
    device: InputDevice,
    stats: Arc<NormalizerStats>,
}

impl Runner {
    pub fn new(config: Config, source: Arc<dyn InputSource>, page: PageOptions) -> Self {
        Self {
            config,
            source,
            page,
        }
    }

    /// Captures until a termination signal arrives or every device is gone,
    /// then saves the page.
    ///
    /// # Errors
    /// Fails before capturing when the page file cannot be loaded (including a
    /// newer format version) or no device can be opened.
    pub fn run(self) -> Result<CaptureSummary> {
        let mut engine = InkEngine::new(EngineSettings::from_config(&self.config));
        if let Some(loaded) = load_page(&self.page)
            .with_context(|| format!("Failed to load page {}", self.page.path.display()))?
        {
            engine.load_page(loaded.page);
        }

        let devices = self
            .source
            .list_devices()
            .context("Failed to enumerate input devices")?;

        let (tx, rx) = mpsc::channel(self.config.runner.channel_capacity.max(1));
        let readers = self.spawn_readers(devices, &mut engine, &tx);
        if readers.is_empty() {
            return Err(anyhow!(
                "No usable input devices (is the user in the 'input' group?)"
            ));
        }
        info!("Capturing from {} device(s)", readers.len());

        let (signals, signal_thread) = spawn_signal_listener(tx.clone())?;
        drop(tx);

        let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
        let live: HashSet<DeviceId> = readers.iter().map(|r| r.device.id()).collect();
        let tick = Duration::from_millis(self.config.runner.tick_interval_ms.max(1));
        runtime.block_on(drive(&mut engine, rx, live, tick, monotonic_now_us));

        signals.close();
        if signal_thread.join().is_err() {
            warn!("Signal listener thread panicked");
        }

        engine.finish();
        log_events(engine.drain_events());

        let saved = save_page(engine.page(), &self.page)
            .with_context(|| format!("Failed to save page {}", self.page.path.display()))?;

        Ok(CaptureSummary {
            devices: readers.len(),
            strokes: engine.page().len(),
            arbiter: engine.arbiter().stats(),
            malformed_records: readers.iter().map(|r| r.stats.malformed()).sum(),
            dropped_frames: readers.iter().map(|r| r.stats.dropped_frames()).sum(),
            saved,
        })
    }

    fn spawn_readers(
        &self,
        devices: Vec<InputDevice>,
        engine: &mut InkEngine,
        tx: &mpsc::Sender<Intake>,
    ) -> Vec<Reader> {
        let canvas = CanvasSize {
            width: self.config.canvas.width,
            height: self.config.canvas.height,
        };

        let mut readers = Vec::new();
        for device in devices {
            if device.kind() == DeviceKind::Unknown {
                if device.capabilities_known() {
                    debug!("Skipping {} ({}): not a pointer device", device.name(), device.id());
                } else {
                    warn!(
                        "Skipping {} ({}): capabilities unreadable, no axes to normalize",
                        device.name(),
                        device.id()
                    );
                }
                continue;
            }

            let stream = match self.source.open(&device) {
                Ok(stream) => stream,
                Err(err) => {
                    warn!("{}; continuing without it", err);
                    continue;
                }
            };

            info!(
                "Opened {} ({}) at {} as {}",
                device.name(),
                device.id(),
                device.path().display(),
                device.kind()
            );
            engine.register_device(device.id(), device.kind());

            let stats = Arc::new(NormalizerStats::default());
            let normalizer = EventNormalizer::new(&device, canvas, stats.clone());
            let tx = tx.clone();
            thread::spawn(move || read_device(stream, normalizer, tx));
            readers.push(Reader { device, stats });
        }
        readers
    }
}

/// Producer loop for one device. Exits on disconnect or when the engine is gone.
fn read_device(
    mut stream: Box<dyn EventStream>,
    mut normalizer: EventNormalizer,
    tx: mpsc::Sender<Intake>,
) {
    let device = normalizer.device();
    loop {
        match stream.next_event() {
            Ok(raw) => {
                let events = normalizer.push(raw);
                if events.is_empty() {
                    continue;
                }
                if tx.blocking_send(Intake::Events { device, events }).is_err() {
                    return;
                }
            }
            Err(err) => {
                match &err {
                    DeviceError::Disconnected { .. } => info!("{}", err),
                    _ => warn!("{}", err),
                }
                let _ = tx.blocking_send(Intake::Disconnected { device });
                return;
            }
        }
    }
}

fn spawn_signal_listener(
    tx: mpsc::Sender<Intake>,
) -> Result<(signal_hook::iterator::Handle, JoinHandle<()>)> {
    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handler")?;
    let handle = signals.handle();

    let thread = thread::spawn(move || {
        for sig in signals.forever() {
            info!(
                "Received {} - finishing capture",
                if sig == SIGTERM { "SIGTERM" } else { "SIGINT" }
            );
            if tx.blocking_send(Intake::Shutdown).is_err() {
                break;
            }
        }
    });

    Ok((handle, thread))
}

/// Consumer loop: applies intake in arrival order and ticks the engine so
/// pending and provisional contacts resolve without new input.
///
/// Returns on [`Intake::Shutdown`], once every device in `live` disconnected,
/// or when all producers are gone.
pub async fn drive<C>(
    engine: &mut InkEngine,
    mut rx: mpsc::Receiver<Intake>,
    mut live: HashSet<DeviceId>,
    tick: Duration,
    clock: C,
) where
    C: Fn() -> Option<u64>,
{
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            intake = rx.recv() => match intake {
                Some(Intake::Events { events, .. }) => {
                    for event in &events {
                        engine.handle_event(event);
                    }
                }
                Some(Intake::Disconnected { device }) => {
                    engine.abort_device(device);
                    live.remove(&device);
                    if live.is_empty() {
                        info!("All input devices are gone");
                        break;
                    }
                }
                Some(Intake::Shutdown) | None => break,
            },
            _ = interval.tick() => {
                if let Some(now) = clock() {
                    engine.tick(now);
                }
            }
        }

        log_events(engine.drain_events());
    }
}

fn log_events(events: Vec<EngineEvent>) {
    for event in events {
        match event {
            EngineEvent::StrokeCommitted { id } => debug!("Stroke {} committed", id),
            EngineEvent::ContactRejected { key, reason } => {
                debug!("{} rejected ({})", key, reason.as_str())
            }
            EngineEvent::ContactRetracted { key } => debug!("{} retracted", key),
            EngineEvent::ContactAborted { key } => debug!("{} aborted", key),
            EngineEvent::HistoryEvicted { label } => {
                debug!("Oldest undo step dropped ({})", label)
            }
            EngineEvent::StrokesErased { removed, pieces } => {
                debug!("Erased {} stroke(s), {} piece(s) kept", removed, pieces)
            }
        }
    }
}

/// Current `CLOCK_MONOTONIC` time, the clock evdev streams are switched to.
fn monotonic_now_us() -> Option<u64> {
    let now = clock_gettime(ClockId::CLOCK_MONOTONIC).ok()?;
    let micros = (now.tv_sec() as i64)
        .saturating_mul(1_000_000)
        .saturating_add(now.tv_nsec() as i64 / 1_000);
    u64::try_from(micros).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::codes::*;
    use crate::device::{AxisRange, Capabilities};
    use crate::input::RawEvent;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const MS: u64 = 1_000;

    fn tablet() -> InputDevice {
        let caps = Capabilities {
            pen_tool: true,
            touch_button: true,
            abs_x: Some(AxisRange::new(0, 1920)),
            abs_y: Some(AxisRange::new(0, 1080)),
            pressure: Some(AxisRange::new(0, 1023)),
            ..Default::default()
        };
        InputDevice::discovered(DeviceId(4), "/dev/input/event4", "tablet", Some(caps))
    }

    /// Yields a scripted stroke, then reports a disconnect.
    struct ScriptedStream(VecDeque<RawEvent>);

    impl EventStream for ScriptedStream {
        fn next_event(&mut self) -> Result<RawEvent, DeviceError> {
            self.0.pop_front().ok_or(DeviceError::Disconnected {
                path: PathBuf::from("/dev/input/event4"),
            })
        }
    }

    struct ScriptedSource {
        script: Mutex<Option<VecDeque<RawEvent>>>,
        denied: bool,
        /// Listed ahead of the tablet
        others: Vec<InputDevice>,
    }

    impl InputSource for ScriptedSource {
        fn list_devices(&self) -> Result<Vec<InputDevice>, DeviceError> {
            let mut devices = self.others.clone();
            devices.push(tablet());
            Ok(devices)
        }

        fn open(&self, device: &InputDevice) -> Result<Box<dyn EventStream>, DeviceError> {
            let script = self.script.lock().unwrap().take();
            match script {
                Some(events) if !self.denied => Ok(Box::new(ScriptedStream(events))),
                _ => Err(DeviceError::Unavailable {
                    path: device.path().to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                }),
            }
        }
    }

    fn frame(t: u64, x: i32, y: i32, touch: Option<bool>) -> Vec<RawEvent> {
        let mut events = vec![
            RawEvent::from_evdev(t, EV_ABS, ABS_X, x),
            RawEvent::from_evdev(t, EV_ABS, ABS_Y, y),
            RawEvent::from_evdev(t, EV_ABS, ABS_PRESSURE, 512),
        ];
        if let Some(pressed) = touch {
            events.push(RawEvent::from_evdev(t, EV_KEY, BTN_TOUCH, pressed as i32));
        }
        events.push(RawEvent::from_evdev(t, EV_SYN, SYN_REPORT, 0));
        events
    }

    fn stroke_script() -> VecDeque<RawEvent> {
        let mut script = vec![RawEvent::from_evdev(0, EV_KEY, BTN_TOOL_PEN, 1)];
        script.extend(frame(0, 100, 100, Some(true)));
        script.extend(frame(10 * MS, 150, 100, None));
        script.extend(frame(20 * MS, 200, 100, None));
        script.extend(frame(30 * MS, 200, 100, Some(false)));
        script.into()
    }

    fn source(denied: bool) -> Arc<dyn InputSource> {
        Arc::new(ScriptedSource {
            script: Mutex::new(Some(stroke_script())),
            denied,
            others: Vec::new(),
        })
    }

    #[test]
    fn capture_commits_stroke_and_saves_page() {
        let temp = TempDir::new().unwrap();
        let page = PageOptions::new(temp.path().join("page.json"));
        let runner = Runner::new(Config::default(), source(false), page.clone());

        let summary = runner.run().unwrap();
        assert_eq!(summary.devices, 1);
        assert_eq!(summary.strokes, 1);
        assert_eq!(summary.malformed_records, 0);

        let loaded = load_page(&page).unwrap().unwrap();
        let strokes = loaded.page.snapshot();
        let xs: Vec<f64> = strokes[0].points.iter().map(|p| p.x).collect();
        assert!((xs[0] - 100.0).abs() < 1e-6);
        assert!((xs[xs.len() - 1] - 200.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_devices_are_never_opened() {
        let others = vec![
            InputDevice::discovered(
                DeviceId(1),
                "/dev/input/event1",
                "keyboard",
                Some(Capabilities::default()),
            ),
            InputDevice::discovered(DeviceId(2), "/dev/input/event2", "mystery", None),
        ];
        let source: Arc<dyn InputSource> = Arc::new(ScriptedSource {
            script: Mutex::new(Some(stroke_script())),
            denied: false,
            others,
        });

        let temp = TempDir::new().unwrap();
        let page = PageOptions::new(temp.path().join("page.json"));
        let summary = Runner::new(Config::default(), source, page).run().unwrap();
        // The single scripted stream went to the tablet, not to a skipped device.
        assert_eq!(summary.devices, 1);
        assert_eq!(summary.strokes, 1);
    }

    #[test]
    fn capture_without_usable_devices_fails() {
        let temp = TempDir::new().unwrap();
        let page = PageOptions::new(temp.path().join("page.json"));
        let err = Runner::new(Config::default(), source(true), page.clone())
            .run()
            .unwrap_err();
        assert!(err.to_string().contains("No usable input devices"));
        assert!(!page.path.exists());
    }

    #[test]
    fn newer_page_file_aborts_before_capture() {
        let temp = TempDir::new().unwrap();
        let page = PageOptions::new(temp.path().join("page.json"));
        std::fs::write(&page.path, r#"{"format_version": 999, "strokes": []}"#).unwrap();

        let err = Runner::new(Config::default(), source(false), page.clone())
            .run()
            .unwrap_err();
        assert!(format!("{:#}", err).contains("999"));
        let untouched = std::fs::read_to_string(&page.path).unwrap();
        assert!(untouched.contains("999"));
    }

    #[tokio::test]
    async fn drive_stops_on_shutdown_and_aborts_disconnected_devices() {
        let device = tablet();
        let mut engine = InkEngine::new(EngineSettings::default());
        engine.register_device(device.id(), device.kind());
        let mut normalizer = EventNormalizer::new(
            &device,
            CanvasSize::default(),
            Arc::new(NormalizerStats::default()),
        );

        let (tx, rx) = mpsc::channel(16);
        let mut script = vec![RawEvent::from_evdev(0, EV_KEY, BTN_TOOL_PEN, 1)];
        script.extend(frame(0, 10, 10, Some(true)));
        script.extend(frame(5 * MS, 20, 10, None));
        for raw in script {
            let events = normalizer.push(raw);
            if !events.is_empty() {
                tx.send(Intake::Events {
                    device: device.id(),
                    events,
                })
                .await
                .unwrap();
            }
        }
        tx.send(Intake::Disconnected {
            device: device.id(),
        })
        .await
        .unwrap();

        let live = HashSet::from([device.id(), DeviceId(99)]);
        let shutdown = tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown.send(Intake::Shutdown).await.unwrap();
        });

        drive(&mut engine, rx, live, Duration::from_millis(1), || None).await;
        assert!(engine.current_strokes().is_empty());
        assert!(engine.in_progress().is_empty());
        assert_eq!(engine.arbiter().stats().aborted, 1);
    }
}
