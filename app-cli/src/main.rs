mod synth;

use std::fs::File;
use std::io::{Write, stdout};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use asset_manager::{AssetSource, DirSource, SoundCatalog};
use audio_backend::{AudioBackend, MockAudioBackend, create_audio_backend};
use audio_system::{AudioEngine, Bus, EngineConfig, PlayOptions, PlayOutcome, SpatialOptions};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::{ExecutableCommand, terminal};
use glam::{Vec3, vec3};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "casino-audio", about = "Drive the casino mixing engine from the terminal")]
struct Args {
    /// Directory holding the catalog's sound files. Synthesized sounds are used when absent.
    #[arg(long)]
    assets: Option<PathBuf>,
    /// RON sound catalog; defaults to the built-in slot-floor table.
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// RON engine configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Render into a paced mock device instead of the sound card.
    #[arg(long)]
    mock: bool,
    /// Ambient track started at launch.
    #[arg(long, default_value = "casino_floor")]
    ambient: String,
    /// Write logs here; otherwise only warnings go to stderr.
    #[arg(long)]
    log: Option<PathBuf>,
}

fn init_logging(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
            tracing_subscriber::fmt().with_env_filter(filter).with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => {
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
    Ok(())
}

fn build_engine(args: &Args) -> Result<AudioEngine> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let catalog = match &args.catalog {
        Some(path) => SoundCatalog::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => SoundCatalog::default(),
    };
    let source: Arc<dyn AssetSource> = match &args.assets {
        Some(root) => Arc::new(DirSource::new(root)),
        None => Arc::new(synth::sound_bank(&catalog)),
    };
    let backend: Box<dyn AudioBackend> = if args.mock {
        Box::new(MockAudioBackend::realtime())
    } else {
        create_audio_backend().context("opening audio output")?
    };
    let mut engine = AudioEngine::new(config, Arc::new(catalog), source, backend);
    engine.init().context("starting the audio engine")?;
    Ok(engine)
}

/// Sounds scheduled a little into the future (reel stops, coin showers).
struct Cue {
    at: Instant,
    sound: &'static str,
    volume: f32,
}

struct Demo {
    engine: AudioEngine,
    listener: Vec3,
    yaw: f32,
    torch: bool,
    cues: Vec<Cue>,
    spins: u32,
    /// Big sounds still playing under a duck.
    ducked_for: Arc<AtomicUsize>,
    ambient: [&'static str; 3],
    last: String,
    started: Instant,
}

impl Demo {
    fn new(engine: AudioEngine) -> Self {
        Self {
            engine,
            listener: vec3(0.0, 1.6, 0.0),
            yaw: 0.0,
            torch: false,
            cues: Vec::new(),
            spins: 0,
            ducked_for: Arc::new(AtomicUsize::new(0)),
            ambient: ["casino_floor", "lounge", "night"],
            last: String::new(),
            started: Instant::now(),
        }
    }

    fn forward(&self) -> Vec3 {
        vec3(self.yaw.sin(), 0.0, -self.yaw.cos())
    }

    fn cue(&mut self, after: Duration, sound: &'static str, volume: f32) {
        self.cues.push(Cue { at: Instant::now() + after, sound, volume });
    }

    fn spin(&mut self) {
        self.spins += 1;
        self.engine.play("spin", PlayOptions::default());
        for reel in 0..5u64 {
            self.cue(Duration::from_millis(600 + reel * 250), "reel_stop", 0.9);
        }
        let outcome = match self.spins {
            n if n % 7 == 0 => Some("win_big"),
            n if n % 3 == 0 => Some("win_small"),
            _ => None,
        };
        if let Some(win) = outcome {
            self.cue(Duration::from_millis(1_900), win, 1.0);
        }
        self.last = format!("spin #{}", self.spins);
    }

    /// Plays a sound with the rest of the mix ducked until it ends.
    fn feature(&mut self, sound: &str) {
        let pending = self.ducked_for.clone();
        pending.fetch_add(1, Ordering::SeqCst);
        let done = pending.clone();
        let opts = PlayOptions::default().on_ended(move || {
            done.fetch_sub(1, Ordering::SeqCst);
        });
        let outcome = self.engine.play(sound, opts);
        if matches!(outcome, PlayOutcome::Skipped(_)) {
            pending.fetch_sub(1, Ordering::SeqCst);
        }
        self.engine.start_ducking(None, None);
        self.last = format!("{sound}: {outcome:?}");
    }

    fn coin_shower(&mut self) {
        for i in 0..12u64 {
            self.cue(Duration::from_millis(i * 70), "coin", 0.6 + 0.03 * i as f32);
        }
        self.last = "coin shower".to_string();
    }

    fn toggle_torch(&mut self) {
        self.torch = !self.torch;
        if self.torch {
            let pos = self.torch_position();
            let outcome = self.engine.play_spatial("torch", "fire", pos, SpatialOptions::looped());
            self.last = format!("torch: {outcome:?}");
        } else {
            self.engine.stop_spatial("torch");
            self.last = "torch out".to_string();
        }
    }

    fn torch_position(&self) -> Vec3 {
        let t = self.started.elapsed().as_secs_f32() * 0.5;
        vec3(3.0 * t.cos(), 1.6, 3.0 * t.sin())
    }

    fn toggle_pause(&mut self) {
        if !self.engine.resume_ambient_music(None) {
            self.engine.pause_ambient_music(None);
        }
    }

    fn nudge_master(&mut self, delta: f32) {
        let v = self.engine.bus_volume(Bus::Master) + delta;
        self.engine.set_bus_volume(Bus::Master, v);
    }

    /// Returns false when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        let step = self.forward() * 0.25;
        match code {
            KeyCode::Esc => return false,
            KeyCode::Up => self.listener += step,
            KeyCode::Down => self.listener -= step,
            KeyCode::Left => self.yaw -= 0.15,
            KeyCode::Right => self.yaw += 0.15,
            KeyCode::Char(' ') => self.spin(),
            KeyCode::Char('w') => {
                let outcome = self.engine.play("win_small", PlayOptions::default());
                self.last = format!("win_small: {outcome:?}");
            }
            KeyCode::Char('b') => self.feature("win_big"),
            KeyCode::Char('j') => self.feature("jackpot"),
            KeyCode::Char('c') => self.coin_shower(),
            KeyCode::Char('h') => {
                self.engine.play("hover", PlayOptions::volume(0.6));
            }
            KeyCode::Enter => {
                self.engine.play("click", PlayOptions::default());
            }
            KeyCode::Char('x') => {
                self.engine.play("error", PlayOptions::default());
            }
            KeyCode::Char(c @ '1'..='3') => {
                let track = self.ambient[(c as u8 - b'1') as usize];
                let outcome = self.engine.crossfade_ambient_music(track, None, None);
                self.last = format!("crossfade to {track}: {outcome:?}");
            }
            KeyCode::Char('s') => self.engine.stop_ambient_music(None),
            KeyCode::Char('p') => self.toggle_pause(),
            KeyCode::Char('t') => self.toggle_torch(),
            KeyCode::Char('m') => {
                let muted = !self.engine.is_muted();
                self.engine.set_muted(muted);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.nudge_master(0.1),
            KeyCode::Char('-') => self.nudge_master(-0.1),
            _ => {}
        }
        true
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let (due, later): (Vec<Cue>, Vec<Cue>) = self.cues.drain(..).partition(|c| c.at <= now);
        self.cues = later;
        for cue in due {
            if cue.sound == "win_big" {
                self.feature(cue.sound);
            } else {
                self.engine.play(cue.sound, PlayOptions::volume(cue.volume));
            }
        }

        if self.engine.is_ducking() && self.ducked_for.load(Ordering::SeqCst) == 0 {
            self.engine.stop_ducking(None);
        }
        if self.torch {
            let pos = self.torch_position();
            self.engine.update_spatial_position("torch", pos);
        }
        let forward = self.forward();
        self.engine.update_listener(self.listener, forward, None);
        self.engine.update();
    }

    fn draw(&mut self, out: &mut impl Write) -> std::io::Result<()> {
        let avg = self.engine.average_volume();
        let bass = self.engine.bass_level();
        let stats = self.engine.stats();
        let bar = |v: f32| "#".repeat((v * 40.0).round() as usize);

        out.execute(terminal::Clear(terminal::ClearType::All))?;
        out.execute(crossterm::cursor::MoveTo(0, 0))?;
        write!(out, "Casino audio engine\r\n\r\n")?;
        write!(out, "space spin | w small win | b big win | j jackpot | c coins | enter click | h hover | x error\r\n")?;
        write!(out, "1-3 ambient | s stop ambient | p pause | t torch | m mute | +/- master | arrows move | esc quit\r\n\r\n")?;
        write!(
            out,
            "listener  x={:+.2} z={:+.2} yaw={:+.2}\r\n",
            self.listener.x, self.listener.z, self.yaw
        )?;
        let track = self.engine.current_ambient_track().unwrap_or_else(|| "-".to_string());
        let state = if self.engine.is_ambient_playing() { "playing" } else { "silent" };
        write!(out, "ambient   {track} ({state})\r\n")?;
        write!(
            out,
            "master    {:.2}{}{}\r\n",
            self.engine.bus_volume(Bus::Master),
            if self.engine.is_muted() { " muted" } else { "" },
            if self.engine.is_ducking() { " ducking" } else { "" }
        )?;
        for bus in Bus::ALL {
            write!(out, "  {:<8}{:.2}\r\n", bus.name(), self.engine.bus_gain(bus))?;
        }
        write!(out, "level     {}\r\n", bar(avg))?;
        write!(out, "bass      {}\r\n", bar(bass))?;
        write!(
            out,
            "voices    pooled={} direct={} spatial={} nodes={} decodes={} queued={}\r\n",
            stats.active_pooled_voices,
            stats.active_direct_voices,
            stats.spatial_voices,
            stats.live_nodes,
            stats.decodes_started,
            stats.queued_requests
        )?;
        write!(out, "\r\n{}\r\n", self.last)?;
        out.flush()
    }
}

fn run(demo: &mut Demo) -> Result<()> {
    let mut out = stdout();
    let frame = Duration::from_micros(16_667);
    'running: loop {
        let started = Instant::now();
        while event::poll(Duration::from_millis(0))? {
            if let Event::Key(key) = event::read()? {
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    break 'running;
                }
                if key.kind == KeyEventKind::Press && !demo.handle_key(key.code) {
                    break 'running;
                }
            }
        }
        demo.tick();
        demo.draw(&mut out)?;
        if let Some(rest) = frame.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log.as_deref())?;
    tracing::info!(assets = ?args.assets, catalog = ?args.catalog, mock = args.mock, "starting demo");

    let mut engine = build_engine(&args)?;
    engine.start_ambient_music(&args.ambient, None, None);
    let mut demo = Demo::new(engine);

    let mut out = stdout();
    terminal::enable_raw_mode()?;
    out.execute(crossterm::cursor::Hide)?;
    out.execute(terminal::EnterAlternateScreen)?;

    let result = run(&mut demo);

    out.execute(terminal::LeaveAlternateScreen)?;
    out.execute(crossterm::cursor::Show)?;
    terminal::disable_raw_mode()?;
    demo.engine.dispose();
    result
}
